use serde::{Deserialize, Serialize};

use crate::ManifestLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// What produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// The manifest could not be read or is malformed.
    ModelRead,
    /// A declared dependency could not be located.
    ArtifactResolution,
    /// A module reaches itself through workspace substitution.
    Cycle,
    /// A source or documentation attachment failed.
    Materialization,
    /// Two workspace modules publish the same coordinate.
    CoordinateConflict,
}

/// A problem attached to the manifest that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub location: ManifestLocation,
    pub message: String,
    pub severity: Severity,
    /// 1-based line in the manifest, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn error(
        location: ManifestLocation,
        kind: DiagnosticKind,
        message: impl Into<String>,
    ) -> Self {
        Self::new(location, kind, Severity::Error, message)
    }

    pub fn warning(
        location: ManifestLocation,
        kind: DiagnosticKind,
        message: impl Into<String>,
    ) -> Self {
        Self::new(location, kind, Severity::Warning, message)
    }

    pub fn new(
        location: ManifestLocation,
        kind: DiagnosticKind,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            location,
            message: message.into(),
            severity,
            line: None,
            kind,
        }
    }

    pub fn with_line(mut self, line: Option<u32>) -> Self {
        self.line = line;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
