use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The `(groupId, artifactId, version)` triple identifying a publishable unit, with the optional
/// Maven `classifier`/`type` extensions.
///
/// Equality is structural over all fields. Use [`ModuleCoordinate::gav`] when the optional
/// extensions must not participate (workspace publication, self-reference checks).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleCoordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

impl ModuleCoordinate {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            classifier: None,
            type_: None,
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into()).filter(|c: &String| !c.is_empty());
        self
    }

    pub fn with_type(mut self, type_: impl Into<String>) -> Self {
        self.type_ = Some(type_.into()).filter(|t: &String| !t.is_empty());
        self
    }

    /// The coordinate without classifier and type.
    pub fn gav(&self) -> ModuleCoordinate {
        ModuleCoordinate::new(
            self.group_id.clone(),
            self.artifact_id.clone(),
            self.version.clone(),
        )
    }

    pub fn is_gav(&self) -> bool {
        self.classifier.is_none() && self.type_.is_none()
    }

    /// Packaging type, defaulting to `jar`.
    pub fn extension(&self) -> &str {
        match self.type_.as_deref() {
            None | Some("jar") | Some("test-jar") | Some("ejb") | Some("maven-plugin") => "jar",
            Some(other) => other,
        }
    }

    /// `true` when the version still contains an unresolved `${...}` placeholder.
    pub fn has_unresolved_version(&self) -> bool {
        self.version.is_empty() || self.version.contains("${")
    }
}

impl fmt::Display for ModuleCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid coordinate `{input}`: expected `group:artifact:version[:classifier]`")]
pub struct CoordinateParseError {
    pub input: String,
}

impl FromStr for ModuleCoordinate {
    type Err = CoordinateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(CoordinateParseError {
                input: s.to_string(),
            });
        }
        match parts.as_slice() {
            [g, a, v] => Ok(ModuleCoordinate::new(*g, *a, *v)),
            [g, a, v, c] => Ok(ModuleCoordinate::new(*g, *a, *v).with_classifier(*c)),
            _ => Err(CoordinateParseError {
                input: s.to_string(),
            }),
        }
    }
}
