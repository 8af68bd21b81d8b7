use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use trellis_core::{Diagnostic, ManifestLocation, ModuleCoordinate};
use trellis_project::Scope;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryAttributes {
    pub coordinate: ModuleCoordinate,
    pub scope: Scope,
    pub optional: bool,
    /// Not re-exported to dependents (`provided`, `test` and `system` scopes).
    pub non_exported: bool,
}

/// One element of a synthesized classpath.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ClasspathEntry {
    /// A reference to another workspace module.
    Project { location: ManifestLocation },
    /// An archive from the repository.
    Library {
        archive_path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_path: Option<PathBuf>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        doc_url: Option<String>,
        attributes: EntryAttributes,
    },
}

/// What makes two entries the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryIdentity {
    Project(ManifestLocation),
    Archive(PathBuf),
}

impl ClasspathEntry {
    pub fn identity(&self) -> EntryIdentity {
        match self {
            ClasspathEntry::Project { location } => EntryIdentity::Project(location.clone()),
            ClasspathEntry::Library { archive_path, .. } => {
                EntryIdentity::Archive(archive_path.clone())
            }
        }
    }

    pub fn project_location(&self) -> Option<&ManifestLocation> {
        match self {
            ClasspathEntry::Project { location } => Some(location),
            ClasspathEntry::Library { .. } => None,
        }
    }

    pub fn archive_path(&self) -> Option<&Path> {
        match self {
            ClasspathEntry::Project { .. } => None,
            ClasspathEntry::Library { archive_path, .. } => Some(archive_path),
        }
    }

    pub fn attributes(&self) -> Option<&EntryAttributes> {
        match self {
            ClasspathEntry::Project { .. } => None,
            ClasspathEntry::Library { attributes, .. } => Some(attributes),
        }
    }
}

/// The classpath and diagnostics of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub location: ManifestLocation,
    pub entries: Vec<ClasspathEntry>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolutionResult {
    pub fn empty(location: ManifestLocation) -> Self {
        Self {
            location,
            entries: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// A result carrying only diagnostics, for modules that could not be resolved at all.
    pub fn failed(location: ManifestLocation, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            location,
            entries: Vec::new(),
            diagnostics,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Drop repeated entries, keeping the first occurrence of each identity.
    pub(crate) fn dedupe(entries: Vec<ClasspathEntry>) -> Vec<ClasspathEntry> {
        let mut seen = HashSet::new();
        entries
            .into_iter()
            .filter(|entry| seen.insert(entry.identity()))
            .collect()
    }
}
