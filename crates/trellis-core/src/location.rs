use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::MANIFEST_FILE_NAME;

/// Stable identifier of a module descriptor within the workspace.
///
/// The wrapped value is the (normalized) path to the module's `pom.xml`. Trellis only stores and
/// compares locations; the workspace owns the files behind them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestLocation(PathBuf);

impl ManifestLocation {
    /// Wrap a manifest path.
    ///
    /// The path is canonicalized when it exists so the same file reached through different
    /// spellings compares equal. A deleted manifest keeps its canonical directory so it still
    /// matches the location recorded before the deletion.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Ok(canonical) = dunce::canonicalize(&path) {
            return Self(canonical);
        }
        match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) => match dunce::canonicalize(parent) {
                Ok(parent) => Self(parent.join(name)),
                Err(_) => Self(path),
            },
            _ => Self(path),
        }
    }

    /// Location of the manifest inside `module_dir`.
    pub fn for_module_dir(module_dir: impl AsRef<Path>) -> Self {
        Self::new(module_dir.as_ref().join(MANIFEST_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Directory containing the manifest.
    pub fn module_dir(&self) -> &Path {
        self.0.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Resolve a `<module>` entry declared by this manifest.
    ///
    /// Entries may point at a directory (the usual case) or directly at a descriptor file.
    pub fn resolve_sub_module(&self, relative: &str) -> ManifestLocation {
        let target = self.module_dir().join(relative);
        let is_descriptor = target
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        if is_descriptor {
            ManifestLocation::new(target)
        } else {
            ManifestLocation::for_module_dir(target)
        }
    }

    pub fn exists(&self) -> bool {
        self.0.is_file()
    }
}

impl fmt::Display for ManifestLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<PathBuf> for ManifestLocation {
    fn from(value: PathBuf) -> Self {
        Self::new(value)
    }
}

impl From<&Path> for ManifestLocation {
    fn from(value: &Path) -> Self {
        Self::new(value)
    }
}
