use std::path::{Path, PathBuf};

use trellis_core::{ManifestLocation, MANIFEST_FILE_NAME};

/// A file system change, as reported by a watcher after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    Moved { from: PathBuf, to: PathBuf },
}

impl NormalizedEvent {
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        let (first, second) = match self {
            NormalizedEvent::Created(p)
            | NormalizedEvent::Modified(p)
            | NormalizedEvent::Deleted(p) => (p.as_path(), None),
            NormalizedEvent::Moved { from, to } => (from.as_path(), Some(to.as_path())),
        };

        std::iter::once(first).chain(second)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManifestChange {
    pub location: ManifestLocation,
    pub kind: ManifestChangeKind,
}

impl ManifestChange {
    pub fn new(location: ManifestLocation, kind: ManifestChangeKind) -> Self {
        Self { location, kind }
    }
}

fn is_manifest(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == MANIFEST_FILE_NAME)
}

/// Manifest changes implied by `event`. Events on other files yield nothing.
pub fn manifest_changes(event: &NormalizedEvent) -> Vec<ManifestChange> {
    let change = |path: &Path, kind| {
        is_manifest(path).then(|| ManifestChange::new(ManifestLocation::new(path), kind))
    };
    match event {
        NormalizedEvent::Created(path) => change(path, ManifestChangeKind::Added).into_iter().collect(),
        NormalizedEvent::Modified(path) => {
            change(path, ManifestChangeKind::Modified).into_iter().collect()
        }
        NormalizedEvent::Deleted(path) => {
            change(path, ManifestChangeKind::Removed).into_iter().collect()
        }
        NormalizedEvent::Moved { from, to } => change(from, ManifestChangeKind::Removed)
            .into_iter()
            .chain(change(to, ManifestChangeKind::Added))
            .collect(),
    }
}
