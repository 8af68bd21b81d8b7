use std::path::{Path, PathBuf};

/// A manifest could not be turned into a [`crate::ModuleModel`].
#[derive(Debug, thiserror::Error)]
pub enum ModelReadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse XML in {}: {source}", path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("invalid project model {}: {message}", path.display())]
    Invalid {
        path: PathBuf,
        line: Option<u32>,
        message: String,
    },
}

impl ModelReadError {
    pub fn path(&self) -> &Path {
        match self {
            ModelReadError::Io { path, .. }
            | ModelReadError::Xml { path, .. }
            | ModelReadError::Invalid { path, .. } => path,
        }
    }

    /// 1-based line of the problem, when known.
    pub fn line(&self) -> Option<u32> {
        match self {
            ModelReadError::Io { .. } => None,
            ModelReadError::Xml { source, .. } => Some(source.pos().row),
            ModelReadError::Invalid { line, .. } => *line,
        }
    }

    pub(crate) fn invalid(path: &Path, line: Option<u32>, message: impl Into<String>) -> Self {
        ModelReadError::Invalid {
            path: path.to_path_buf(),
            line,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactResolutionError {
    #[error("artifact {coordinate} not found")]
    NotFound { coordinate: String },

    #[error("artifact {coordinate} has no resolved version")]
    UnresolvedVersion { coordinate: String },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl ArtifactResolutionError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArtifactResolutionError::NotFound { .. })
    }
}
