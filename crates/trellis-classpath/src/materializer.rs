use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use trellis_project::{ArtifactResolutionError, ArtifactResolver, ResolvedArtifact};
use trellis_scheduler::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Source,
    Doc,
}

impl AttachmentKind {
    /// Classifier of the attachment for an artifact with `classifier`.
    pub fn classifier_for(self, classifier: Option<&str>) -> &'static str {
        let tests = classifier == Some("tests");
        match (self, tests) {
            (AttachmentKind::Source, false) => "sources",
            (AttachmentKind::Source, true) => "test-sources",
            (AttachmentKind::Doc, false) => "javadoc",
            (AttachmentKind::Doc, true) => "test-javadoc",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeOptions {
    pub download_sources: bool,
    pub download_javadoc: bool,
}

#[derive(Debug, Error)]
pub enum MaterializationError {
    #[error("failed to fetch {classifier} attachment of {coordinate}: {source}")]
    Fetch {
        coordinate: String,
        classifier: &'static str,
        #[source]
        source: ArtifactResolutionError,
    },
    #[error("attachment lookup cancelled")]
    Cancelled,
}

/// Finds source and documentation attachments for library entries.
///
/// A sibling file next to the archive is always preferred; the artifact resolver is only asked
/// when the matching download option is on. A missing attachment is not an error.
#[derive(Clone)]
pub struct ArtifactMaterializer {
    resolver: Arc<dyn ArtifactResolver>,
    options: MaterializeOptions,
}

impl std::fmt::Debug for ArtifactMaterializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactMaterializer")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ArtifactMaterializer {
    pub fn new(resolver: Arc<dyn ArtifactResolver>, options: MaterializeOptions) -> Self {
        Self { resolver, options }
    }

    pub fn options(&self) -> MaterializeOptions {
        self.options
    }

    pub fn materialize(
        &self,
        artifact: &ResolvedArtifact,
        kind: AttachmentKind,
        token: &CancellationToken,
    ) -> Result<Option<PathBuf>, MaterializationError> {
        if token.is_cancelled() {
            return Err(MaterializationError::Cancelled);
        }
        let coordinate = &artifact.coordinate;
        let classifier = kind.classifier_for(coordinate.classifier.as_deref());

        if let Some(sibling) = artifact
            .archive_path
            .as_deref()
            .and_then(|archive| sibling_path(archive, artifact, classifier))
            .filter(|path| path.is_file())
        {
            return Ok(Some(sibling));
        }

        let download = match kind {
            AttachmentKind::Source => self.options.download_sources,
            AttachmentKind::Doc => self.options.download_javadoc,
        };
        if !download {
            return Ok(None);
        }

        match self
            .resolver
            .fetch_classified(&coordinate.gav(), classifier, "jar", token)
        {
            Ok(path) => Ok(Some(path)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(ArtifactResolutionError::Cancelled) => Err(MaterializationError::Cancelled),
            Err(source) => Err(MaterializationError::Fetch {
                coordinate: coordinate.to_string(),
                classifier,
                source,
            }),
        }
    }

    pub fn sources(
        &self,
        artifact: &ResolvedArtifact,
        token: &CancellationToken,
    ) -> Result<Option<PathBuf>, MaterializationError> {
        self.materialize(artifact, AttachmentKind::Source, token)
    }

    /// Documentation location: a javadoc archive as a `jar:` URL, else the artifact's
    /// `<homepage>/apidocs/`.
    pub fn doc_url(
        &self,
        artifact: &ResolvedArtifact,
        token: &CancellationToken,
    ) -> Result<Option<String>, MaterializationError> {
        if let Some(path) = self.materialize(artifact, AttachmentKind::Doc, token)? {
            return Ok(Some(jar_url(&path)));
        }
        Ok(artifact
            .homepage
            .as_deref()
            .map(str::trim)
            .filter(|homepage| !homepage.is_empty())
            .map(|homepage| format!("{}/apidocs/", homepage.trim_end_matches('/'))))
    }
}

/// `<artifactId>-<version>-<classifier>.jar` in the archive's directory.
fn sibling_path(archive: &Path, artifact: &ResolvedArtifact, classifier: &str) -> Option<PathBuf> {
    let coordinate = &artifact.coordinate;
    let dir = archive.parent()?;
    Some(dir.join(format!(
        "{}-{}-{classifier}.jar",
        coordinate.artifact_id, coordinate.version
    )))
}

fn jar_url(path: &Path) -> String {
    let mut text = path.to_string_lossy().replace('\\', "/");
    if !text.starts_with('/') {
        text.insert(0, '/');
    }
    format!("jar:file:{text}!/")
}
