use std::sync::Arc;

use trellis_core::{ManifestLocation, ModuleCoordinate};
use trellis_project::{ModelCache, WorkspacePomLookup};

use crate::{CoordinateIndex, ModuleRegistry};

/// Answers "does an open workspace module publish this coordinate?".
///
/// Classifier and type are ignored: a workspace module stands in for all of its attached
/// artifacts.
#[derive(Debug, Clone)]
pub struct WorkspaceArtifactLocator {
    index: Arc<CoordinateIndex>,
    registry: Arc<ModuleRegistry>,
}

impl WorkspaceArtifactLocator {
    pub fn new(index: Arc<CoordinateIndex>, registry: Arc<ModuleRegistry>) -> Self {
        Self { index, registry }
    }

    pub fn locate(&self, coordinate: &ModuleCoordinate) -> Option<ManifestLocation> {
        self.index
            .published_by(coordinate)
            .filter(|location| self.registry.is_open(location))
    }

    /// Models of located modules, read through `cache` with each module's own active profiles.
    ///
    /// Transitive lookups then see the same models the index was built from.
    pub fn pom_lookup(&self, cache: Arc<ModelCache>) -> WorkspacePomLookup {
        let locator = self.clone();
        Arc::new(move |coordinate: &ModuleCoordinate| {
            let location = locator.locate(coordinate)?;
            let profiles = locator
                .registry
                .overrides(&location)
                .and_then(|overrides| overrides.active_profiles)
                .unwrap_or_else(|| cache.profiles().to_vec());
            match cache.get_with_profiles(&location, &profiles) {
                Ok(model) => Some(model),
                Err(err) => {
                    tracing::debug!(
                        target = "trellis.classpath",
                        location = %location,
                        error = %err,
                        "workspace POM unreadable; not following its dependencies"
                    );
                    None
                }
            }
        })
    }
}
