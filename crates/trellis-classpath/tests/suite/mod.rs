mod resolver;
mod scenarios;

use std::path::Path;
use std::sync::Arc;

use trellis_classpath::{
    ArtifactMaterializer, ClasspathEntry, ClasspathResolver, CoordinateIndex, MaterializeOptions,
    ModuleRegistry, ResolutionResult, WorkspaceArtifactLocator,
};
use trellis_core::ManifestLocation;
use trellis_project::{LocalRepository, MavenProjectEngine, ModelCache};
use trellis_test_utils::maven::MavenWorkspace;

/// A workspace on disk plus the shared state a resolver reads.
pub(crate) struct Fixture {
    pub(crate) ws: MavenWorkspace,
    pub(crate) index: Arc<CoordinateIndex>,
    pub(crate) registry: Arc<ModuleRegistry>,
    pub(crate) cache: Arc<ModelCache>,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let ws = MavenWorkspace::new();
        let engine = Arc::new(MavenProjectEngine::with_repository(ws.repository()));
        Self {
            ws,
            index: Arc::new(CoordinateIndex::new()),
            registry: Arc::new(ModuleRegistry::new()),
            cache: Arc::new(ModelCache::new(engine)),
        }
    }

    /// Read and index a manifest, as a refresh pass would.
    pub(crate) fn index(&self, manifest: &Path) -> ManifestLocation {
        let location = ManifestLocation::new(manifest);
        self.cache.invalidate(&location);
        let model = self.cache.get(&location).expect("fixture manifest reads");
        self.index.update(&location, &model);
        location
    }

    pub(crate) fn resolver(&self) -> ClasspathResolver {
        self.resolver_with(MaterializeOptions::default())
    }

    pub(crate) fn resolver_with(&self, options: MaterializeOptions) -> ClasspathResolver {
        let locator = WorkspaceArtifactLocator::new(self.index.clone(), self.registry.clone());
        let repository = Arc::new(
            LocalRepository::new(self.ws.repository())
                .with_workspace_lookup(locator.pom_lookup(self.cache.clone())),
        );
        ClasspathResolver::new(
            self.cache.clone(),
            repository.clone(),
            locator,
            self.registry.clone(),
            ArtifactMaterializer::new(repository, options),
        )
    }
}

pub(crate) fn projects(result: &ResolutionResult) -> Vec<ManifestLocation> {
    result
        .entries
        .iter()
        .filter_map(ClasspathEntry::project_location)
        .cloned()
        .collect()
}

pub(crate) fn library_ids(result: &ResolutionResult) -> Vec<String> {
    result
        .entries
        .iter()
        .filter_map(ClasspathEntry::attributes)
        .map(|attrs| attrs.coordinate.artifact_id.clone())
        .collect()
}
