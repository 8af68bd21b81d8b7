use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use trellis_classpath::{
    ArtifactMaterializer, ClasspathResolver, CoordinateIndex, MaterializeOptions, ModuleRegistry,
    ResolutionResult, ResolveConfig, WorkspaceArtifactLocator,
};
use trellis_config::TrellisConfig;
use trellis_core::ManifestLocation;
use trellis_project::{LocalRepository, MavenProjectEngine, ModelCache, ProjectModelEngine};
use trellis_scheduler::{CancellationToken, Cancelled, Scheduler};

use crate::state::WorkspaceState;
use crate::{
    manifest_changes, ClasspathStore, ManifestChange, ManifestChangeKind, NormalizedEvent,
    RefreshScheduler,
};

/// Settings a [`ClasspathManager`] is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSettings {
    pub local_repository: PathBuf,
    pub resolve: ResolveConfig,
    pub materialize: MaterializeOptions,
    pub debounce: Duration,
}

impl ManagerSettings {
    pub fn from_config(config: &TrellisConfig) -> Self {
        Self {
            local_repository: config.maven.local_repository(),
            resolve: ResolveConfig {
                include_modules: config.resolution.include_modules,
                resolve_workspace_projects: config.resolution.resolve_workspace_projects,
                active_profiles: config.active_profiles(),
            },
            materialize: MaterializeOptions {
                download_sources: config.resolution.download_sources,
                download_javadoc: config.resolution.download_javadoc,
            },
            debounce: config.refresh.debounce(),
        }
    }
}

/// Keeps the classpaths of one workspace's modules current.
///
/// Owns the coordinate index, model cache and module registry; nothing is global. Changes
/// arrive through [`ClasspathManager::manifest_changed`] (debounced) or
/// [`ClasspathManager::resolve_now`] (immediate).
pub struct ClasspathManager {
    state: Arc<WorkspaceState>,
    refresh: RefreshScheduler,
    scheduler: Scheduler,
}

impl ClasspathManager {
    pub fn new(
        scheduler: Scheduler,
        store: Arc<dyn ClasspathStore>,
        settings: ManagerSettings,
    ) -> Self {
        let engine = Arc::new(MavenProjectEngine::with_repository(
            settings.local_repository.clone(),
        ));
        Self::with_engine(scheduler, store, settings, engine)
    }

    /// Like [`ClasspathManager::new`] with a custom project model engine.
    pub fn with_engine(
        scheduler: Scheduler,
        store: Arc<dyn ClasspathStore>,
        settings: ManagerSettings,
        engine: Arc<dyn ProjectModelEngine>,
    ) -> Self {
        let index = Arc::new(CoordinateIndex::new());
        let registry = Arc::new(ModuleRegistry::new());
        let cache = Arc::new(ModelCache::with_profiles(
            engine,
            settings.resolve.active_profiles.clone(),
        ));
        let locator = WorkspaceArtifactLocator::new(index.clone(), registry.clone());
        let repository = Arc::new(
            LocalRepository::new(settings.local_repository.clone())
                .with_workspace_lookup(locator.pom_lookup(cache.clone())),
        );
        let resolver = ClasspathResolver::new(
            cache.clone(),
            repository.clone(),
            locator,
            registry.clone(),
            ArtifactMaterializer::new(repository, settings.materialize),
        );
        let state = Arc::new(WorkspaceState {
            index,
            cache,
            registry,
            resolver,
            store,
            config: settings.resolve,
            lock: Mutex::new(()),
        });
        let refresh = RefreshScheduler::new(state.clone(), scheduler.clone(), settings.debounce);
        Self {
            state,
            refresh,
            scheduler,
        }
    }

    pub fn index(&self) -> &Arc<CoordinateIndex> {
        &self.state.index
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.state.cache
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.state.registry
    }

    pub fn refresh(&self) -> &RefreshScheduler {
        &self.refresh
    }

    pub fn config(&self) -> &ResolveConfig {
        &self.state.config
    }

    /// Queue a changed manifest for the next refresh pass.
    pub fn manifest_changed(&self, change: ManifestChange) {
        tracing::debug!(
            target = "trellis.refresh",
            location = %change.location,
            kind = ?change.kind,
            "manifest changed"
        );
        if change.kind == ManifestChangeKind::Removed {
            // A deleted module loses its open/closed state and overrides right away.
            self.state.registry.forget(&change.location);
        }
        self.refresh.queue([change.location]);
    }

    /// Feed a watcher event; non-manifest paths are ignored.
    pub fn handle_fs_event(&self, event: &NormalizedEvent) {
        for change in manifest_changes(event) {
            self.manifest_changed(change);
        }
    }

    /// Re-read and resolve `location` right away and publish the result, bypassing the queue.
    ///
    /// `config` replaces the workspace defaults for this call; per-module overrides still apply.
    /// Manifests affected by what changed in `location` are queued for the next refresh pass.
    pub fn resolve_now(
        &self,
        location: &ManifestLocation,
        config: Option<&ResolveConfig>,
        token: &CancellationToken,
    ) -> Result<ResolutionResult, Cancelled> {
        let state = &self.state;
        let _serialized = state.lock.lock();
        Cancelled::check(token)?;

        let base = config.cloned().unwrap_or_else(|| state.config.clone());
        let config = base.with_overrides(state.registry.overrides(location).as_ref());
        // Edges of the old model, then of the new one.
        let mut stale = state.index.affected_by(location);
        stale.extend(state.index.children_of(location));
        state.cache.invalidate(location);
        let conflict = match state.cache.get_with_profiles(location, &config.active_profiles) {
            Ok(model) => state.index.update(location, &model),
            Err(_) => {
                state.index.remove(location);
                None
            }
        };
        stale.extend(state.index.affected_by(location));
        stale.extend(state.index.children_of(location));
        stale.remove(location);
        if !stale.is_empty() {
            tracing::debug!(
                target = "trellis.refresh",
                location = %location,
                queued = stale.len(),
                "queueing manifests affected by immediate resolve"
            );
            self.refresh.queue(stale);
        }

        let outcome = state.resolve_guarded(location, &config, token).and_then(|result| {
            Cancelled::check(token)?;
            Ok(result)
        });
        let mut result = match outcome {
            Ok(result) => result,
            Err(Cancelled) => {
                // The index already reflects the new model; publish it with the next pass.
                self.refresh.queue([location.clone()]);
                return Err(Cancelled);
            }
        };
        if let Some(conflict) = conflict {
            result.diagnostics.insert(0, conflict);
        }
        state.store.publish_classpath(location, &result);
        state.store.report_diagnostics(location, &result.diagnostics);
        Ok(result)
    }

    /// Startup rebuild: index every manifest, then resolve and publish them in one batch.
    pub fn initialize(
        &self,
        manifests: &[ManifestLocation],
        token: &CancellationToken,
    ) -> Result<Vec<ResolutionResult>, Cancelled> {
        let state = &self.state;
        let _serialized = state.lock.lock();
        let progress = self
            .scheduler
            .progress()
            .start("Initializing classpaths", Some(manifests.len()));
        let outcome = state.rebuild(manifests, token, &progress);
        match &outcome {
            Ok(results) => {
                progress.finish(Some(format!("{} classpaths resolved", results.len())));
                tracing::info!(
                    target = "trellis.refresh",
                    modules = results.len(),
                    "workspace classpaths initialized"
                );
            }
            Err(Cancelled) => progress.finish(Some("cancelled".to_string())),
        }
        outcome
    }

    /// Run any pending refresh now.
    pub fn flush(&self, token: &CancellationToken) -> Result<Vec<ManifestLocation>, Cancelled> {
        self.refresh.flush(token)
    }
}

impl Drop for ClasspathManager {
    fn drop(&mut self) {
        self.refresh.shutdown();
    }
}
