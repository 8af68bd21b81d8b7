use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use parking_lot::Mutex;
use trellis_classpath::{
    model_read_diagnostic, ClasspathResolver, CoordinateIndex, ModuleRegistry, ResolutionResult,
    ResolveConfig,
};
use trellis_core::{panic_payload_to_str, Diagnostic, DiagnosticKind, ManifestLocation};
use trellis_project::ModelCache;
use trellis_scheduler::{CancellationToken, Cancelled, Progress};

use crate::ClasspathStore;

/// Everything a refresh pass reads and writes, shared by the manager and the refresh queue.
pub(crate) struct WorkspaceState {
    pub(crate) index: Arc<CoordinateIndex>,
    pub(crate) cache: Arc<ModelCache>,
    pub(crate) registry: Arc<ModuleRegistry>,
    pub(crate) resolver: ClasspathResolver,
    pub(crate) store: Arc<dyn ClasspathStore>,
    pub(crate) config: ResolveConfig,
    /// Serializes passes, `resolve_now` and `initialize`.
    pub(crate) lock: Mutex<()>,
}

/// Outcome of re-reading one manifest.
enum Reindexed {
    Indexed(Vec<Diagnostic>),
    Unreadable(Vec<Diagnostic>),
    Removed,
}

/// A pass that stopped early, with every location it had started on.
pub(crate) struct Abandoned {
    pub(crate) locations: BTreeSet<ManifestLocation>,
}

impl WorkspaceState {
    pub(crate) fn config_for(&self, location: &ManifestLocation) -> ResolveConfig {
        self.config
            .clone()
            .with_overrides(self.registry.overrides(location).as_ref())
    }

    /// Drop and re-read what is known about `location`.
    fn reindex(&self, location: &ManifestLocation) -> Reindexed {
        self.cache.invalidate(location);
        if !location.exists() {
            self.index.remove(location);
            self.registry.forget(location);
            tracing::debug!(target = "trellis.refresh", location = %location, "manifest removed");
            return Reindexed::Removed;
        }
        let profiles = self.config_for(location).active_profiles;
        match self.cache.get_with_profiles(location, &profiles) {
            Ok(model) => Reindexed::Indexed(self.index.update(location, &model).into_iter().collect()),
            Err(err) => {
                // A module that cannot be read publishes nothing until it is fixed.
                self.index.remove(location);
                tracing::debug!(
                    target = "trellis.refresh",
                    location = %location,
                    error = %err,
                    "manifest unreadable"
                );
                Reindexed::Unreadable(vec![model_read_diagnostic(location, &err)])
            }
        }
    }

    fn reindex_guarded(&self, location: &ManifestLocation) -> Reindexed {
        match std::panic::catch_unwind(AssertUnwindSafe(|| self.reindex(location))) {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_payload_to_str(&*panic);
                tracing::error!(
                    target = "trellis.refresh",
                    location = %location,
                    panic = %message,
                    "reading manifest panicked"
                );
                self.index.remove(location);
                Reindexed::Unreadable(vec![internal_error(location, message)])
            }
        }
    }

    /// Resolve one module. A panic becomes an error diagnostic on that module.
    pub(crate) fn resolve_guarded(
        &self,
        location: &ManifestLocation,
        config: &ResolveConfig,
        token: &CancellationToken,
    ) -> Result<ResolutionResult, Cancelled> {
        match std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.resolver.resolve(location, config, token)
        })) {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_payload_to_str(&*panic);
                tracing::error!(
                    target = "trellis.refresh",
                    location = %location,
                    panic = %message,
                    "classpath resolution panicked"
                );
                Ok(ResolutionResult::failed(
                    location.clone(),
                    vec![internal_error(location, message)],
                ))
            }
        }
    }

    /// Re-read `changed` and the manifests inheriting from it, collect everything whose classpath
    /// includes them (transitively), resolve all of it and publish one batch. Caller holds `lock`.
    ///
    /// Returns the published locations, or the locations to retry when cancelled.
    pub(crate) fn refresh_pass(
        &self,
        changed: &BTreeSet<ManifestLocation>,
        token: &CancellationToken,
        progress: &Progress,
    ) -> Result<Vec<ManifestLocation>, Abandoned> {
        let mut touched: BTreeSet<ManifestLocation> = BTreeSet::new();
        let abandon = |touched: &BTreeSet<ManifestLocation>| Abandoned {
            locations: changed.union(touched).cloned().collect(),
        };

        let mut extra: BTreeMap<ManifestLocation, Vec<Diagnostic>> = BTreeMap::new();
        let mut unreadable: BTreeMap<ManifestLocation, Vec<Diagnostic>> = BTreeMap::new();
        let mut removed: BTreeSet<ManifestLocation> = BTreeSet::new();
        let mut queue: VecDeque<ManifestLocation> = VecDeque::new();

        // Inheriting manifests bake their parent into their models; they are re-read too.
        let mut reread: VecDeque<ManifestLocation> = changed.iter().cloned().collect();
        let mut affected: BTreeSet<ManifestLocation> = changed.clone();
        while let Some(location) = reread.pop_front() {
            if token.is_cancelled() {
                return Err(abandon(&touched));
            }
            touched.insert(location.clone());
            // Edges of the old model, then of the new one.
            queue.extend(self.index.affected_by(&location));
            let mut children = self.index.children_of(&location);
            match self.reindex_guarded(&location) {
                Reindexed::Indexed(diagnostics) => {
                    extra.insert(location.clone(), diagnostics);
                }
                Reindexed::Unreadable(diagnostics) => {
                    unreadable.insert(location.clone(), diagnostics);
                }
                Reindexed::Removed => {
                    removed.insert(location.clone());
                }
            }
            queue.extend(self.index.affected_by(&location));
            children.extend(self.index.children_of(&location));
            for child in children {
                if affected.insert(child.clone()) {
                    reread.push_back(child);
                }
            }
        }

        while let Some(location) = queue.pop_front() {
            if affected.insert(location.clone()) {
                queue.extend(self.index.affected_by(&location));
            }
        }
        tracing::debug!(
            target = "trellis.refresh",
            changed = changed.len(),
            affected = affected.len(),
            removed = removed.len(),
            "refresh pass"
        );

        let mut results = Vec::with_capacity(affected.len());
        for location in &affected {
            if token.is_cancelled() {
                return Err(abandon(&touched));
            }
            touched.insert(location.clone());
            if removed.contains(location) {
                continue;
            }
            if let Some(diagnostics) = unreadable.remove(location) {
                results.push(ResolutionResult::failed(location.clone(), diagnostics));
                progress.step(Some(location.to_string()));
                continue;
            }
            let config = self.config_for(location);
            let mut result = match self.resolve_guarded(location, &config, token) {
                Ok(result) => result,
                Err(Cancelled) => return Err(abandon(&touched)),
            };
            if let Some(mut diagnostics) = extra.remove(location) {
                diagnostics.append(&mut result.diagnostics);
                result.diagnostics = diagnostics;
            }
            results.push(result);
            progress.step(Some(location.to_string()));
        }

        if token.is_cancelled() {
            return Err(abandon(&touched));
        }
        for location in &removed {
            self.store.forget(location);
        }
        self.store.publish_batch(&results);
        let mut published: Vec<ManifestLocation> =
            results.into_iter().map(|result| result.location).collect();
        published.extend(removed);
        Ok(published)
    }

    /// Rebuild the index from `manifests`, then resolve and publish all of them in one batch.
    /// Caller holds `lock`.
    pub(crate) fn rebuild(
        &self,
        manifests: &[ManifestLocation],
        token: &CancellationToken,
        progress: &Progress,
    ) -> Result<Vec<ResolutionResult>, Cancelled> {
        self.index.clear();
        self.cache.clear();

        let mut extra: BTreeMap<ManifestLocation, Vec<Diagnostic>> = BTreeMap::new();
        let mut unreadable: BTreeMap<ManifestLocation, Vec<Diagnostic>> = BTreeMap::new();
        for location in manifests {
            Cancelled::check(token)?;
            match self.reindex_guarded(location) {
                Reindexed::Indexed(diagnostics) => {
                    extra.insert(location.clone(), diagnostics);
                }
                Reindexed::Unreadable(diagnostics) => {
                    unreadable.insert(location.clone(), diagnostics);
                }
                Reindexed::Removed => {}
            }
        }

        let mut results = Vec::with_capacity(manifests.len());
        for location in manifests {
            Cancelled::check(token)?;
            if let Some(diagnostics) = unreadable.remove(location) {
                results.push(ResolutionResult::failed(location.clone(), diagnostics));
            } else if let Some(mut diagnostics) = extra.remove(location) {
                let config = self.config_for(location);
                let mut result = self.resolve_guarded(location, &config, token)?;
                diagnostics.append(&mut result.diagnostics);
                result.diagnostics = diagnostics;
                results.push(result);
            }
            progress.step(Some(location.to_string()));
        }

        Cancelled::check(token)?;
        self.store.publish_batch(&results);
        Ok(results)
    }
}

fn internal_error(location: &ManifestLocation, message: &str) -> Diagnostic {
    Diagnostic::error(
        location.clone(),
        DiagnosticKind::ArtifactResolution,
        format!("internal error while resolving classpath: {message}"),
    )
}
