use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use trellis_core::{Diagnostic, DiagnosticKind, ManifestLocation, ModuleCoordinate};
use trellis_project::{ArtifactResolver, ModelCache, ModelReadError, ModuleModel, ResolvedArtifact};
use trellis_scheduler::{CancellationToken, Cancelled};

use crate::{
    ArtifactMaterializer, ClasspathEntry, EntryAttributes, MaterializationError, ModuleRegistry,
    ResolutionResult, ResolveOverrides, WorkspaceArtifactLocator,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveConfig {
    /// Recurse into declared sub-modules.
    pub include_modules: bool,
    /// Substitute open workspace modules for their published artifacts.
    pub resolve_workspace_projects: bool,
    pub active_profiles: Vec<String>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            include_modules: true,
            resolve_workspace_projects: true,
            active_profiles: Vec::new(),
        }
    }
}

impl ResolveConfig {
    pub fn with_overrides(mut self, overrides: Option<&ResolveOverrides>) -> Self {
        let Some(overrides) = overrides else {
            return self;
        };
        if let Some(include_modules) = overrides.include_modules {
            self.include_modules = include_modules;
        }
        if let Some(resolve_workspace_projects) = overrides.resolve_workspace_projects {
            self.resolve_workspace_projects = resolve_workspace_projects;
        }
        if let Some(profiles) = &overrides.active_profiles {
            self.active_profiles = profiles.clone();
        }
        self
    }
}

/// `ModelRead` error for a manifest that could not be read.
pub fn model_read_diagnostic(location: &ManifestLocation, err: &ModelReadError) -> Diagnostic {
    Diagnostic::error(location.clone(), DiagnosticKind::ModelRead, err.to_string())
        .with_line(err.line())
}

/// State threaded through one resolution call tree.
struct ResolveContext<'a> {
    root: ManifestLocation,
    config: &'a ResolveConfig,
    token: &'a CancellationToken,
    /// The root and every module reachable through `<modules>`.
    tree: BTreeSet<ManifestLocation>,
    tree_coordinates: HashSet<ModuleCoordinate>,
    visited: HashSet<ModuleCoordinate>,
    walked: HashSet<ManifestLocation>,
    substituted: Vec<ManifestLocation>,
    entries: Vec<ClasspathEntry>,
    diagnostics: Vec<Diagnostic>,
}

/// Synthesizes the classpath of a module from its resolved dependency set.
pub struct ClasspathResolver {
    cache: Arc<ModelCache>,
    artifacts: Arc<dyn ArtifactResolver>,
    locator: WorkspaceArtifactLocator,
    registry: Arc<ModuleRegistry>,
    materializer: ArtifactMaterializer,
}

impl ClasspathResolver {
    pub fn new(
        cache: Arc<ModelCache>,
        artifacts: Arc<dyn ArtifactResolver>,
        locator: WorkspaceArtifactLocator,
        registry: Arc<ModuleRegistry>,
        materializer: ArtifactMaterializer,
    ) -> Self {
        Self {
            cache,
            artifacts,
            locator,
            registry,
            materializer,
        }
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Resolve the module at `root`.
    ///
    /// Failures are diagnostics on the result; only cancellation is an error, and a cancelled
    /// call returns nothing partial.
    pub fn resolve(
        &self,
        root: &ManifestLocation,
        config: &ResolveConfig,
        token: &CancellationToken,
    ) -> Result<ResolutionResult, Cancelled> {
        Cancelled::check(token)?;
        let model = match self.cache.get_with_profiles(root, &config.active_profiles) {
            Ok(model) => model,
            Err(err) => {
                tracing::debug!(
                    target = "trellis.classpath",
                    location = %root,
                    error = %err,
                    "root manifest unreadable"
                );
                return Ok(ResolutionResult::failed(
                    root.clone(),
                    vec![model_read_diagnostic(root, &err)],
                ));
            }
        };

        let mut ctx = ResolveContext {
            root: root.clone(),
            config,
            token,
            tree: BTreeSet::new(),
            tree_coordinates: HashSet::new(),
            visited: HashSet::new(),
            walked: HashSet::new(),
            substituted: Vec::new(),
            entries: Vec::new(),
            diagnostics: Vec::new(),
        };
        self.collect_tree(&model, &mut ctx);
        self.walk_module(&model, &mut ctx)?;
        self.detect_cycles(&mut ctx)?;

        let entries = ResolutionResult::dedupe(std::mem::take(&mut ctx.entries));
        tracing::debug!(
            target = "trellis.classpath",
            location = %root,
            entries = entries.len(),
            diagnostics = ctx.diagnostics.len(),
            "resolved classpath"
        );
        Ok(ResolutionResult {
            location: root.clone(),
            entries,
            diagnostics: ctx.diagnostics,
        })
    }

    /// Modules reachable through `<modules>` from the root, with the coordinates they publish.
    /// Unreadable members stay in the tree; their diagnostics come from the walk.
    fn collect_tree(&self, root: &ModuleModel, ctx: &mut ResolveContext<'_>) {
        ctx.tree.insert(root.location.clone());
        ctx.tree_coordinates.insert(root.coordinate.gav());
        if !ctx.config.include_modules {
            return;
        }
        let mut queue: VecDeque<ManifestLocation> = root.sub_module_locations().into();
        while let Some(location) = queue.pop_front() {
            if !ctx.tree.insert(location.clone()) {
                continue;
            }
            if let Ok(model) = self
                .cache
                .get_with_profiles(&location, &ctx.config.active_profiles)
            {
                ctx.tree_coordinates.insert(model.coordinate.gav());
                queue.extend(model.sub_module_locations());
            }
        }
    }

    fn walk_module(&self, model: &ModuleModel, ctx: &mut ResolveContext<'_>) -> Result<(), Cancelled> {
        if !ctx.walked.insert(model.location.clone()) {
            return Ok(());
        }
        let own = model.coordinate.gav();
        let substitute = ctx.config.resolve_workspace_projects
            && !(model.is_war() && self.registry.is_dynamic_web(&model.location));

        for artifact in self.artifacts.resolved_artifacts(model) {
            Cancelled::check(ctx.token)?;
            if !ctx.visited.insert(artifact.coordinate.clone()) {
                continue;
            }
            let gav = artifact.coordinate.gav();
            if gav == own || ctx.tree_coordinates.contains(&gav) {
                continue;
            }

            if substitute {
                if let Some(location) = self.locator.locate(&artifact.coordinate) {
                    if ctx.tree.contains(&location) {
                        continue;
                    }
                    tracing::trace!(
                        target = "trellis.classpath",
                        module = %model.location,
                        coordinate = %artifact.coordinate,
                        project = %location,
                        "substituting workspace module"
                    );
                    ctx.substituted.push(location.clone());
                    ctx.entries.push(ClasspathEntry::Project { location });
                    continue;
                }
            }

            if let Some(entry) = self.library_entry(model, &artifact, ctx)? {
                ctx.entries.push(entry);
            }
        }

        if ctx.config.include_modules {
            for location in model.sub_module_locations() {
                Cancelled::check(ctx.token)?;
                match self
                    .cache
                    .get_with_profiles(&location, &ctx.config.active_profiles)
                {
                    Ok(sub) => self.walk_module(&sub, ctx)?,
                    Err(err) => {
                        tracing::debug!(
                            target = "trellis.classpath",
                            location = %location,
                            error = %err,
                            "sub-module manifest unreadable"
                        );
                        ctx.walked.insert(location.clone());
                        ctx.diagnostics.push(model_read_diagnostic(&location, &err));
                    }
                }
            }
        }
        Ok(())
    }

    fn library_entry(
        &self,
        model: &ModuleModel,
        artifact: &ResolvedArtifact,
        ctx: &mut ResolveContext<'_>,
    ) -> Result<Option<ClasspathEntry>, Cancelled> {
        let Some(archive_path) = artifact.archive_path.clone() else {
            let line = model
                .declared(&artifact.coordinate)
                .and_then(|dep| dep.line);
            ctx.diagnostics.push(
                Diagnostic::error(
                    model.location.clone(),
                    DiagnosticKind::ArtifactResolution,
                    format!("missing artifact {}", artifact.coordinate),
                )
                .with_line(line),
            );
            return Ok(None);
        };

        let source_path = self.attachment(model, artifact, ctx, |m, a, t| m.sources(a, t))?;
        let doc_url = match source_path {
            Some(_) => None,
            None => self.attachment(model, artifact, ctx, |m, a, t| m.doc_url(a, t))?,
        };

        Ok(Some(ClasspathEntry::Library {
            archive_path,
            source_path,
            doc_url,
            attributes: EntryAttributes {
                coordinate: artifact.coordinate.clone(),
                scope: artifact.scope,
                optional: artifact.optional,
                non_exported: artifact.scope.is_non_exported(),
            },
        }))
    }

    /// Run one attachment lookup, downgrading failures to a warning on `model`.
    fn attachment<T>(
        &self,
        model: &ModuleModel,
        artifact: &ResolvedArtifact,
        ctx: &mut ResolveContext<'_>,
        lookup: impl FnOnce(
            &ArtifactMaterializer,
            &ResolvedArtifact,
            &CancellationToken,
        ) -> Result<Option<T>, MaterializationError>,
    ) -> Result<Option<T>, Cancelled> {
        match lookup(&self.materializer, artifact, ctx.token) {
            Ok(found) => Ok(found),
            Err(MaterializationError::Cancelled) => Err(Cancelled),
            Err(err) => {
                tracing::warn!(
                    target = "trellis.classpath",
                    module = %model.location,
                    coordinate = %artifact.coordinate,
                    error = %err,
                    "attachment lookup failed"
                );
                ctx.diagnostics.push(Diagnostic::warning(
                    model.location.clone(),
                    DiagnosticKind::Materialization,
                    err.to_string(),
                ));
                Ok(None)
            }
        }
    }

    /// Warn when a substituted workspace module leads back into the root's tree.
    fn detect_cycles(&self, ctx: &mut ResolveContext<'_>) -> Result<(), Cancelled> {
        let mut reported = HashSet::new();
        let substituted = std::mem::take(&mut ctx.substituted);
        for start in substituted {
            let mut seen = HashSet::new();
            let mut queue = VecDeque::from([start.clone()]);
            while let Some(location) = queue.pop_front() {
                Cancelled::check(ctx.token)?;
                if !seen.insert(location.clone()) {
                    continue;
                }
                let Ok(model) = self
                    .cache
                    .get_with_profiles(&location, &ctx.config.active_profiles)
                else {
                    continue;
                };
                for dep in &model.dependencies {
                    let Some(target) = self.locator.locate(&dep.coordinate) else {
                        continue;
                    };
                    if ctx.tree.contains(&target) {
                        if reported.insert(start.clone()) {
                            tracing::warn!(
                                target = "trellis.classpath",
                                root = %ctx.root,
                                via = %start,
                                "workspace dependency cycle"
                            );
                            ctx.diagnostics.push(Diagnostic::warning(
                                ctx.root.clone(),
                                DiagnosticKind::Cycle,
                                format!(
                                    "dependency cycle: {} depends back on {} through {}",
                                    start, target, location
                                ),
                            ));
                        }
                    } else {
                        queue.push_back(target);
                    }
                }
            }
        }
        Ok(())
    }
}
