use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use trellis_core::ModuleCoordinate;
use trellis_scheduler::CancellationToken;

use crate::{
    ArtifactResolutionError, DependencyRef, Exclusion, MavenProjectEngine, ModuleModel,
    ResolvedArtifact, Scope,
};

/// Resolves a module's dependency set to concrete artifacts.
pub trait ArtifactResolver: Send + Sync {
    /// The module's direct and transitive dependencies, in resolution order (nearest first).
    fn resolved_artifacts(&self, model: &ModuleModel) -> Vec<ResolvedArtifact>;

    /// Locate an attached artifact such as `-sources.jar`.
    fn fetch_classified(
        &self,
        coordinate: &ModuleCoordinate,
        classifier: &str,
        extension: &str,
        token: &CancellationToken,
    ) -> Result<PathBuf, ArtifactResolutionError>;
}

/// Finds the model of a workspace module publishing a coordinate, so transitive dependencies of
/// not-yet-installed workspace modules are still visible.
pub type WorkspacePomLookup = Arc<dyn Fn(&ModuleCoordinate) -> Option<Arc<ModuleModel>> + Send + Sync>;

/// `<repo>/<group path>/<artifact>/<version>/<artifact>-<version>[-<classifier>].<extension>`.
///
/// `None` while the version is unresolved.
pub fn artifact_path(
    repo: &Path,
    coordinate: &ModuleCoordinate,
    classifier: Option<&str>,
    extension: &str,
) -> Option<PathBuf> {
    if coordinate.has_unresolved_version() {
        return None;
    }
    let base = repo
        .join(coordinate.group_id.replace('.', "/"))
        .join(&coordinate.artifact_id)
        .join(&coordinate.version);
    let file_name = match classifier.filter(|c| !c.is_empty()) {
        Some(classifier) => format!(
            "{}-{}-{classifier}.{extension}",
            coordinate.artifact_id, coordinate.version
        ),
        None => format!(
            "{}-{}.{extension}",
            coordinate.artifact_id, coordinate.version
        ),
    };
    Some(base.join(file_name))
}

pub fn pom_path(repo: &Path, coordinate: &ModuleCoordinate) -> PathBuf {
    repo.join(coordinate.group_id.replace('.', "/"))
        .join(&coordinate.artifact_id)
        .join(&coordinate.version)
        .join(format!(
            "{}-{}.pom",
            coordinate.artifact_id, coordinate.version
        ))
}

/// Offline resolver over a local Maven repository.
///
/// The dependency set is the breadth-first transitive closure of the model's dependencies:
/// the nearest declaration of a `groupId:artifactId` wins (first declared on ties), the root's
/// `dependencyManagement` pins transitive versions, scopes are mediated, and optional, test and
/// provided dependencies of dependencies are not followed.
pub struct LocalRepository {
    root: PathBuf,
    engine: MavenProjectEngine,
    workspace: Option<WorkspacePomLookup>,
    poms: Mutex<HashMap<PathBuf, Option<Arc<ModuleModel>>>>,
}

struct Pending {
    dep: DependencyRef,
    depth: usize,
    exclusions: Vec<Exclusion>,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            engine: MavenProjectEngine::with_repository(root.clone()),
            root,
            workspace: None,
            poms: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_workspace_lookup(mut self, lookup: WorkspacePomLookup) -> Self {
        self.workspace = Some(lookup);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Drop cached repository POMs.
    pub fn clear_cache(&self) {
        self.poms.lock().clear();
    }

    fn archive_for(&self, dep: &DependencyRef) -> Option<PathBuf> {
        if dep.scope == Scope::System {
            return dep.system_path.clone().filter(|p| p.is_file());
        }
        let coordinate = &dep.coordinate;
        artifact_path(
            &self.root,
            coordinate,
            coordinate.classifier.as_deref(),
            coordinate.extension(),
        )
        .filter(|p| p.is_file())
    }

    /// The model describing `coordinate`: a workspace manifest when one publishes it, otherwise
    /// the repository POM.
    fn model_for(&self, coordinate: &ModuleCoordinate) -> Option<Arc<ModuleModel>> {
        if coordinate.has_unresolved_version() {
            return None;
        }
        if let Some(lookup) = self.workspace.as_ref() {
            // Workspace models are owned by the lookup; never cache them here.
            if let Some(model) = lookup(coordinate) {
                return Some(model);
            }
        }

        let path = pom_path(&self.root, &coordinate.gav());
        if let Some(cached) = self.poms.lock().get(&path) {
            return cached.clone();
        }
        let model = if path.is_file() {
            match self.engine.read_pom(&path) {
                Ok(model) => Some(Arc::new(model)),
                Err(err) => {
                    tracing::warn!(
                        target = "trellis.project",
                        path = %path.display(),
                        error = %err,
                        "unreadable repository POM"
                    );
                    None
                }
            }
        } else {
            None
        };
        self.poms.lock().insert(path, model.clone());
        model
    }
}

impl ArtifactResolver for LocalRepository {
    fn resolved_artifacts(&self, model: &ModuleModel) -> Vec<ResolvedArtifact> {
        let mut out = Vec::new();
        let mut seen: HashSet<(String, String, Option<String>, Option<String>)> = HashSet::new();
        let mut queue: VecDeque<Pending> = model
            .dependencies
            .iter()
            .filter(|dep| dep.scope != Scope::Import)
            .map(|dep| Pending {
                dep: dep.clone(),
                depth: 1,
                exclusions: dep.exclusions.clone(),
            })
            .collect();

        while let Some(Pending {
            dep,
            depth,
            exclusions,
        }) = queue.pop_front()
        {
            let c = &dep.coordinate;
            let key = (
                c.group_id.clone(),
                c.artifact_id.clone(),
                c.classifier.clone(),
                c.type_.clone(),
            );
            if !seen.insert(key) {
                continue;
            }

            let dep_model = if dep.scope == Scope::System {
                None
            } else {
                self.model_for(c)
            };
            out.push(ResolvedArtifact {
                coordinate: c.clone(),
                scope: dep.scope,
                optional: dep.optional,
                archive_path: self.archive_for(&dep),
                homepage: dep_model.as_ref().and_then(|m| m.homepage.clone()),
                depth,
            });

            let Some(dep_model) = dep_model else {
                continue;
            };
            for child in &dep_model.dependencies {
                if child.optional || exclusions.iter().any(|e| e.matches(&child.coordinate)) {
                    continue;
                }
                let Some(scope) = dep.scope.mediate(child.scope) else {
                    continue;
                };
                let mut child = child.clone();
                child.scope = scope;
                if let Some(version) = model.managed_version(
                    &child.coordinate.group_id,
                    &child.coordinate.artifact_id,
                ) {
                    child.coordinate.version = version.to_string();
                }
                let mut child_exclusions = exclusions.clone();
                child_exclusions.extend(child.exclusions.iter().cloned());
                queue.push_back(Pending {
                    dep: child,
                    depth: depth + 1,
                    exclusions: child_exclusions,
                });
            }
        }

        out
    }

    fn fetch_classified(
        &self,
        coordinate: &ModuleCoordinate,
        classifier: &str,
        extension: &str,
        token: &CancellationToken,
    ) -> Result<PathBuf, ArtifactResolutionError> {
        if token.is_cancelled() {
            return Err(ArtifactResolutionError::Cancelled);
        }
        let Some(path) = artifact_path(&self.root, coordinate, Some(classifier), extension) else {
            return Err(ArtifactResolutionError::UnresolvedVersion {
                coordinate: coordinate.to_string(),
            });
        };
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(ArtifactResolutionError::NotFound {
                coordinate: format!("{coordinate}:{classifier}"),
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(ArtifactResolutionError::NotFound {
                    coordinate: format!("{coordinate}:{classifier}"),
                })
            }
            Err(source) => Err(ArtifactResolutionError::Io { path, source }),
        }
    }
}
