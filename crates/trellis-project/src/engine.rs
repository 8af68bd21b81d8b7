use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use trellis_core::{ManifestLocation, ModuleCoordinate, MANIFEST_FILE_NAME};

use crate::pom::{parse_pom, resolve_placeholders, PomParent, RawDependency, RawPom};
use crate::repository::pom_path;
use crate::{DependencyRef, Exclusion, ModelReadError, ModuleModel, Scope};

/// Produces project models from manifests.
///
/// Implementations must be deterministic for a given file content and profile list, and must
/// not consult workspace state: the caller decides when a model is read again.
pub trait ProjectModelEngine: Send + Sync {
    fn parse(
        &self,
        location: &ManifestLocation,
        profiles: &[String],
    ) -> Result<ModuleModel, ModelReadError>;
}

/// Offline `pom.xml` reader.
///
/// Parents are found through `<relativePath>` (default `../pom.xml`) and then in the local
/// repository. A parent that cannot be found is not an error; the child keeps the group and
/// version named in its `<parent>` element.
#[derive(Debug, Clone, Default)]
pub struct MavenProjectEngine {
    repository: Option<PathBuf>,
}

/// Import chains (parents and BOMs) deeper than this are reported as invalid.
const MAX_CHAIN_DEPTH: usize = 32;

#[derive(Debug, Default)]
struct Effective {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    packaging: Option<String>,
    url: Option<String>,
    parent: Option<PomParent>,
    properties: BTreeMap<String, String>,
    managed: Vec<RawDependency>,
    dependencies: Vec<RawDependency>,
    modules: Vec<String>,
    active_profiles: Vec<String>,
    line: u32,
}

impl MavenProjectEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(repository: impl Into<PathBuf>) -> Self {
        Self {
            repository: Some(repository.into()),
        }
    }

    pub fn repository(&self) -> Option<&Path> {
        self.repository.as_deref()
    }

    /// Read a POM outside the workspace (a repository POM), with only default profiles active.
    pub fn read_pom(&self, path: &Path) -> Result<ModuleModel, ModelReadError> {
        self.parse(&ManifestLocation::new(path), &[])
    }

    fn effective(
        &self,
        path: &Path,
        raw: RawPom,
        profiles: &[String],
        chain: &mut Vec<PathBuf>,
    ) -> Result<Effective, ModelReadError> {
        let parent = match raw.parent.as_ref() {
            Some(parent) => match self.locate_parent(path, parent)? {
                Some((parent_path, parent_raw)) => {
                    if chain.contains(&parent_path) || chain.len() >= MAX_CHAIN_DEPTH {
                        return Err(ModelReadError::invalid(
                            path,
                            Some(parent.line),
                            format!("parent cycle through {}", parent_path.display()),
                        ));
                    }
                    chain.push(parent_path.clone());
                    let effective = self.effective(&parent_path, parent_raw, profiles, chain);
                    chain.pop();
                    Some(effective?)
                }
                None => {
                    tracing::debug!(
                        target = "trellis.project",
                        path = %path.display(),
                        parent = ?parent.artifact_id,
                        "parent POM not found; inheriting coordinates only"
                    );
                    None
                }
            },
            None => None,
        };

        let active = active_profiles(&raw, profiles);

        let group_id = raw
            .group_id
            .clone()
            .or_else(|| raw.parent.as_ref().and_then(|p| p.group_id.clone()))
            .or_else(|| parent.as_ref().and_then(|p| p.group_id.clone()));
        let version = raw
            .version
            .clone()
            .or_else(|| raw.parent.as_ref().and_then(|p| p.version.clone()))
            .or_else(|| parent.as_ref().and_then(|p| p.version.clone()));
        let artifact_id = raw.artifact_id.clone();
        let url = raw.url.clone().or_else(|| {
            let parent_url = parent.as_ref()?.url.as_ref()?;
            let artifact_id = artifact_id.as_ref()?;
            Some(format!("{}/{artifact_id}", parent_url.trim_end_matches('/')))
        });

        let mut properties = parent
            .as_ref()
            .map(|p| p.properties.clone())
            .unwrap_or_default();
        properties.extend(raw.properties.clone());
        for profile in &active {
            properties.extend(profile.properties.clone());
        }
        insert_builtin(&mut properties, "groupId", group_id.as_deref());
        insert_builtin(&mut properties, "artifactId", artifact_id.as_deref());
        insert_builtin(&mut properties, "version", version.as_deref());
        if let Some(parent) = raw.parent.as_ref() {
            if let Some(v) = parent.group_id.as_ref() {
                properties.insert("project.parent.groupId".to_string(), v.clone());
            }
            if let Some(v) = parent.version.as_ref() {
                properties.insert("project.parent.version".to_string(), v.clone());
            }
        }
        if let Some(dir) = path.parent() {
            properties.insert(
                "project.basedir".to_string(),
                dir.to_string_lossy().into_owned(),
            );
            properties.insert("basedir".to_string(), dir.to_string_lossy().into_owned());
        }

        // Own declarations first so they win key collisions with inherited ones.
        let mut managed = raw.dependency_management.clone();
        let mut dependencies = raw.dependencies.clone();
        let mut modules = raw.modules.clone();
        for profile in &active {
            managed.extend(profile.dependency_management.iter().cloned());
            dependencies.extend(profile.dependencies.iter().cloned());
            for module in &profile.modules {
                if !modules.contains(module) {
                    modules.push(module.clone());
                }
            }
        }
        if let Some(parent) = parent.as_ref() {
            managed.extend(parent.managed.iter().cloned());
            dependencies.extend(parent.dependencies.iter().cloned());
        }

        Ok(Effective {
            group_id,
            artifact_id,
            version,
            packaging: raw.packaging.clone(),
            url,
            parent: raw.parent.clone(),
            properties,
            managed,
            dependencies,
            modules,
            active_profiles: active.iter().map(|p| p.id.clone()).collect(),
            line: raw.line,
        })
    }

    fn locate_parent(
        &self,
        child: &Path,
        parent: &PomParent,
    ) -> Result<Option<(PathBuf, RawPom)>, ModelReadError> {
        let relative = parent.relative_path.as_deref().unwrap_or("../pom.xml");
        if !relative.is_empty() {
            if let Some(dir) = child.parent() {
                let mut candidate = dir.join(relative);
                if candidate.is_dir() {
                    candidate = candidate.join(MANIFEST_FILE_NAME);
                }
                if candidate.is_file() {
                    let candidate = canonicalize_or_fallback(&candidate);
                    let raw = parse_pom(&candidate)?;
                    if raw.artifact_id.is_some() && raw.artifact_id == parent.artifact_id {
                        return Ok(Some((candidate, raw)));
                    }
                }
            }
        }

        let (Some(repo), Some(g), Some(a), Some(v)) = (
            self.repository.as_deref(),
            parent.group_id.as_deref(),
            parent.artifact_id.as_deref(),
            parent.version.as_deref(),
        ) else {
            return Ok(None);
        };
        let candidate = pom_path(repo, &ModuleCoordinate::new(g, a, v));
        if !candidate.is_file() {
            return Ok(None);
        }
        let raw = parse_pom(&candidate)?;
        Ok(Some((candidate, raw)))
    }

    fn finish(
        &self,
        location: ManifestLocation,
        effective: Effective,
        chain: &mut Vec<PathBuf>,
    ) -> Result<ModuleModel, ModelReadError> {
        let props = &effective.properties;
        let path = location.path().to_path_buf();
        let field = |value: &Option<String>, name: &str| {
            value
                .as_deref()
                .map(|v| resolve_placeholders(v, props))
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    ModelReadError::invalid(&path, Some(effective.line), format!("missing {name}"))
                })
        };
        let artifact_id = field(&effective.artifact_id, "artifactId")?;
        let group_id = field(&effective.group_id, "groupId")?;
        let version = field(&effective.version, "version")?;

        let managed = self.managed_entries(&effective, chain);
        let dependencies = dedupe_by_key(
            effective
                .dependencies
                .iter()
                .map(|raw| apply_management(interpolate(raw, props), raw, &managed))
                .collect(),
        );

        let parent = effective.parent.as_ref().and_then(|p| {
            Some(ModuleCoordinate::new(
                resolve_placeholders(p.group_id.as_deref()?, props),
                resolve_placeholders(p.artifact_id.as_deref()?, props),
                resolve_placeholders(p.version.as_deref()?, props),
            ))
        });

        Ok(ModuleModel {
            location,
            coordinate: ModuleCoordinate::new(group_id, artifact_id, version),
            parent,
            packaging: effective
                .packaging
                .as_deref()
                .map(|p| resolve_placeholders(p, props))
                .unwrap_or_else(|| "jar".to_string()),
            homepage: effective.url.as_deref().map(|u| resolve_placeholders(u, props)),
            dependencies,
            managed_dependencies: managed,
            modules: effective.modules,
            active_profiles: effective.active_profiles,
        })
    }

    /// Interpolated `dependencyManagement`, with `import`-scoped BOMs expanded from the repository.
    fn managed_entries(&self, effective: &Effective, chain: &mut Vec<PathBuf>) -> Vec<DependencyRef> {
        let mut out = Vec::new();
        for raw in &effective.managed {
            let dep = interpolate(raw, &effective.properties);
            let is_bom = dep.scope == Scope::Import && dep.coordinate.type_.as_deref() == Some("pom");
            if !is_bom {
                out.push(dep);
                continue;
            }
            out.extend(self.import_bom(&dep.coordinate, chain));
        }
        dedupe_by_key(out)
    }

    fn import_bom(
        &self,
        coordinate: &ModuleCoordinate,
        chain: &mut Vec<PathBuf>,
    ) -> Vec<DependencyRef> {
        let Some(repo) = self.repository.as_deref() else {
            return Vec::new();
        };
        let path = pom_path(repo, &coordinate.gav());
        if chain.contains(&path) || chain.len() >= MAX_CHAIN_DEPTH || !path.is_file() {
            tracing::debug!(
                target = "trellis.project",
                bom = %coordinate,
                "skipping BOM import"
            );
            return Vec::new();
        }

        chain.push(path.clone());
        let result = parse_pom(&path).and_then(|raw| {
            let effective = self.effective(&path, raw, &[], chain)?;
            Ok(self.managed_entries(&effective, chain))
        });
        chain.pop();

        match result {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(
                    target = "trellis.project",
                    bom = %coordinate,
                    error = %err,
                    "failed to import BOM"
                );
                Vec::new()
            }
        }
    }
}

impl ProjectModelEngine for MavenProjectEngine {
    fn parse(
        &self,
        location: &ManifestLocation,
        profiles: &[String],
    ) -> Result<ModuleModel, ModelReadError> {
        let path = location.path();
        let raw = parse_pom(path)?;
        let mut chain = vec![path.to_path_buf()];
        let effective = self.effective(path, raw, profiles, &mut chain)?;
        self.finish(location.clone(), effective, &mut chain)
    }
}

/// Profiles named in `requested` are active; `!id` deactivates. `activeByDefault` profiles apply
/// only when no other profile of the same POM was activated explicitly.
fn active_profiles<'a>(raw: &'a RawPom, requested: &[String]) -> Vec<&'a crate::pom::RawProfile> {
    let deactivated: HashSet<&str> = requested
        .iter()
        .filter_map(|p| p.strip_prefix('!'))
        .collect();
    let explicit: Vec<_> = raw
        .profiles
        .iter()
        .filter(|p| requested.iter().any(|r| r == &p.id))
        .collect();
    let candidates = if explicit.is_empty() {
        raw.profiles.iter().filter(|p| p.active_by_default).collect()
    } else {
        explicit
    };
    candidates
        .into_iter()
        .filter(|p| !deactivated.contains(p.id.as_str()))
        .collect()
}

fn insert_builtin(props: &mut BTreeMap<String, String>, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        props.insert(format!("project.{name}"), value.to_string());
        props.insert(format!("pom.{name}"), value.to_string());
    }
}

fn interpolate(raw: &RawDependency, props: &BTreeMap<String, String>) -> DependencyRef {
    let r = |value: &str| resolve_placeholders(value, props);
    let mut coordinate = ModuleCoordinate::new(
        r(&raw.group_id),
        r(&raw.artifact_id),
        raw.version.as_deref().map(r).unwrap_or_default(),
    );
    if let Some(classifier) = raw.classifier.as_deref() {
        coordinate = coordinate.with_classifier(r(classifier));
    }
    if let Some(type_) = raw.type_.as_deref().map(r).filter(|t| t != "jar") {
        coordinate = coordinate.with_type(type_);
    }

    DependencyRef {
        coordinate,
        scope: raw
            .scope
            .as_deref()
            .map(|s| Scope::parse(&r(s)))
            .unwrap_or_default(),
        optional: raw
            .optional
            .as_deref()
            .is_some_and(|o| r(o).eq_ignore_ascii_case("true")),
        system_path: raw.system_path.as_deref().map(|p| PathBuf::from(r(p))),
        exclusions: raw
            .exclusions
            .iter()
            .map(|(g, a)| Exclusion {
                group_id: r(g),
                artifact_id: r(a),
            })
            .collect(),
        line: Some(raw.line),
    }
}

fn management_key(dep: &DependencyRef) -> (String, String, Option<String>, Option<String>) {
    (
        dep.coordinate.group_id.clone(),
        dep.coordinate.artifact_id.clone(),
        dep.coordinate.type_.clone(),
        dep.coordinate.classifier.clone(),
    )
}

fn apply_management(
    mut dep: DependencyRef,
    raw: &RawDependency,
    managed: &[DependencyRef],
) -> DependencyRef {
    let key = management_key(&dep);
    let Some(entry) = managed.iter().find(|m| management_key(m) == key) else {
        return dep;
    };
    if raw.version.is_none() {
        dep.coordinate.version = entry.coordinate.version.clone();
    }
    if raw.scope.is_none() {
        dep.scope = entry.scope;
    }
    if dep.system_path.is_none() {
        dep.system_path = entry.system_path.clone();
    }
    for exclusion in &entry.exclusions {
        if !dep.exclusions.contains(exclusion) {
            dep.exclusions.push(exclusion.clone());
        }
    }
    dep
}

/// Keep the first declaration per key, preserving order.
fn dedupe_by_key(deps: Vec<DependencyRef>) -> Vec<DependencyRef> {
    let mut seen = HashSet::new();
    deps.into_iter()
        .filter(|dep| seen.insert(management_key(dep)))
        .collect()
}

fn canonicalize_or_fallback(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
