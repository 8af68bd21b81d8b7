use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use trellis_core::{ManifestLocation, ModuleCoordinate};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Compile,
    Provided,
    Runtime,
    Test,
    System,
    Import,
}

impl Scope {
    /// Unknown or empty scopes read as `compile`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "provided" => Scope::Provided,
            "runtime" => Scope::Runtime,
            "test" => Scope::Test,
            "system" => Scope::System,
            "import" => Scope::Import,
            _ => Scope::Compile,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Compile => "compile",
            Scope::Provided => "provided",
            Scope::Runtime => "runtime",
            Scope::Test => "test",
            Scope::System => "system",
            Scope::Import => "import",
        }
    }

    /// Entries in these scopes are not re-exported to dependents of the module.
    pub fn is_non_exported(self) -> bool {
        matches!(self, Scope::Provided | Scope::Test | Scope::System)
    }

    /// Scope of a transitive dependency declared with `child` and reached through a dependency
    /// in `self`. `None` when the dependency does not propagate.
    pub fn mediate(self, child: Scope) -> Option<Scope> {
        match child {
            Scope::Compile => match self {
                Scope::Compile => Some(Scope::Compile),
                Scope::Provided => Some(Scope::Provided),
                Scope::Runtime => Some(Scope::Runtime),
                Scope::Test => Some(Scope::Test),
                Scope::System | Scope::Import => None,
            },
            Scope::Runtime => match self {
                Scope::Compile | Scope::Runtime => Some(Scope::Runtime),
                Scope::Provided => Some(Scope::Provided),
                Scope::Test => Some(Scope::Test),
                Scope::System | Scope::Import => None,
            },
            Scope::Provided | Scope::Test | Scope::System | Scope::Import => None,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An `<exclusion>`; either part may be `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exclusion {
    pub group_id: String,
    pub artifact_id: String,
}

impl Exclusion {
    pub fn matches(&self, coordinate: &ModuleCoordinate) -> bool {
        (self.group_id == "*" || self.group_id == coordinate.group_id)
            && (self.artifact_id == "*" || self.artifact_id == coordinate.artifact_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyRef {
    pub coordinate: ModuleCoordinate,
    pub scope: Scope,
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<Exclusion>,
    /// Line of the `<dependency>` element in the declaring manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl DependencyRef {
    pub fn new(coordinate: ModuleCoordinate, scope: Scope) -> Self {
        Self {
            coordinate,
            scope,
            optional: false,
            system_path: None,
            exclusions: Vec::new(),
            line: None,
        }
    }

    /// `(groupId, artifactId)`, the key Maven uses for management and mediation.
    pub fn management_key(&self) -> (&str, &str) {
        (&self.coordinate.group_id, &self.coordinate.artifact_id)
    }
}

/// The effective project model of one manifest.
///
/// Produced by a [`crate::ProjectModelEngine`]; replaced wholesale when the manifest is read again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleModel {
    pub location: ManifestLocation,
    pub coordinate: ModuleCoordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ModuleCoordinate>,
    pub packaging: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub dependencies: Vec<DependencyRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub managed_dependencies: Vec<DependencyRef>,
    /// `<module>` entries, relative to the manifest's directory, in declaration order.
    pub modules: Vec<String>,
    pub active_profiles: Vec<String>,
}

impl ModuleModel {
    pub fn is_war(&self) -> bool {
        self.packaging == "war"
    }

    /// Locations of the declared sub-modules, in declaration order.
    pub fn sub_module_locations(&self) -> Vec<ManifestLocation> {
        self.modules
            .iter()
            .map(|module| self.location.resolve_sub_module(module))
            .collect()
    }

    /// The declaration of a dependency, matched by group and artifact id.
    pub fn declared(&self, coordinate: &ModuleCoordinate) -> Option<&DependencyRef> {
        self.dependencies.iter().find(|dep| {
            dep.coordinate.group_id == coordinate.group_id
                && dep.coordinate.artifact_id == coordinate.artifact_id
        })
    }

    pub fn managed_version(&self, group_id: &str, artifact_id: &str) -> Option<&str> {
        self.managed_dependencies
            .iter()
            .find(|dep| dep.management_key() == (group_id, artifact_id))
            .map(|dep| dep.coordinate.version.as_str())
            .filter(|version| !version.is_empty() && !version.contains("${"))
    }
}

/// One member of a module's resolved dependency set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedArtifact {
    pub coordinate: ModuleCoordinate,
    pub scope: Scope,
    pub optional: bool,
    /// `None` when the archive could not be found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    /// `1` for direct dependencies.
    pub depth: usize,
}
