use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use trellis_core::ManifestLocation;

/// Per-module adjustments to the workspace-wide resolution settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOverrides {
    pub include_modules: Option<bool>,
    pub resolve_workspace_projects: Option<bool>,
    pub active_profiles: Option<Vec<String>>,
}

/// Host-owned module state the resolver consults but never changes.
///
/// Modules are open unless closed explicitly.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    closed: HashSet<ManifestLocation>,
    dynamic_web: HashSet<ManifestLocation>,
    overrides: HashMap<ManifestLocation, ResolveOverrides>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self, location: &ManifestLocation) -> bool {
        !self.inner.read().closed.contains(location)
    }

    pub fn set_open(&self, location: &ManifestLocation, open: bool) {
        let mut inner = self.inner.write();
        if open {
            inner.closed.remove(location);
        } else {
            inner.closed.insert(location.clone());
        }
    }

    /// Whether the module carries the dynamic-web marker. Only meaningful for `war` modules.
    pub fn is_dynamic_web(&self, location: &ManifestLocation) -> bool {
        self.inner.read().dynamic_web.contains(location)
    }

    pub fn set_dynamic_web(&self, location: &ManifestLocation, dynamic_web: bool) {
        let mut inner = self.inner.write();
        if dynamic_web {
            inner.dynamic_web.insert(location.clone());
        } else {
            inner.dynamic_web.remove(location);
        }
    }

    pub fn overrides(&self, location: &ManifestLocation) -> Option<ResolveOverrides> {
        self.inner.read().overrides.get(location).cloned()
    }

    pub fn set_overrides(&self, location: &ManifestLocation, overrides: ResolveOverrides) {
        self.inner
            .write()
            .overrides
            .insert(location.clone(), overrides);
    }

    /// Drop all state recorded for `location`.
    pub fn forget(&self, location: &ManifestLocation) {
        let mut inner = self.inner.write();
        inner.closed.remove(location);
        inner.dynamic_web.remove(location);
        inner.overrides.remove(location);
    }
}
