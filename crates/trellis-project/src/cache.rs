use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use trellis_core::ManifestLocation;

use crate::{ModelReadError, ModuleModel, ProjectModelEngine};

/// Last parsed model per manifest location and profile set.
///
/// The cache never re-reads on its own: entries stay until [`ModelCache::invalidate`] is called
/// for their location. Read errors are not cached.
pub struct ModelCache {
    engine: Arc<dyn ProjectModelEngine>,
    profiles: Vec<String>,
    entries: Mutex<HashMap<ManifestLocation, HashMap<Vec<String>, Arc<ModuleModel>>>>,
}

impl ModelCache {
    pub fn new(engine: Arc<dyn ProjectModelEngine>) -> Self {
        Self::with_profiles(engine, Vec::new())
    }

    /// A cache whose [`ModelCache::get`] activates `profiles`.
    pub fn with_profiles(engine: Arc<dyn ProjectModelEngine>, profiles: Vec<String>) -> Self {
        Self {
            engine,
            profiles: normalize_profiles(&profiles),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &Arc<dyn ProjectModelEngine> {
        &self.engine
    }

    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }

    pub fn get(&self, location: &ManifestLocation) -> Result<Arc<ModuleModel>, ModelReadError> {
        let profiles = self.profiles.clone();
        self.get_normalized(location, profiles)
    }

    pub fn get_with_profiles(
        &self,
        location: &ManifestLocation,
        profiles: &[String],
    ) -> Result<Arc<ModuleModel>, ModelReadError> {
        self.get_normalized(location, normalize_profiles(profiles))
    }

    fn get_normalized(
        &self,
        location: &ManifestLocation,
        profiles: Vec<String>,
    ) -> Result<Arc<ModuleModel>, ModelReadError> {
        if let Some(model) = self
            .entries
            .lock()
            .get(location)
            .and_then(|variants| variants.get(&profiles))
        {
            return Ok(Arc::clone(model));
        }

        // Parse outside the lock; reads can be slow and callers are already serialized.
        let model = Arc::new(self.engine.parse(location, &profiles)?);
        tracing::trace!(
            target = "trellis.project",
            location = %location,
            coordinate = %model.coordinate,
            "parsed project model"
        );
        self.entries
            .lock()
            .entry(location.clone())
            .or_default()
            .insert(profiles, Arc::clone(&model));
        Ok(model)
    }

    /// Evict every cached variant of `location`. Returns `true` if anything was cached.
    pub fn invalidate(&self, location: &ManifestLocation) -> bool {
        self.entries.lock().remove(location).is_some()
    }

    /// The cached model for the default profiles, without reading.
    pub fn cached(&self, location: &ManifestLocation) -> Option<Arc<ModuleModel>> {
        self.entries
            .lock()
            .get(location)
            .and_then(|variants| variants.get(&self.profiles))
            .cloned()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

fn normalize_profiles(profiles: &[String]) -> Vec<String> {
    let mut out: Vec<String> = profiles
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}
