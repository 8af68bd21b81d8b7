use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::RwLock;
use serde::Serialize;
use trellis_core::{Diagnostic, DiagnosticKind, ManifestLocation, ModuleCoordinate};
use trellis_project::ModuleModel;

/// Workspace-wide map from published coordinates to manifests, with the reverse edges used to
/// cascade refreshes: declared dependencies, `<parent>` references and `<module>` entries.
///
/// All keys are GAV coordinates (no classifier or type). A coordinate has at most one owner;
/// when several manifests claim it the last one indexed wins, and removing the owner hands the
/// coordinate back to the lowest remaining claimant.
#[derive(Debug, Default)]
pub struct CoordinateIndex {
    inner: RwLock<IndexInner>,
}

#[derive(Debug, Default)]
struct IndexInner {
    published_by: BTreeMap<ModuleCoordinate, ManifestLocation>,
    claims: BTreeMap<ModuleCoordinate, BTreeSet<ManifestLocation>>,
    dependents: BTreeMap<ModuleCoordinate, BTreeSet<ManifestLocation>>,
    /// Parent coordinate to the manifests inheriting from it.
    children: BTreeMap<ModuleCoordinate, BTreeSet<ManifestLocation>>,
    /// Sub-module manifest to the aggregators listing it.
    aggregators: BTreeMap<ManifestLocation, BTreeSet<ManifestLocation>>,
    indexed: HashMap<ManifestLocation, IndexedEntry>,
}

#[derive(Debug, Clone)]
struct IndexedEntry {
    coordinate: ModuleCoordinate,
    dependencies: BTreeSet<ModuleCoordinate>,
    parent: Option<ModuleCoordinate>,
    modules: BTreeSet<ManifestLocation>,
}

/// A module as reported by [`CoordinateIndex::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedModule {
    pub location: ManifestLocation,
    pub coordinate: ModuleCoordinate,
    /// `false` when another manifest currently owns the coordinate.
    pub publishes: bool,
    pub dependents: Vec<ManifestLocation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexSnapshot {
    pub modules: Vec<IndexedModule>,
}

fn unlink<K: Ord>(
    edges: &mut BTreeMap<K, BTreeSet<ManifestLocation>>,
    key: &K,
    location: &ManifestLocation,
) {
    if let Some(set) = edges.get_mut(key) {
        set.remove(location);
        if set.is_empty() {
            edges.remove(key);
        }
    }
}

fn link<K: Ord>(
    edges: &mut BTreeMap<K, BTreeSet<ManifestLocation>>,
    key: K,
    location: &ManifestLocation,
) {
    edges.entry(key).or_default().insert(location.clone());
}

impl IndexInner {
    fn drop_edges(&mut self, location: &ManifestLocation, entry: &IndexedEntry) {
        for dep in &entry.dependencies {
            unlink(&mut self.dependents, dep, location);
        }
        if let Some(parent) = &entry.parent {
            unlink(&mut self.children, parent, location);
        }
        for module in &entry.modules {
            unlink(&mut self.aggregators, module, location);
        }
    }

    fn add_edges(&mut self, location: &ManifestLocation, entry: &IndexedEntry) {
        for dep in &entry.dependencies {
            link(&mut self.dependents, dep.clone(), location);
        }
        if let Some(parent) = &entry.parent {
            link(&mut self.children, parent.clone(), location);
        }
        for module in &entry.modules {
            link(&mut self.aggregators, module.clone(), location);
        }
    }

    fn edges_from(
        edges: &BTreeMap<ModuleCoordinate, BTreeSet<ManifestLocation>>,
        entry: Option<&IndexedEntry>,
        location: &ManifestLocation,
    ) -> BTreeSet<ManifestLocation> {
        entry
            .and_then(|entry| edges.get(&entry.coordinate))
            .map(|set| set.iter().filter(|loc| *loc != location).cloned().collect())
            .unwrap_or_default()
    }

    fn release_claim(&mut self, location: &ManifestLocation, coordinate: &ModuleCoordinate) {
        let remaining = match self.claims.get_mut(coordinate) {
            Some(set) => {
                set.remove(location);
                set.iter().next().cloned()
            }
            None => None,
        };
        if remaining.is_none() {
            self.claims.remove(coordinate);
        }
        if self.published_by.get(coordinate) == Some(location) {
            match remaining {
                Some(next) => {
                    tracing::debug!(
                        target = "trellis.classpath",
                        coordinate = %coordinate,
                        owner = %next,
                        "coordinate ownership falls back to remaining claimant"
                    );
                    self.published_by.insert(coordinate.clone(), next);
                }
                None => {
                    self.published_by.remove(coordinate);
                }
            }
        }
    }
}

impl CoordinateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `model` as the current state of `location`, replacing whatever was indexed for it.
    ///
    /// Returns a [`DiagnosticKind::CoordinateConflict`] warning when another manifest owned the
    /// coordinate until now.
    pub fn update(&self, location: &ManifestLocation, model: &ModuleModel) -> Option<Diagnostic> {
        let coordinate = model.coordinate.gav();
        let entry = IndexedEntry {
            coordinate: coordinate.clone(),
            dependencies: model
                .dependencies
                .iter()
                .map(|dep| dep.coordinate.gav())
                .collect(),
            parent: model.parent.as_ref().map(ModuleCoordinate::gav),
            modules: model
                .sub_module_locations()
                .into_iter()
                .filter(|module| module != location)
                .collect(),
        };

        let mut inner = self.inner.write();
        if let Some(previous) = inner.indexed.remove(location) {
            inner.drop_edges(location, &previous);
            if previous.coordinate != coordinate {
                inner.release_claim(location, &previous.coordinate);
            }
        }

        inner
            .claims
            .entry(coordinate.clone())
            .or_default()
            .insert(location.clone());
        let conflict = match inner.published_by.insert(coordinate.clone(), location.clone()) {
            Some(previous_owner) if &previous_owner != location => {
                tracing::warn!(
                    target = "trellis.classpath",
                    coordinate = %coordinate,
                    owner = %location,
                    previous_owner = %previous_owner,
                    "coordinate published by more than one module"
                );
                Some(Diagnostic::warning(
                    location.clone(),
                    DiagnosticKind::CoordinateConflict,
                    format!("{coordinate} is also published by {previous_owner}; this module now provides it"),
                ))
            }
            _ => None,
        };

        inner.add_edges(location, &entry);
        inner.indexed.insert(location.clone(), entry);
        conflict
    }

    /// Forget everything indexed for `location`. Returns `false` if nothing was indexed.
    pub fn remove(&self, location: &ManifestLocation) -> bool {
        let mut inner = self.inner.write();
        let Some(previous) = inner.indexed.remove(location) else {
            return false;
        };
        inner.drop_edges(location, &previous);
        inner.release_claim(location, &previous.coordinate);
        true
    }

    /// Manifests declaring a dependency on the coordinate indexed for `location`.
    pub fn dependents_of(&self, location: &ManifestLocation) -> BTreeSet<ManifestLocation> {
        let inner = self.inner.read();
        IndexInner::edges_from(&inner.dependents, inner.indexed.get(location), location)
    }

    /// Manifests whose `<parent>` is the coordinate indexed for `location`.
    ///
    /// Their models inherit from `location`, so they must be read again when it changes.
    pub fn children_of(&self, location: &ManifestLocation) -> BTreeSet<ManifestLocation> {
        let inner = self.inner.read();
        IndexInner::edges_from(&inner.children, inner.indexed.get(location), location)
    }

    /// Manifests listing `location` as a `<module>`. Present even before `location` is indexed.
    pub fn aggregators_of(&self, location: &ManifestLocation) -> BTreeSet<ManifestLocation> {
        self.inner
            .read()
            .aggregators
            .get(location)
            .cloned()
            .unwrap_or_default()
    }

    /// Manifests whose classpath includes what `location` contributes: dependents and
    /// aggregators.
    pub fn affected_by(&self, location: &ManifestLocation) -> BTreeSet<ManifestLocation> {
        let mut out = self.dependents_of(location);
        out.extend(self.aggregators_of(location));
        out
    }

    /// Manifests declaring a dependency on `coordinate` (GAV).
    pub fn dependents_of_coordinate(
        &self,
        coordinate: &ModuleCoordinate,
    ) -> BTreeSet<ManifestLocation> {
        self.inner
            .read()
            .dependents
            .get(&coordinate.gav())
            .cloned()
            .unwrap_or_default()
    }

    pub fn published_by(&self, coordinate: &ModuleCoordinate) -> Option<ManifestLocation> {
        self.inner.read().published_by.get(&coordinate.gav()).cloned()
    }

    pub fn coordinate_of(&self, location: &ManifestLocation) -> Option<ModuleCoordinate> {
        self.inner
            .read()
            .indexed
            .get(location)
            .map(|entry| entry.coordinate.clone())
    }

    pub fn contains(&self, location: &ManifestLocation) -> bool {
        self.inner.read().indexed.contains_key(location)
    }

    /// Every indexed manifest, sorted.
    pub fn locations(&self) -> Vec<ManifestLocation> {
        let mut out: Vec<_> = self.inner.read().indexed.keys().cloned().collect();
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        self.inner.read().indexed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        let inner = self.inner.read();
        let mut modules: Vec<IndexedModule> = inner
            .indexed
            .iter()
            .map(|(location, entry)| IndexedModule {
                location: location.clone(),
                coordinate: entry.coordinate.clone(),
                publishes: inner.published_by.get(&entry.coordinate) == Some(location),
                dependents: inner
                    .dependents
                    .get(&entry.coordinate)
                    .map(|set| set.iter().filter(|loc| *loc != location).cloned().collect())
                    .unwrap_or_default(),
            })
            .collect();
        modules.sort_by(|a, b| a.location.cmp(&b.location));
        IndexSnapshot { modules }
    }

    pub fn clear(&self) {
        *self.inner.write() = IndexInner::default();
    }
}
