use std::collections::BTreeMap;

use parking_lot::Mutex;
use trellis_classpath::{ClasspathEntry, ResolutionResult};
use trellis_core::{Diagnostic, ManifestLocation};

/// Where resolved classpaths and their diagnostics end up.
///
/// Every call replaces what was recorded for the location before: a classpath is swapped
/// wholesale and diagnostics are cleared before the new set is applied.
pub trait ClasspathStore: Send + Sync {
    fn publish_classpath(&self, location: &ManifestLocation, result: &ResolutionResult);

    fn report_diagnostics(&self, location: &ManifestLocation, diagnostics: &[Diagnostic]);

    /// Publish the outcome of one refresh pass.
    fn publish_batch(&self, results: &[ResolutionResult]) {
        for result in results {
            self.publish_classpath(&result.location, result);
            self.report_diagnostics(&result.location, &result.diagnostics);
        }
    }

    /// The module is gone: drop its classpath and diagnostics.
    fn forget(&self, location: &ManifestLocation) {
        self.publish_classpath(location, &ResolutionResult::empty(location.clone()));
        self.report_diagnostics(location, &[]);
    }
}

/// In-memory store recording the current state and every published batch.
#[derive(Debug, Default)]
pub struct MemoryClasspathStore {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    classpaths: BTreeMap<ManifestLocation, Vec<ClasspathEntry>>,
    diagnostics: BTreeMap<ManifestLocation, Vec<Diagnostic>>,
    batches: Vec<Vec<ManifestLocation>>,
    forgotten: Vec<ManifestLocation>,
}

impl MemoryClasspathStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classpath(&self, location: &ManifestLocation) -> Option<Vec<ClasspathEntry>> {
        self.inner.lock().classpaths.get(location).cloned()
    }

    /// Current diagnostics for `location`; empty when none are recorded.
    pub fn diagnostics(&self, location: &ManifestLocation) -> Vec<Diagnostic> {
        self.inner
            .lock()
            .diagnostics
            .get(location)
            .cloned()
            .unwrap_or_default()
    }

    /// Locations of every batch published so far, oldest first.
    pub fn batches(&self) -> Vec<Vec<ManifestLocation>> {
        self.inner.lock().batches.clone()
    }

    pub fn forgotten(&self) -> Vec<ManifestLocation> {
        self.inner.lock().forgotten.clone()
    }

    pub fn locations(&self) -> Vec<ManifestLocation> {
        self.inner.lock().classpaths.keys().cloned().collect()
    }
}

impl ClasspathStore for MemoryClasspathStore {
    fn publish_classpath(&self, location: &ManifestLocation, result: &ResolutionResult) {
        self.inner
            .lock()
            .classpaths
            .insert(location.clone(), result.entries.clone());
    }

    fn report_diagnostics(&self, location: &ManifestLocation, diagnostics: &[Diagnostic]) {
        let mut inner = self.inner.lock();
        inner.diagnostics.remove(location);
        if !diagnostics.is_empty() {
            inner
                .diagnostics
                .insert(location.clone(), diagnostics.to_vec());
        }
    }

    fn publish_batch(&self, results: &[ResolutionResult]) {
        for result in results {
            self.publish_classpath(&result.location, result);
            self.report_diagnostics(&result.location, &result.diagnostics);
        }
        self.inner
            .lock()
            .batches
            .push(results.iter().map(|r| r.location.clone()).collect());
    }

    fn forget(&self, location: &ManifestLocation) {
        let mut inner = self.inner.lock();
        inner.classpaths.remove(location);
        inner.diagnostics.remove(location);
        inner.forgotten.push(location.clone());
    }
}
