mod refresh;

use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use trellis_classpath::{MaterializeOptions, ResolveConfig};
use trellis_core::ManifestLocation;
use trellis_project::{MavenProjectEngine, ModelReadError, ModuleModel, ProjectModelEngine};
use trellis_scheduler::{Scheduler, SchedulerConfig};
use trellis_test_utils::maven::MavenWorkspace;
use trellis_workspace::{ClasspathManager, ManagerSettings, MemoryClasspathStore};

pub(crate) const LONG_DEBOUNCE: Duration = Duration::from_secs(60);

pub(crate) fn settings(ws: &MavenWorkspace, debounce: Duration) -> ManagerSettings {
    ManagerSettings {
        local_repository: ws.repository(),
        resolve: ResolveConfig::default(),
        materialize: MaterializeOptions::default(),
        debounce,
    }
}

pub(crate) fn scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        background_threads: 2,
        io_threads: 1,
        progress_channel_capacity: 64,
    }
}

/// A workspace plus a manager publishing into a memory store.
pub(crate) struct Fixture {
    pub(crate) ws: MavenWorkspace,
    pub(crate) store: Arc<MemoryClasspathStore>,
    pub(crate) manager: ClasspathManager,
}

impl Fixture {
    /// Owns its own timer runtime; for synchronous tests.
    pub(crate) fn new() -> Self {
        let ws = MavenWorkspace::new();
        let scheduler = Scheduler::new(scheduler_config());
        let engine = Arc::new(MavenProjectEngine::with_repository(ws.repository()));
        Self::build(ws, scheduler, LONG_DEBOUNCE, engine)
    }

    /// Owns its own timer runtime, with a custom engine.
    pub(crate) fn with_engine(
        ws: MavenWorkspace,
        debounce: Duration,
        engine: Arc<dyn ProjectModelEngine>,
    ) -> Self {
        let scheduler = Scheduler::new(scheduler_config());
        Self::build(ws, scheduler, debounce, engine)
    }

    /// Timers run on the current Tokio runtime.
    pub(crate) fn on_runtime(debounce: Duration) -> Self {
        let ws = MavenWorkspace::new();
        let engine = Arc::new(MavenProjectEngine::with_repository(ws.repository()));
        Self::on_runtime_with(ws, debounce, engine)
    }

    pub(crate) fn on_runtime_with(
        ws: MavenWorkspace,
        debounce: Duration,
        engine: Arc<dyn ProjectModelEngine>,
    ) -> Self {
        let scheduler = Scheduler::new_with_io_handle(
            scheduler_config(),
            tokio::runtime::Handle::current(),
        );
        Self::build(ws, scheduler, debounce, engine)
    }

    fn build(
        ws: MavenWorkspace,
        scheduler: Scheduler,
        debounce: Duration,
        engine: Arc<dyn ProjectModelEngine>,
    ) -> Self {
        let store = Arc::new(MemoryClasspathStore::new());
        let manager =
            ClasspathManager::with_engine(scheduler, store.clone(), settings(&ws, debounce), engine);
        Self { ws, store, manager }
    }
}

pub(crate) fn loc(path: &Path) -> ManifestLocation {
    ManifestLocation::new(path)
}

/// Blocks the first parse of a manifest whose path contains `marker` until released.
pub(crate) struct GateEngine {
    inner: MavenProjectEngine,
    marker: &'static str,
    gate: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
}

/// Test side of a [`GateEngine`].
pub(crate) struct Gate {
    pub(crate) entered: mpsc::Receiver<()>,
    pub(crate) release: mpsc::Sender<()>,
}

impl GateEngine {
    pub(crate) fn new(repository: &Path, marker: &'static str) -> (Arc<Self>, Gate) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let engine = Arc::new(Self {
            inner: MavenProjectEngine::with_repository(repository),
            marker,
            gate: Mutex::new(Some((entered_tx, release_rx))),
        });
        (
            engine,
            Gate {
                entered: entered_rx,
                release: release_tx,
            },
        )
    }
}

impl ProjectModelEngine for GateEngine {
    fn parse(
        &self,
        location: &ManifestLocation,
        profiles: &[String],
    ) -> Result<ModuleModel, ModelReadError> {
        if location.path().to_string_lossy().contains(self.marker) {
            let gate = self.gate.lock().take();
            if let Some((entered, release)) = gate {
                let _ = entered.send(());
                let _ = release.recv_timeout(Duration::from_secs(10));
            }
        }
        self.inner.parse(location, profiles)
    }
}
