use std::time::Duration;

use tokio::sync::broadcast;
use trellis_core::ManifestLocation;
use trellis_scheduler::CancellationToken;
use trellis_test_utils::maven::{MavenWorkspace, PomBuilder};
use trellis_workspace::{
    ManifestChange, ManifestChangeKind, NormalizedEvent, RefreshEvent, RefreshPhase,
};

use super::{loc, Fixture, GateEngine, LONG_DEBOUNCE};

const SETTLE: Duration = Duration::from_millis(200);

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

async fn next_event(rx: &mut broadcast::Receiver<RefreshEvent>) -> RefreshEvent {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for a refresh event")
        .expect("refresh event channel closed")
}

async fn next_published(rx: &mut broadcast::Receiver<RefreshEvent>) -> Vec<ManifestLocation> {
    loop {
        match next_event(rx).await {
            RefreshEvent::Published { locations } => return locations,
            RefreshEvent::Scheduled => continue,
            RefreshEvent::Cancelled => panic!("refresh pass was cancelled"),
        }
    }
}

async fn next_cancelled(rx: &mut broadcast::Receiver<RefreshEvent>) {
    loop {
        match next_event(rx).await {
            RefreshEvent::Cancelled => return,
            RefreshEvent::Scheduled => continue,
            RefreshEvent::Published { locations } => {
                panic!("unexpected publish of {locations:?}")
            }
        }
    }
}

fn modified(location: &ManifestLocation) -> ManifestChange {
    ManifestChange::new(location.clone(), ManifestChangeKind::Modified)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn changes_within_the_window_share_one_pass() {
    let fx = Fixture::on_runtime(Duration::from_millis(100));
    let a = loc(&fx.ws.write_module("a", &PomBuilder::new("org.example:a:1")));
    let b = loc(&fx.ws.write_module("b", &PomBuilder::new("org.example:b:1")));
    fx.manager
        .initialize(&[a.clone(), b.clone()], &CancellationToken::new())
        .unwrap();
    let mut rx = fx.manager.refresh().subscribe();

    fx.manager.manifest_changed(modified(&a));
    fx.manager.manifest_changed(modified(&b));
    fx.manager.manifest_changed(modified(&a));
    assert_eq!(fx.manager.refresh().phase(), RefreshPhase::Pending);
    assert_eq!(fx.manager.refresh().pending(), vec![a.clone(), b.clone()]);

    let published = next_published(&mut rx).await;
    assert_eq!(published, vec![a.clone(), b.clone()]);
    assert_eq!(fx.store.batches().len(), 2);
    assert_eq!(fx.manager.refresh().phase(), RefreshPhase::Idle);
    assert!(fx.manager.refresh().pending().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_a_pending_refresh_keeps_the_queue() {
    let fx = Fixture::on_runtime(LONG_DEBOUNCE);
    let a = loc(&fx.ws.write_module("a", &PomBuilder::new("org.example:a:1")));
    let mut rx = fx.manager.refresh().subscribe();

    fx.manager.manifest_changed(modified(&a));
    assert_eq!(next_event(&mut rx).await, RefreshEvent::Scheduled);
    assert!(fx.manager.refresh().cancel());
    assert_eq!(next_event(&mut rx).await, RefreshEvent::Cancelled);

    assert_eq!(fx.manager.refresh().phase(), RefreshPhase::Idle);
    assert_eq!(fx.manager.refresh().pending(), vec![a.clone()]);
    assert!(fx.store.batches().is_empty());
    assert!(!fx.manager.refresh().cancel());

    let published = fx.manager.flush(&CancellationToken::new()).unwrap();
    assert_eq!(published, vec![a.clone()]);
    assert_eq!(fx.store.batches(), vec![vec![a]]);
    assert!(fx.manager.flush(&CancellationToken::new()).unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_a_running_pass_publishes_nothing() {
    let ws = MavenWorkspace::new();
    let (engine, gate) = GateEngine::new(&ws.repository(), "slow");
    let fx = Fixture::on_runtime_with(ws, Duration::from_millis(10), engine);
    let slow = loc(&fx.ws.write_module("slow", &PomBuilder::new("org.example:slow:1")));
    let mut rx = fx.manager.refresh().subscribe();

    fx.manager.manifest_changed(modified(&slow));
    gate.entered
        .recv_timeout(EVENT_TIMEOUT)
        .expect("pass never started");
    assert_eq!(fx.manager.refresh().phase(), RefreshPhase::Draining);
    assert!(fx.manager.refresh().cancel());
    gate.release.send(()).unwrap();

    next_cancelled(&mut rx).await;
    assert_eq!(fx.manager.refresh().phase(), RefreshPhase::Idle);
    assert_eq!(fx.manager.refresh().pending(), vec![slow]);
    assert!(fx.store.batches().is_empty());
}

#[test]
fn cancelling_a_pass_waiting_for_the_workspace_lock_publishes_nothing() {
    let ws = MavenWorkspace::new();
    let (engine, gate) = GateEngine::new(&ws.repository(), "slow");
    let fx = Fixture::with_engine(ws, Duration::from_millis(10), engine);
    let slow = loc(&fx.ws.write_module("slow", &PomBuilder::new("org.example:slow:1")));
    let other = loc(&fx.ws.write_module("other", &PomBuilder::new("org.example:other:1")));
    let mut rx = fx.manager.refresh().subscribe();

    std::thread::scope(|scope| {
        let holder = scope.spawn(|| {
            fx.manager
                .resolve_now(&slow, None, &CancellationToken::new())
                .map(|result| result.location)
        });
        gate.entered
            .recv_timeout(EVENT_TIMEOUT)
            .expect("resolve never started");
        fx.manager.manifest_changed(modified(&other));
        // The timer fires; its pass then waits behind `resolve_now`.
        std::thread::sleep(SETTLE);
        assert!(fx.manager.refresh().cancel());
        gate.release.send(()).unwrap();
        assert_eq!(holder.join().unwrap(), Ok(slow.clone()));
    });

    loop {
        match rx.blocking_recv().expect("refresh event channel closed") {
            RefreshEvent::Scheduled => continue,
            RefreshEvent::Cancelled => break,
            RefreshEvent::Published { locations } => {
                panic!("unexpected publish of {locations:?}")
            }
        }
    }
    assert_eq!(fx.manager.refresh().phase(), RefreshPhase::Idle);
    assert_eq!(fx.manager.refresh().pending(), vec![other.clone()]);
    assert!(fx.store.batches().is_empty());
    assert_eq!(fx.store.classpath(&other), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn changes_during_a_pass_get_their_own_pass() {
    let ws = MavenWorkspace::new();
    let (engine, gate) = GateEngine::new(&ws.repository(), "slow");
    let fx = Fixture::on_runtime_with(ws, Duration::from_millis(10), engine);
    let slow = loc(&fx.ws.write_module("slow", &PomBuilder::new("org.example:slow:1")));
    let other = loc(&fx.ws.write_module("other", &PomBuilder::new("org.example:other:1")));
    let mut rx = fx.manager.refresh().subscribe();

    fx.manager.manifest_changed(modified(&slow));
    gate.entered
        .recv_timeout(EVENT_TIMEOUT)
        .expect("pass never started");
    fx.manager.manifest_changed(modified(&other));
    assert_eq!(fx.manager.refresh().phase(), RefreshPhase::Draining);
    assert_eq!(fx.manager.refresh().pending(), vec![other.clone()]);
    gate.release.send(()).unwrap();

    assert_eq!(next_published(&mut rx).await, vec![slow.clone()]);
    assert_eq!(next_published(&mut rx).await, vec![other.clone()]);
    assert_eq!(fx.store.batches(), vec![vec![slow], vec![other]]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn events_on_other_files_are_ignored() {
    let fx = Fixture::on_runtime(LONG_DEBOUNCE);
    fx.manager.handle_fs_event(&NormalizedEvent::Modified(
        fx.ws.root().join("a/src/main/java/A.java"),
    ));
    assert_eq!(fx.manager.refresh().phase(), RefreshPhase::Idle);
    assert!(fx.manager.refresh().pending().is_empty());
}
