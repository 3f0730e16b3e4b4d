//! Integration tests for the client core
//!
//! These tests verify that the components work together in realistic usage
//! scenarios. Tests cover:
//! - Queue scheduling under a shared session queue
//! - Day orchestration event flow against a fake service
//! - Streaming progress decoding end to end
//! - Configuration file loading

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use pretty_assertions::assert_eq;
use tokio::sync::{mpsc, oneshot, Notify};

use tracksync_core::{
    load_config_from_path, read_lines, DayDiff, DayEvent, DaySync, DiffService, JobOutcome,
    Priority, SchedulerConfig, Settings, SyncProgress, WorkQueue,
};

// =============================================================================
// Test Service
// =============================================================================

/// In-process stand-in for the sync server.
#[derive(Default)]
struct FakeService {
    /// When set, `fetch_diff` waits here before returning.
    gate: Option<Arc<Notify>>,
    /// Fail every diff fetch.
    fail_fetch: bool,
    /// Progress records to play back during `sync_day`.
    ticks: Vec<SyncProgress>,
    /// Fail the sync after this many records were delivered.
    fail_sync_after: Option<usize>,
    /// Completed diff fetches.
    fetch_calls: AtomicUsize,
}

#[async_trait]
impl DiffService for FakeService {
    async fn fetch_settings(&self) -> anyhow::Result<Settings> {
        Ok(Settings {
            jira_username: Some("jdoe".to_string()),
        })
    }

    async fn fetch_diff(
        &self,
        _min: &DateTime<Local>,
        _max: &DateTime<Local>,
    ) -> anyhow::Result<DayDiff> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail_fetch {
            anyhow::bail!("diff fetch exploded");
        }
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(DayDiff::default())
    }

    async fn sync_day(
        &self,
        _min: &DateTime<Local>,
        _max: &DateTime<Local>,
        on_progress: &mut (dyn FnMut(u8) + Send),
    ) -> anyhow::Result<()> {
        for (delivered, tick) in self.ticks.iter().enumerate() {
            if self.fail_sync_after == Some(delivered) {
                anyhow::bail!("sync step failed");
            }
            on_progress(tick.percent());
        }
        if self.fail_sync_after == Some(self.ticks.len()) {
            anyhow::bail!("sync step failed");
        }
        Ok(())
    }
}

fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

fn day_sync(service: Arc<FakeService>, workers: usize) -> (DaySync, mpsc::Receiver<DayEvent>) {
    let queue = WorkQueue::new(SchedulerConfig::new().with_workers(workers)).unwrap();
    let (tx, rx) = mpsc::channel(64);
    (DaySync::new(service, queue, tx), rx)
}

/// Route core tracing output through the test harness when `RUST_LOG` asks
/// for it; repeated calls are fine.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn next_event(rx: &mut mpsc::Receiver<DayEvent>) -> DayEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

// =============================================================================
// Test 1: Priority Never Preempts a Running Job
// =============================================================================

/// The end-to-end scheduling scenario: with a single worker, a high-priority
/// submission made while a normal job is running waits for it to finish.
#[tokio::test]
async fn test_running_job_not_preempted_by_priority() {
    let queue = WorkQueue::new(SchedulerConfig::default()).unwrap();
    let order = Arc::new(order_log::Order::default());

    let (started_tx, started_rx) = oneshot::channel::<()>();
    let (release_tx, release_rx) = oneshot::channel::<()>();

    let a = {
        let order = Arc::clone(&order);
        queue.submit(
            async move {
                order.push("A-start");
                started_tx.send(()).ok();
                release_rx.await.ok();
                order.push("A-end");
                Ok(())
            },
            Priority::Normal,
        )
    };

    // B arrives only once A is demonstrably running.
    started_rx.await.unwrap();
    let b = {
        let order = Arc::clone(&order);
        queue.submit(
            async move {
                order.push("B-start");
                order.push("B-end");
                Ok(())
            },
            Priority::High,
        )
    };

    release_tx.send(()).unwrap();
    assert!(a.outcome().await.is_success());
    assert!(b.outcome().await.is_success());

    assert_eq!(order.snapshot(), vec!["A-start", "A-end", "B-start", "B-end"]);
}

/// Tiny ordered log shared between jobs.
mod order_log {
    #[derive(Default)]
    pub struct Order(std::sync::Mutex<Vec<&'static str>>);

    impl Order {
        pub fn push(&self, tag: &'static str) {
            self.0.lock().unwrap().push(tag);
        }

        pub fn snapshot(&self) -> Vec<&'static str> {
            self.0.lock().unwrap().clone()
        }
    }
}

// =============================================================================
// Test 2: Queue Bounds Concurrent Work Across Many Jobs
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_queue_bounds_inflight_jobs() {
    let queue = WorkQueue::new(SchedulerConfig::new().with_workers(3)).unwrap();
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        handles.push(queue.submit(
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            },
            Priority::Normal,
        ));
    }

    for handle in handles {
        assert!(handle.outcome().await.is_success());
    }
    assert!(peak.load(Ordering::SeqCst) <= 3);
}

// =============================================================================
// Test 3: Refresh Event Flow
// =============================================================================

#[tokio::test]
async fn test_day_refresh_emits_events() {
    init_tracing();
    let (days, mut rx) = day_sync(Arc::new(FakeService::default()), 1);
    let date = test_date();

    let handle = days.refresh(date, Priority::Normal).expect("job submitted");
    assert_eq!(handle.outcome().await, JobOutcome::Success);

    assert!(matches!(
        next_event(&mut rx).await,
        DayEvent::RefreshStarted { date: d } if d == date
    ));
    assert!(matches!(
        next_event(&mut rx).await,
        DayEvent::Refreshed { date: d, .. } if d == date
    ));
    assert!(!days.is_loading(date));
}

#[tokio::test]
async fn test_day_refresh_failure_reports_error() {
    let (days, mut rx) = day_sync(
        Arc::new(FakeService {
            fail_fetch: true,
            ..Default::default()
        }),
        1,
    );
    let date = test_date();

    let handle = days.refresh(date, Priority::High).expect("job submitted");
    assert_eq!(
        handle.outcome().await,
        JobOutcome::Failure("diff fetch exploded".to_string())
    );

    assert!(matches!(
        next_event(&mut rx).await,
        DayEvent::RefreshStarted { .. }
    ));
    match next_event(&mut rx).await {
        DayEvent::RefreshFailed { date: d, error } => {
            assert_eq!(d, date);
            assert_eq!(error, "diff fetch exploded");
        }
        other => panic!("expected RefreshFailed, got {other:?}"),
    }

    // The failed job freed its slot and cleared the loading flag.
    assert!(!days.is_loading(date));
    assert!(days.refresh(date, Priority::Normal).is_some());
}

// =============================================================================
// Test 4: Duplicate Submissions Are Suppressed While In Flight
// =============================================================================

#[tokio::test]
async fn test_duplicate_refresh_suppressed() {
    let gate = Arc::new(Notify::new());
    let (days, _rx) = day_sync(
        Arc::new(FakeService {
            gate: Some(Arc::clone(&gate)),
            ..Default::default()
        }),
        1,
    );
    let date = test_date();

    let first = days.refresh(date, Priority::Normal).expect("job submitted");
    assert!(days.is_loading(date));
    assert!(days.refresh(date, Priority::Normal).is_none());
    assert!(days.sync(date).is_none());

    gate.notify_one();
    assert!(first.outcome().await.is_success());

    // Once settled, the day can be refreshed again.
    let again = days.refresh(date, Priority::Normal).expect("job submitted");
    gate.notify_one();
    assert!(again.outcome().await.is_success());
}

// =============================================================================
// Test 5: Sync Streams Progress, Then Chases With a Refresh
// =============================================================================

#[tokio::test]
async fn test_sync_streams_progress_then_refreshes() {
    let ticks = vec![
        SyncProgress {
            current: 1,
            total: 4,
        },
        SyncProgress {
            current: 2,
            total: 4,
        },
        SyncProgress {
            current: 4,
            total: 4,
        },
    ];
    let service = Arc::new(FakeService {
        ticks,
        ..Default::default()
    });
    let (days, mut rx) = day_sync(Arc::clone(&service), 1);
    let date = test_date();

    let handle = days.sync(date).expect("job submitted");
    assert_eq!(handle.outcome().await, JobOutcome::Success);

    assert!(matches!(
        next_event(&mut rx).await,
        DayEvent::SyncStarted { .. }
    ));
    for expected in [25u8, 50, 100] {
        match next_event(&mut rx).await {
            DayEvent::SyncProgress { percent, .. } => assert_eq!(percent, expected),
            other => panic!("expected SyncProgress, got {other:?}"),
        }
    }
    assert!(matches!(
        next_event(&mut rx).await,
        DayEvent::SyncFinished { date: d } if d == date
    ));

    // The chased high-priority refresh reloads the day's diff.
    assert!(matches!(
        next_event(&mut rx).await,
        DayEvent::RefreshStarted { date: d } if d == date
    ));
    assert!(matches!(
        next_event(&mut rx).await,
        DayEvent::Refreshed { date: d, .. } if d == date
    ));
    assert_eq!(service.fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_sync_failure_emits_sync_failed() {
    let ticks = vec![
        SyncProgress {
            current: 1,
            total: 2,
        },
        SyncProgress {
            current: 2,
            total: 2,
        },
    ];
    let service = Arc::new(FakeService {
        ticks,
        fail_sync_after: Some(1),
        ..Default::default()
    });
    let (days, mut rx) = day_sync(Arc::clone(&service), 1);
    let date = test_date();

    let handle = days.sync(date).expect("job submitted");
    assert_eq!(
        handle.outcome().await,
        JobOutcome::Failure("sync step failed".to_string())
    );

    assert!(matches!(
        next_event(&mut rx).await,
        DayEvent::SyncStarted { .. }
    ));
    assert!(matches!(
        next_event(&mut rx).await,
        DayEvent::SyncProgress { percent: 50, .. }
    ));
    match next_event(&mut rx).await {
        DayEvent::SyncFailed { date: d, error } => {
            assert_eq!(d, date);
            assert_eq!(error, "sync step failed");
        }
        other => panic!("expected SyncFailed, got {other:?}"),
    }

    // A failed sync does not chase with a refresh; progress already
    // delivered stands and the day is free for a retry.
    assert_eq!(service.fetch_calls.load(Ordering::SeqCst), 0);
    assert!(!days.is_loading(date));
}

// =============================================================================
// Test 6: Settings Round-Trip Through the Service Trait
// =============================================================================

#[tokio::test]
async fn test_settings_fetch_via_service_trait() {
    let service = FakeService::default();
    let settings = service.fetch_settings().await.unwrap();
    assert_eq!(settings.jira_username.as_deref(), Some("jdoe"));
}

// =============================================================================
// Test 7: Progress Records Decode From a Chunked NDJSON Stream
// =============================================================================

#[tokio::test]
async fn test_sync_progress_percentages_from_ndjson_chunks() {
    // Chunks split one record mid-object, as a real network stream may.
    let chunks: Vec<anyhow::Result<Vec<u8>>> = vec![
        Ok(b"{\"current\":1,\"total\":3}\n{\"cur".to_vec()),
        Ok(b"rent\":2,\"total\":3}\n".to_vec()),
        Ok(b"{\"current\":3,\"total\":3}\n".to_vec()),
    ];

    let mut percents = Vec::new();
    read_lines(tokio_stream::iter(chunks), |line| {
        let tick: SyncProgress = serde_json::from_str(line)?;
        percents.push(tick.percent());
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(percents, vec![33, 67, 100]);
}

// =============================================================================
// Test 8: Configuration File Loading
// =============================================================================

#[test]
fn test_config_file_loading() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "base_url = \"http://timehost:9999\"").unwrap();
    writeln!(file, "workers = 2").unwrap();

    let config = load_config_from_path(file.path()).unwrap();
    assert_eq!(config.base_url, "http://timehost:9999");
    assert_eq!(config.workers, 2);
    assert_eq!(config.request_timeout, Duration::from_secs(120));
}
