//! Scheduler Integration Tests
//!
//! Refresh loops against a mock store in real time with short intervals.

use async_trait::async_trait;
use secrets_sync::{
    CycleError, CycleState, FileTarget, Scheduler, SchedulerError, SchedulerOptions, Secret,
    TemplateEntry,
};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sync_vault_client::{FetchRequest, FetchResult, KvVersion, SecretStore, SecretVersion, VaultResult};
use tempfile::TempDir;
use test_utils::{MockFailure, MockSecretStore};

fn secret(name: &str, dir: &Path, interval: Duration) -> Secret {
    Secret {
        name: name.to_string(),
        key: format!("app/{name}"),
        namespace: String::new(),
        mount_path: "secret".to_string(),
        kv_version: KvVersion::V2,
        refresh_interval: interval,
        version: None,
        templates: vec![TemplateEntry::new("value", "{{ .value }}")],
        files: vec![FileTarget::new(dir.join(name), 0o600)],
    }
}

async fn serve(store: &MockSecretStore, name: &str, value: &str) {
    store
        .set_secret(
            &format!("app/{name}"),
            FetchResult::new([("value", value)], SecretVersion::Version(1)),
        )
        .await;
}

/// Delegates to a mock store but panics when `app/explode` is fetched.
struct ExplodingStore(MockSecretStore);

#[async_trait]
impl SecretStore for ExplodingStore {
    async fn fetch(&self, request: &FetchRequest) -> VaultResult<FetchResult> {
        if request.path == "app/explode" {
            panic!("store blew up");
        }
        self.0.fetch(request).await
    }
}

fn options() -> SchedulerOptions {
    SchedulerOptions::default().with_shutdown_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_start_without_secrets() {
    let mut scheduler = Scheduler::new(Arc::new(MockSecretStore::new()), Vec::new(), options());
    assert!(matches!(scheduler.start().await, Err(SchedulerError::NoSecrets)));
}

#[tokio::test]
async fn test_start_twice() {
    let dir = TempDir::new().unwrap();
    let store = MockSecretStore::new();
    serve(&store, "app", "v").await;
    let mut scheduler = Scheduler::new(
        Arc::new(store),
        vec![secret("app", dir.path(), Duration::from_secs(60))],
        options(),
    );

    tokio_test::assert_ok!(scheduler.start().await);
    assert!(matches!(scheduler.start().await, Err(SchedulerError::AlreadyStarted)));
    scheduler.stop().await;
}

#[tokio::test]
async fn test_start_waits_for_first_cycles() {
    let dir = TempDir::new().unwrap();
    let store = MockSecretStore::new();
    serve(&store, "good", "v").await;
    store.fail_with("app/bad", MockFailure::Unavailable).await;

    let mut scheduler = Scheduler::new(
        Arc::new(store),
        vec![
            secret("good", dir.path(), Duration::from_secs(60)),
            secret("bad", dir.path(), Duration::from_secs(60)),
        ],
        options(),
    );
    assert!(!scheduler.is_ready());

    scheduler.start().await.unwrap();
    assert!(scheduler.is_ready());
    assert_eq!(std::fs::read_to_string(dir.path().join("good")).unwrap(), "v");

    let statuses = scheduler.statuses();
    let names: Vec<_> = statuses.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["good", "bad"]);
    assert_eq!(statuses[0].1.cycles, 1);
    assert_eq!(statuses[0].1.consecutive_failures, 0);
    assert_eq!(statuses[1].1.cycles, 1);
    assert_eq!(statuses[1].1.consecutive_failures, 1);
    assert!(!dir.path().join("bad").exists());

    scheduler.stop().await;
}

#[tokio::test]
async fn test_slow_secret_does_not_delay_others() {
    let dir = TempDir::new().unwrap();
    let store = MockSecretStore::new();
    serve(&store, "fast", "f").await;
    serve(&store, "slow", "s").await;
    store.set_delay("app/slow", Duration::from_millis(500)).await;
    store.fail_with("app/broken", MockFailure::Unauthorized).await;

    let mut scheduler = Scheduler::new(
        Arc::new(store.clone()),
        vec![
            secret("slow", dir.path(), Duration::from_secs(60)),
            secret("fast", dir.path(), Duration::from_millis(50)),
            secret("broken", dir.path(), Duration::from_millis(50)),
        ],
        options(),
    );

    scheduler.start().await.unwrap();

    assert_eq!(store.calls("app/slow").await, 1);
    assert!(store.calls("app/fast").await >= 3);
    let broken = scheduler.status("broken").unwrap();
    assert!(broken.consecutive_failures >= 3);
    assert!(broken.last_error.is_some());
    assert_eq!(std::fs::read_to_string(dir.path().join("fast")).unwrap(), "f");

    scheduler.stop().await;
}

#[tokio::test]
async fn test_cycles_never_overlap() {
    let dir = TempDir::new().unwrap();
    let store = MockSecretStore::new();
    serve(&store, "app", "v").await;
    store.set_delay("app/app", Duration::from_millis(60)).await;

    let mut scheduler = Scheduler::new(
        Arc::new(store.clone()),
        vec![secret("app", dir.path(), Duration::from_millis(20))],
        options(),
    );
    scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    scheduler.stop().await;

    let log = store.call_log().await;
    assert!(log.len() >= 3);
    for pair in log.windows(2) {
        assert!(pair[1].started >= pair[0].finished);
    }
}

#[tokio::test]
async fn test_stop_cancels_in_flight_fetch() {
    let dir = TempDir::new().unwrap();
    let store = MockSecretStore::new();
    serve(&store, "app", "v").await;
    store.set_delay("app/app", Duration::from_secs(30)).await;

    let mut scheduler = Scheduler::new(
        Arc::new(store.clone()),
        vec![secret("app", dir.path(), Duration::from_secs(60))],
        options(),
    );
    assert!(
        tokio::time::timeout(Duration::from_millis(100), scheduler.start())
            .await
            .is_err()
    );
    assert_eq!(scheduler.status("app").unwrap().state, CycleState::Fetching);

    let stopping = Instant::now();
    scheduler.stop().await;
    assert!(stopping.elapsed() < Duration::from_secs(2));

    let status = scheduler.status("app").unwrap();
    assert_eq!(status.state, CycleState::Stopped);
    assert_eq!(status.cycles, 0);
    assert_eq!(store.calls("app/app").await, 0);
    assert!(!dir.path().join("app").exists());
}

#[tokio::test]
async fn test_no_fetches_after_stop() {
    let dir = TempDir::new().unwrap();
    let store = MockSecretStore::new();
    serve(&store, "app", "v").await;

    let mut scheduler = Scheduler::new(
        Arc::new(store.clone()),
        vec![secret("app", dir.path(), Duration::from_millis(20))],
        options(),
    );
    scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    scheduler.stop().await;

    let calls = store.calls("app/app").await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(store.calls("app/app").await, calls);
}

#[tokio::test]
async fn test_initial_delay_postpones_first_fetch() {
    let dir = TempDir::new().unwrap();
    let store = MockSecretStore::new();
    serve(&store, "app", "v").await;

    let mut scheduler = Scheduler::new(
        Arc::new(store.clone()),
        vec![secret("app", dir.path(), Duration::from_secs(60))],
        options().with_initial_delay(Duration::from_millis(300)),
    );
    assert!(
        tokio::time::timeout(Duration::from_millis(100), scheduler.start())
            .await
            .is_err()
    );
    assert_eq!(store.calls("app/app").await, 0);
    assert!(!scheduler.is_ready());

    scheduler.ready().await;
    assert_eq!(store.calls("app/app").await, 1);
    assert!(matches!(scheduler.start().await, Err(SchedulerError::AlreadyStarted)));

    scheduler.stop().await;
}

#[tokio::test]
async fn test_failures_reset_after_success() {
    let dir = TempDir::new().unwrap();
    let store = MockSecretStore::new();
    serve(&store, "app", "v").await;
    store.push_response("app/app", Err(MockFailure::Unavailable)).await;
    store.push_response("app/app", Err(MockFailure::Unavailable)).await;

    let mut scheduler = Scheduler::new(
        Arc::new(store.clone()),
        vec![secret("app", dir.path(), Duration::from_millis(30))],
        options(),
    );
    scheduler.start().await.unwrap();
    assert_eq!(scheduler.status("app").unwrap().consecutive_failures, 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    scheduler.stop().await;

    let status = scheduler.status("app").unwrap();
    assert_eq!(status.consecutive_failures, 0);
    assert!(status.last_error.is_none());
    assert!(status.last_success.is_some());
    assert_eq!(std::fs::read_to_string(dir.path().join("app")).unwrap(), "v");
}

#[tokio::test]
async fn test_zero_interval_rejected_at_start() {
    let dir = TempDir::new().unwrap();
    let store = MockSecretStore::new();
    serve(&store, "app", "v").await;
    let mut scheduler = Scheduler::new(
        Arc::new(store.clone()),
        vec![
            secret("app", dir.path(), Duration::from_secs(60)),
            secret("busy", dir.path(), Duration::ZERO),
        ],
        options(),
    );

    let result = tokio::time::timeout(Duration::from_secs(2), scheduler.start())
        .await
        .unwrap();
    assert_eq!(
        result,
        Err(SchedulerError::ZeroInterval {
            secret: "busy".to_string()
        })
    );
    assert_eq!(store.calls("app/app").await, 0);
    assert!(!scheduler.is_ready());
}

#[tokio::test]
async fn test_panicking_loop_does_not_block_start() {
    let dir = TempDir::new().unwrap();
    let store = MockSecretStore::new();
    serve(&store, "app", "v").await;
    let mut scheduler = Scheduler::new(
        Arc::new(ExplodingStore(store)),
        vec![
            secret("explode", dir.path(), Duration::from_secs(60)),
            secret("app", dir.path(), Duration::from_secs(60)),
        ],
        options(),
    );

    tokio::time::timeout(Duration::from_secs(2), scheduler.start())
        .await
        .unwrap()
        .unwrap();
    assert!(scheduler.is_ready());
    assert_eq!(std::fs::read_to_string(dir.path().join("app")).unwrap(), "v");
    assert_eq!(scheduler.status("app").unwrap().cycles, 1);

    scheduler.stop().await;
}

#[tokio::test]
async fn test_run_once_reports_panicked_cycle() {
    let dir = TempDir::new().unwrap();
    let store = MockSecretStore::new();
    serve(&store, "app", "v").await;
    let scheduler = Scheduler::new(
        Arc::new(ExplodingStore(store)),
        vec![
            secret("explode", dir.path(), Duration::from_secs(60)),
            secret("app", dir.path(), Duration::from_secs(60)),
        ],
        options(),
    );

    let results = scheduler.run_once().await;
    assert_eq!(results[0].0, "explode");
    assert!(matches!(results[0].1, Err(CycleError::Panicked(_))));
    assert!(results[1].1.is_ok());

    let status = scheduler.status("explode").unwrap();
    assert_eq!(status.consecutive_failures, 1);
    assert!(status.last_error.unwrap().contains("panicked"));
}
