//! EventRecorder tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use driplnk::analytics::EventRecorder;
use driplnk::config::init_config;
use driplnk::domain::{AnalyticsEvent, AnalyticsSummary, EventType};
use driplnk::errors::{DriplnkError, Result};
use driplnk::repository::{AnalyticsRepository, Repositories};
use driplnk::storage::KvStorage;
use tempfile::TempDir;

static INIT: Once = Once::new();

fn init_test_config() {
    INIT.call_once(|| {
        init_config(None).expect("Failed to load test configuration");
    });
}

/// 写入前睡眠 `delay`，可选地直接失败
struct SlowRepository {
    delay: Duration,
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl AnalyticsRepository for SlowRepository {
    async fn save_event(&self, _event: &AnalyticsEvent) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(DriplnkError::database_connection("connection refused"));
        }
        Ok(())
    }

    async fn get_summary(&self, _user_id: &str, _link_id: Option<&str>) -> Result<AnalyticsSummary> {
        Ok(AnalyticsSummary::default())
    }
}

fn view_for(user_id: &str) -> AnalyticsEvent {
    let mut event = AnalyticsEvent::new(EventType::View, "visitor-1");
    event.user_id = Some(user_id.to_string());
    event
}

#[tokio::test]
async fn test_record_writes_in_background() {
    init_test_config();
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(KvStorage::open(dir.path().join("kv"), false).unwrap());
    let repos = Repositories::from_backend(storage);
    let recorder = EventRecorder::new(repos.analytics.clone(), Duration::from_secs(5));

    let handles: Vec<_> = (0..3).map(|_| recorder.record(view_for("u1"))).collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let summary = repos.analytics.get_summary("u1", None).await.unwrap();
    assert_eq!(summary.total_views, 3);
}

#[tokio::test]
async fn test_record_and_wait_times_out() {
    let repo = Arc::new(SlowRepository {
        delay: Duration::from_millis(500),
        fail: false,
        calls: AtomicUsize::new(0),
    });
    let recorder = EventRecorder::new(repo.clone(), Duration::from_millis(20));

    let err = recorder.record_and_wait(&view_for("u1")).await.unwrap_err();
    assert!(err.to_string().contains("timed out"), "unexpected error: {}", err);
    assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_record_swallows_failures() {
    let repo = Arc::new(SlowRepository {
        delay: Duration::ZERO,
        fail: true,
        calls: AtomicUsize::new(0),
    });
    let recorder = EventRecorder::new(repo.clone(), Duration::from_secs(1));

    assert!(recorder.record_and_wait(&view_for("u1")).await.is_err());

    // 后台任务不 panic，失败只记录日志
    recorder.record(view_for("u1")).await.unwrap();
    assert_eq!(repo.calls.load(Ordering::SeqCst), 2);
}
