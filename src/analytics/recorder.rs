use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{trace, warn};

use crate::config::AnalyticsConfig;
use crate::domain::AnalyticsEvent;
use crate::errors::{DriplnkError, Result};
use crate::repository::AnalyticsRepository;

/// 分析事件记录器
///
/// 请求路径上调用 [`EventRecorder::record`]，写入在后台任务中完成，
/// 失败或超时只记录日志，不影响调用方。
#[derive(Clone)]
pub struct EventRecorder {
    repo: Arc<dyn AnalyticsRepository>,
    timeout: Duration,
}

impl EventRecorder {
    pub fn new(repo: Arc<dyn AnalyticsRepository>, timeout: Duration) -> Self {
        Self { repo, timeout }
    }

    pub fn from_config(repo: Arc<dyn AnalyticsRepository>, config: &AnalyticsConfig) -> Self {
        Self::new(repo, Duration::from_millis(config.record_timeout_ms))
    }

    /// 后台写入，立即返回
    pub fn record(&self, event: AnalyticsEvent) -> JoinHandle<()> {
        let recorder = self.clone();
        tokio::spawn(async move {
            if let Err(e) = recorder.record_and_wait(&event).await {
                warn!(
                    "Dropped analytics event ({} visitor={}): {}",
                    event.event_type, event.visitor_id, e
                );
            }
        })
    }

    /// 等待写入完成（超时返回错误）
    pub async fn record_and_wait(&self, event: &AnalyticsEvent) -> Result<()> {
        match timeout(self.timeout, self.repo.save_event(event)).await {
            Ok(Ok(())) => {
                trace!("Analytics event recorded: {}", event.event_type);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DriplnkError::database_operation(format!(
                "analytics event save timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}
