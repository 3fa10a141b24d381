//! Repository ports
//!
//! Backend-agnostic contracts consumed by the business layer. Both the sled
//! (KV) and the SeaORM (relational) backends implement all three traits, so
//! callers never learn which one is active.
//!
//! Cancellation: every method is an `async fn`. Dropping the returned future
//! aborts the call. Multi-key writes are committed as one batch/transaction
//! in a single final step, so an aborted call leaves no partial write behind.

use std::sync::Arc;

use crate::domain::{AnalyticsEvent, AnalyticsSummary, Link, User};
use crate::errors::Result;

#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    /// 幂等 upsert；email / handle 被其他用户占用时返回 `Conflict`
    async fn save(&self, user: &User) -> Result<()>;
    async fn get_by_id(&self, id: &str) -> Result<User>;
    async fn get_by_email(&self, email: &str) -> Result<User>;
    async fn get_by_handle(&self, handle: &str) -> Result<User>;
    /// 按创建时间升序返回（用于 sitemap）
    async fn list_all(&self) -> Result<Vec<User>>;
}

#[async_trait::async_trait]
pub trait LinkRepository: Send + Sync {
    async fn save(&self, link: &Link) -> Result<()>;
    async fn get_by_id(&self, id: &str) -> Result<Link>;
    /// 按 `order` 升序返回
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Link>>;
    async fn delete(&self, id: &str) -> Result<()>;
    /// 将 `ordered_ids` 中每个链接的 order 设为其下标，跳过不属于 `user_id` 的 id
    async fn reorder(&self, user_id: &str, ordered_ids: &[String]) -> Result<()>;
}

#[async_trait::async_trait]
pub trait AnalyticsRepository: Send + Sync {
    async fn save_event(&self, event: &AnalyticsEvent) -> Result<()>;
    async fn get_summary(&self, user_id: &str, link_id: Option<&str>) -> Result<AnalyticsSummary>;
}

/// The three ports bundled for handing to the business layer.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub links: Arc<dyn LinkRepository>,
    pub analytics: Arc<dyn AnalyticsRepository>,
}

impl Repositories {
    /// 同一个后端实例同时实现三个 port
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: UserRepository + LinkRepository + AnalyticsRepository + 'static,
    {
        Self {
            users: backend.clone(),
            links: backend.clone(),
            analytics: backend,
        }
    }
}
