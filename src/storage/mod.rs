//! Storage backends and backend selection
//!
//! Exactly one backend is active per process. [`Storage`] is a closed set of
//! the two adapters; both implement every repository port.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::{DatabaseConfig, StaticConfig};
use crate::domain::{AnalyticsEvent, AnalyticsSummary, Link, User};
use crate::errors::{DriplnkError, Result};
use crate::repository::{AnalyticsRepository, LinkRepository, Repositories, UserRepository};

pub mod backend;
pub mod kv;

pub use backend::SeaOrmStorage;
pub use kv::KvStorage;

/// 解析后的后端类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Kv,
    /// sea-orm 后端名：`sqlite` | `postgres` | `mysql`
    Relational(String),
}

impl BackendKind {
    /// `backend` 为空时：URL 为空选 sled，否则按 URL 推断
    pub fn resolve(config: &DatabaseConfig) -> Result<Self> {
        let backend = config.backend.trim().to_lowercase();
        match backend.as_str() {
            "" if config.url.is_empty() => Ok(BackendKind::Kv),
            "" => infer_backend_from_url(&config.url).map(BackendKind::Relational),
            "sled" | "kv" => Ok(BackendKind::Kv),
            "sqlite" | "postgres" | "mysql" | "mariadb" => {
                Ok(BackendKind::Relational(normalize_backend_name(&backend)))
            }
            "postgresql" => Ok(BackendKind::Relational("postgres".to_string())),
            other => Err(DriplnkError::database_config(format!(
                "不支持的存储后端: {}. 可选值: sled, sqlite, postgres, mysql",
                other
            ))),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            BackendKind::Kv => "sled",
            BackendKind::Relational(name) => name,
        }
    }
}

/// 从 URL 自动推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite:")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(DriplnkError::database_config(format!(
            "无法从 URL 推断数据库类型: {}. 支持的 URL 格式: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// 规范化 backend 名称
pub fn normalize_backend_name(backend: &str) -> String {
    match backend {
        "mariadb" => "mysql".to_string(),
        other => other.to_string(),
    }
}

/// 当前进程使用的存储后端
#[derive(Clone)]
pub enum Storage {
    Kv(Arc<KvStorage>),
    Relational(Arc<SeaOrmStorage>),
}

impl Storage {
    pub fn kind(&self) -> BackendKind {
        match self {
            Storage::Kv(_) => BackendKind::Kv,
            Storage::Relational(db) => BackendKind::Relational(db.backend_name().to_string()),
        }
    }

    /// 交给业务层的三个 port 句柄
    pub fn repositories(&self) -> Repositories {
        match self {
            Storage::Kv(kv) => Repositories::from_backend(kv.clone()),
            Storage::Relational(db) => Repositories::from_backend(db.clone()),
        }
    }

    /// KV 后端的存储目录（用于快照）
    pub fn kv_path(&self) -> Option<&Path> {
        match self {
            Storage::Kv(kv) => Some(kv.path()),
            Storage::Relational(_) => None,
        }
    }

    /// 刷盘 / 关闭连接池
    pub async fn close(&self) -> Result<()> {
        match self {
            Storage::Kv(kv) => kv.flush().await,
            Storage::Relational(db) => db.close().await,
        }
    }
}

#[async_trait::async_trait]
impl UserRepository for Storage {
    async fn save(&self, user: &User) -> Result<()> {
        match self {
            Storage::Kv(kv) => UserRepository::save(kv.as_ref(), user).await,
            Storage::Relational(db) => UserRepository::save(db.as_ref(), user).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<User> {
        match self {
            Storage::Kv(kv) => UserRepository::get_by_id(kv.as_ref(), id).await,
            Storage::Relational(db) => UserRepository::get_by_id(db.as_ref(), id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<User> {
        match self {
            Storage::Kv(kv) => kv.get_by_email(email).await,
            Storage::Relational(db) => db.get_by_email(email).await,
        }
    }

    async fn get_by_handle(&self, handle: &str) -> Result<User> {
        match self {
            Storage::Kv(kv) => kv.get_by_handle(handle).await,
            Storage::Relational(db) => db.get_by_handle(handle).await,
        }
    }

    async fn list_all(&self) -> Result<Vec<User>> {
        match self {
            Storage::Kv(kv) => kv.list_all().await,
            Storage::Relational(db) => db.list_all().await,
        }
    }
}

#[async_trait::async_trait]
impl LinkRepository for Storage {
    async fn save(&self, link: &Link) -> Result<()> {
        match self {
            Storage::Kv(kv) => LinkRepository::save(kv.as_ref(), link).await,
            Storage::Relational(db) => LinkRepository::save(db.as_ref(), link).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Link> {
        match self {
            Storage::Kv(kv) => LinkRepository::get_by_id(kv.as_ref(), id).await,
            Storage::Relational(db) => LinkRepository::get_by_id(db.as_ref(), id).await,
        }
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Link>> {
        match self {
            Storage::Kv(kv) => kv.list_by_user(user_id).await,
            Storage::Relational(db) => db.list_by_user(user_id).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match self {
            Storage::Kv(kv) => kv.delete(id).await,
            Storage::Relational(db) => db.delete(id).await,
        }
    }

    async fn reorder(&self, user_id: &str, ordered_ids: &[String]) -> Result<()> {
        match self {
            Storage::Kv(kv) => kv.reorder(user_id, ordered_ids).await,
            Storage::Relational(db) => db.reorder(user_id, ordered_ids).await,
        }
    }
}

#[async_trait::async_trait]
impl AnalyticsRepository for Storage {
    async fn save_event(&self, event: &AnalyticsEvent) -> Result<()> {
        match self {
            Storage::Kv(kv) => kv.save_event(event).await,
            Storage::Relational(db) => db.save_event(event).await,
        }
    }

    async fn get_summary(&self, user_id: &str, link_id: Option<&str>) -> Result<AnalyticsSummary> {
        match self {
            Storage::Kv(kv) => kv.get_summary(user_id, link_id).await,
            Storage::Relational(db) => db.get_summary(user_id, link_id).await,
        }
    }
}

pub struct StorageFactory;

impl StorageFactory {
    /// 按配置打开存储；关系型后端会执行迁移
    pub async fn create(config: &StaticConfig) -> Result<Storage> {
        let kind = BackendKind::resolve(&config.database)?;
        info!("Using storage backend: {}", kind.name());

        match kind {
            BackendKind::Kv => {
                let kv = KvStorage::from_config(&config.kv)?;
                Ok(Storage::Kv(Arc::new(kv)))
            }
            BackendKind::Relational(name) => {
                let db = SeaOrmStorage::new(&config.database, &name).await?;
                Ok(Storage::Relational(Arc::new(db)))
            }
        }
    }
}
