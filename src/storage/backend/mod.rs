//! SeaORM storage backend
//!
//! Relational adapter for SQLite, MySQL/MariaDB and PostgreSQL. Nested value
//! objects are stored as JSON text columns; uniqueness of `email` / `handle`
//! is enforced by the schema.

mod analytics;
mod connection;
mod converters;
mod migrations;
mod mutations;
mod operations;
mod query;
pub mod retry;

use sea_orm::{DatabaseConnection, DbBackend};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::errors::{DriplnkError, Result};

pub use connection::{connect_generic, connect_sqlite};
pub use converters::{
    event_to_active_model, link_to_active_model, model_to_event, model_to_link, model_to_user,
    user_to_active_model,
};
pub use migrations::{
    MigrationOutcome, MigrationState, apply_migrations, migration_status, rollback_migrations,
};

/// SeaORM-based storage backend
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
    backend_name: String,
    retry_config: retry::RetryConfig,
}

impl SeaOrmStorage {
    /// 连接并执行迁移
    pub async fn new(config: &DatabaseConfig, backend_name: &str) -> Result<Self> {
        let storage = Self::connect(config, backend_name).await?;

        let outcome = apply_migrations(&storage.db).await?;
        info!("Migration outcome: {}", outcome);

        warn!(
            "{} Storage initialized.",
            storage.backend_name.to_uppercase()
        );
        Ok(storage)
    }

    /// 只建立连接，不执行迁移（migrate 子命令使用）
    pub async fn connect(config: &DatabaseConfig, backend_name: &str) -> Result<Self> {
        if config.url.is_empty() {
            return Err(DriplnkError::database_config("数据库 URL 未设置"));
        }

        let db = if backend_name == "sqlite" {
            connect_sqlite(&config.url).await?
        } else {
            connect_generic(config, backend_name).await?
        };

        Ok(SeaOrmStorage {
            db,
            backend_name: backend_name.to_string(),
            retry_config: retry::RetryConfig::from(config),
        })
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    /// 获取数据库连接（迁移命令等需要直接访问数据库的场景）
    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }

    fn db_backend(&self) -> DbBackend {
        self.db.get_database_backend()
    }

    /// 关闭连接池
    pub async fn close(&self) -> Result<()> {
        self.db
            .clone()
            .close()
            .await
            .map_err(|e| DriplnkError::database_connection(format!("关闭连接池失败: {}", e)))?;
        info!("{} connection pool closed", self.backend_name.to_uppercase());
        Ok(())
    }
}
