//! Migration applier
//!
//! Wraps the `migration` crate's `Migrator`. Applying with nothing pending is
//! a normal outcome ([`MigrationOutcome::NoChange`]), never an error, so it is
//! safe to run on every relational-adapter construction.

use std::fmt;

use sea_orm::DatabaseConnection;
use tracing::info;

use crate::errors::{DriplnkError, Result};
use migration::{Migrator, MigratorTrait};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// 应用了这些版本（按顺序）
    Applied(Vec<String>),
    /// 已是最新
    NoChange,
}

impl MigrationOutcome {
    pub fn applied_count(&self) -> usize {
        match self {
            MigrationOutcome::Applied(versions) => versions.len(),
            MigrationOutcome::NoChange => 0,
        }
    }
}

impl fmt::Display for MigrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationOutcome::Applied(versions) => {
                write!(f, "applied {} migration(s): {}", versions.len(), versions.join(", "))
            }
            MigrationOutcome::NoChange => write!(f, "no change (schema up to date)"),
        }
    }
}

/// 单个迁移的状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationState {
    pub version: String,
    pub applied: bool,
}

/// 应用全部待执行迁移
pub async fn apply_migrations(db: &DatabaseConnection) -> Result<MigrationOutcome> {
    let pending: Vec<String> = Migrator::get_pending_migrations(db)
        .await
        .map_err(|e| DriplnkError::migration(format!("读取迁移状态失败: {}", e)))?
        .iter()
        .map(|m| m.name().to_string())
        .collect();

    if pending.is_empty() {
        info!("Database migrations: no change");
        return Ok(MigrationOutcome::NoChange);
    }

    Migrator::up(db, None)
        .await
        .map_err(|e| DriplnkError::migration(format!("迁移失败: {}", e)))?;

    info!("Database migrations applied: {}", pending.join(", "));
    Ok(MigrationOutcome::Applied(pending))
}

/// 回滚最近 `steps` 个迁移；`None` 回滚全部
pub async fn rollback_migrations(
    db: &DatabaseConnection,
    steps: Option<u32>,
) -> Result<MigrationOutcome> {
    let applied: Vec<String> = Migrator::get_applied_migrations(db)
        .await
        .map_err(|e| DriplnkError::migration(format!("读取迁移状态失败: {}", e)))?
        .iter()
        .map(|m| m.name().to_string())
        .collect();

    if applied.is_empty() {
        return Ok(MigrationOutcome::NoChange);
    }

    let count = steps.map_or(applied.len(), |s| (s as usize).min(applied.len()));
    let reverted: Vec<String> = applied.iter().rev().take(count).cloned().collect();

    Migrator::down(db, steps)
        .await
        .map_err(|e| DriplnkError::migration(format!("回滚失败: {}", e)))?;

    info!("Database migrations reverted: {}", reverted.join(", "));
    Ok(MigrationOutcome::Applied(reverted))
}

pub async fn migration_status(db: &DatabaseConnection) -> Result<Vec<MigrationState>> {
    let applied: Vec<String> = Migrator::get_applied_migrations(db)
        .await
        .map_err(|e| DriplnkError::migration(format!("读取迁移状态失败: {}", e)))?
        .iter()
        .map(|m| m.name().to_string())
        .collect();

    Ok(Migrator::migrations()
        .iter()
        .map(|m| {
            let version = m.name().to_string();
            MigrationState {
                applied: applied.contains(&version),
                version,
            }
        })
        .collect())
}
