use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::startup::StorageContext;
use crate::storage::Storage;

/// 关闭存储超时时间（秒）
const CLOSE_TIMEOUT_SECS: u64 = 10;

/// 快照上传超时时间（秒）
const BACKUP_TIMEOUT_SECS: u64 = 120;

pub async fn listen_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, closing storage..."),
        Err(e) => warn!(
            "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
            e
        ),
    }
}

/// 关闭存储 → 备份（KV 且启用快照）
///
/// 备份前要求没有其他存储句柄存活；若仍被引用则跳过备份并返回错误。
pub async fn shutdown_storage(ctx: StorageContext) -> Result<()> {
    let StorageContext { storage, snapshot } = ctx;

    match timeout(Duration::from_secs(CLOSE_TIMEOUT_SECS), storage.close()).await {
        Ok(Ok(())) => info!("Storage closed"),
        Ok(Err(e)) => error!("Failed to close storage: {}", e),
        Err(_) => error!("Storage close timed out after {} seconds", CLOSE_TIMEOUT_SECS),
    }

    let Storage::Kv(kv) = storage else {
        return Ok(());
    };
    let Some(snapshot) = snapshot else {
        return Ok(());
    };

    let path = kv.path().to_path_buf();
    let kv = Arc::try_unwrap(kv).map_err(|_| {
        anyhow!("KV store is still referenced elsewhere, skipping snapshot backup")
    })?;
    drop(kv);

    match timeout(
        Duration::from_secs(BACKUP_TIMEOUT_SECS),
        snapshot.backup(&path),
    )
    .await
    {
        Ok(Ok(())) => {
            info!("Snapshot backup uploaded");
            Ok(())
        }
        Ok(Err(e)) => bail!("Snapshot backup failed: {}", e),
        Err(_) => bail!("Snapshot backup timed out after {} seconds", BACKUP_TIMEOUT_SECS),
    }
}
