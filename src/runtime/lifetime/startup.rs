use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::StaticConfig;
use crate::snapshot::{RestoreOutcome, SnapshotOrchestrator};
use crate::storage::{BackendKind, Storage, StorageFactory};

/// 运行期间持有的存储与快照句柄
pub struct StorageContext {
    pub storage: Storage,
    /// 仅 KV 后端且启用快照时存在
    pub snapshot: Option<Arc<SnapshotOrchestrator>>,
}

/// 恢复快照（KV）→ 打开存储；关系型后端在打开时执行迁移
pub async fn prepare_storage(config: &StaticConfig) -> Result<StorageContext> {
    let start_time = std::time::Instant::now();
    debug!("Preparing storage...");

    let kind = BackendKind::resolve(&config.database).context("Failed to resolve storage backend")?;

    let snapshot = match kind {
        BackendKind::Kv if config.snapshot.enabled => {
            let orchestrator = SnapshotOrchestrator::from_config(&config.snapshot)
                .await
                .context("Failed to create snapshot object store")?;

            let store_path = config.kv.store_path();
            match orchestrator
                .restore(&store_path)
                .await
                .context("Failed to restore KV snapshot")?
            {
                RestoreOutcome::Restored { files } => {
                    info!("Restored {} files into {}", files, store_path.display())
                }
                RestoreOutcome::FreshInstall => info!("No snapshot found, fresh install"),
            }
            Some(Arc::new(orchestrator))
        }
        BackendKind::Relational(_) if config.snapshot.enabled => {
            warn!("Snapshot backup only applies to the KV backend, ignoring [snapshot]");
            None
        }
        _ => None,
    };

    let storage = StorageFactory::create(config)
        .await
        .context("Failed to create storage backend")?;

    info!(
        "Storage ready ({}) in {:.2?}",
        storage.kind().name(),
        start_time.elapsed()
    );
    Ok(StorageContext { storage, snapshot })
}
