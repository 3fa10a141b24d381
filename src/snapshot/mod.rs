//! Snapshot backup / restore of the KV data directory
//!
//! One compressed archive per deployment, stored under a fixed object key
//! and overwritten on every backup. The caller owns sequencing: restore runs
//! before the KV store is opened, backup after it is closed.

pub mod archive;
pub mod object_store;

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::SnapshotConfig;
use crate::errors::{DriplnkError, Result};

pub use object_store::{LocalObjectStore, ObjectStore, S3ObjectStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// 快照已解压到数据目录
    Restored { files: usize },
    /// 对象存储中没有快照，数据目录未改动
    FreshInstall,
}

pub struct SnapshotOrchestrator {
    store: Arc<dyn ObjectStore>,
    key: String,
}

impl SnapshotOrchestrator {
    pub fn new(store: Arc<dyn ObjectStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// `local_dir` 优先，否则使用 S3
    pub async fn from_config(config: &SnapshotConfig) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = match &config.local_dir {
            Some(dir) if !dir.is_empty() => Arc::new(LocalObjectStore::new(dir)),
            _ => Arc::new(S3ObjectStore::from_config(config).await?),
        };
        Ok(Self::new(store, config.key.clone()))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// 打包 `data_dir` 并上传，随后删除本地归档
    pub async fn backup(&self, data_dir: &Path) -> Result<()> {
        let archive_path = local_archive_path(data_dir);

        let src = data_dir.to_path_buf();
        let dest = archive_path.clone();
        let files = tokio::task::spawn_blocking(move || archive::archive_dir(&src, &dest))
            .await
            .map_err(|e| DriplnkError::internal(format!("归档任务异常退出: {}", e)))??;

        let upload = async {
            let body = tokio::fs::read(&archive_path).await?;
            let size = body.len();
            self.store.put(&self.key, body).await?;
            Ok::<usize, DriplnkError>(size)
        }
        .await;

        if let Err(e) = tokio::fs::remove_file(&archive_path).await {
            warn!("Failed to remove local archive {}: {}", archive_path.display(), e);
        }

        let size = upload.map_err(|e| e.with_context("snapshot backup"))?;
        info!(
            "Snapshot backup complete: {} files, {} bytes -> {}/{}",
            files,
            size,
            self.store.describe(),
            self.key
        );
        Ok(())
    }

    /// 下载并解压到 `data_dir`；快照不存在视为首次部署
    pub async fn restore(&self, data_dir: &Path) -> Result<RestoreOutcome> {
        let Some(body) = self
            .store
            .get(&self.key)
            .await
            .map_err(|e| e.with_context("snapshot restore"))?
        else {
            info!(
                "No snapshot at {}/{}, starting fresh",
                self.store.describe(),
                self.key
            );
            return Ok(RestoreOutcome::FreshInstall);
        };

        let size = body.len();
        let target = data_dir.to_path_buf();
        let files = tokio::task::spawn_blocking(move || {
            archive::extract_archive(Cursor::new(body), &target)
        })
        .await
        .map_err(|e| DriplnkError::internal(format!("解压任务异常退出: {}", e)))?
        .map_err(|e| e.with_context("snapshot restore"))?;

        info!(
            "Snapshot restored: {} files ({} bytes) into {}",
            files,
            size,
            data_dir.display()
        );
        Ok(RestoreOutcome::Restored { files })
    }
}

/// `<data_dir>.snapshot.zip`，与数据目录同级
fn local_archive_path(data_dir: &Path) -> PathBuf {
    let normalized: PathBuf = data_dir.components().collect();
    let mut name = normalized.into_os_string();
    name.push(".snapshot.zip");
    PathBuf::from(name)
}
