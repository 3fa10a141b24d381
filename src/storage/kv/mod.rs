//! Embedded KV storage backend (sled)
//!
//! sled offers point get/insert/remove, atomic multi-key batches and ordered
//! prefix iteration. Unique lookups, ownership indexes and aggregates are all
//! built here from the key layout in [`keys`].
//!
//! Index/record divergence found while scanning (an index hit whose record is
//! gone) is skipped, not reported; [`KvStorage::check_consistency`] finds and
//! optionally removes such entries.

mod analytics;
mod consistency;
pub mod keys;
mod links;
mod users;

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::KvConfig;
use crate::errors::{DriplnkError, Result};

pub use consistency::ConsistencyReport;
pub use keys::KvKey;

pub struct KvStorage {
    db: sled::Db,
    path: PathBuf,
    flush_on_write: bool,
    /// 串行化 "读取-检查-提交" 型写入（唯一索引、排序）
    write_lock: Mutex<()>,
}

impl KvStorage {
    /// 打开（或创建）`path` 处的 sled 数据库
    pub fn open(path: impl AsRef<Path>, flush_on_write: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DriplnkError::file_operation(format!(
                    "无法创建数据目录 {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let db = sled::open(&path).map_err(|e| {
            DriplnkError::kv_store(format!("无法打开 KV 存储 {}: {}", path.display(), e))
        })?;

        info!("KV storage opened at {}", path.display());
        Ok(Self {
            db,
            path,
            flush_on_write,
            write_lock: Mutex::new(()),
        })
    }

    pub fn from_config(config: &KvConfig) -> Result<Self> {
        Self::open(config.store_path(), config.flush_on_write)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 刷盘；关闭前调用，保证目录内容完整可归档
    pub async fn flush(&self) -> Result<()> {
        let bytes = self.db.flush_async().await?;
        debug!("KV storage flushed {} bytes", bytes);
        Ok(())
    }

    // ============ 内部读写辅助 ============

    fn get_raw(&self, key: &KvKey) -> Result<Option<sled::IVec>> {
        Ok(self.db.get(key.encode())?)
    }

    fn get_json<T: DeserializeOwned>(&self, key: &KvKey) -> Result<Option<T>> {
        match self.get_raw(key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(|e| {
                    DriplnkError::serialization(format!("损坏的记录 {:?}: {}", key, e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// 索引 key 的值是主记录 id
    fn get_index_target(&self, key: &KvKey) -> Result<Option<String>> {
        match self.get_raw(key)? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| DriplnkError::kv_store(format!("索引值不是合法 UTF-8 {:?}: {}", key, e))),
            None => Ok(None),
        }
    }

    /// 前缀扫描，返回解码后的 key
    fn scan_keys(&self, prefix: &[u8]) -> Result<Vec<KvKey>> {
        let mut keys = Vec::new();
        for item in self.db.scan_prefix(prefix) {
            let (raw, _) = item?;
            match KvKey::decode(&raw) {
                Ok(key) => keys.push(key),
                Err(e) => warn!("Skipping undecodable key during scan: {}", e),
            }
        }
        Ok(keys)
    }

    /// 原子提交一个批次；调用方可在持有 `write_lock` 时调用
    fn apply(&self, batch: sled::Batch) -> Result<()> {
        self.db.apply_batch(batch)?;
        Ok(())
    }

    /// 按配置刷盘，在释放 `write_lock` 之后调用
    async fn sync(&self) -> Result<()> {
        if self.flush_on_write {
            self.db.flush_async().await?;
        }
        Ok(())
    }

    async fn commit(&self, batch: sled::Batch) -> Result<()> {
        self.apply(batch)?;
        self.sync().await
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}
