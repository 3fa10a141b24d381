//! Object storage for snapshots
//!
//! Only whole-object put/get under a single key is needed. A missing object
//! is `Ok(None)`, not an error.

use std::path::{Path, PathBuf};

use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use tracing::debug;

use crate::config::SnapshotConfig;
use crate::errors::{DriplnkError, Result};

#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// 覆盖写入
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    /// 日志中显示的目标描述
    fn describe(&self) -> String;
}

/// S3 及兼容服务（MinIO、R2 等）
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// 默认凭证链；设置了 endpoint_url 时使用 path-style 寻址
    pub async fn from_config(config: &SnapshotConfig) -> Result<Self> {
        if config.bucket.is_empty() {
            return Err(DriplnkError::object_store("snapshot.bucket 未设置"));
        }

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.endpoint_url.is_some())
            .build();

        Ok(Self::new(Client::from_conf(s3_config), config.bucket.clone()))
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                DriplnkError::object_store(format!(
                    "上传 s3://{}/{} 失败: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        debug!("Uploaded {} bytes to s3://{}/{}", size, self.bucket, key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let context = DisplayErrorContext(&err).to_string();
                return match err.into_service_error() {
                    GetObjectError::NoSuchKey(_) => Ok(None),
                    _ => Err(DriplnkError::object_store(format!(
                        "下载 s3://{}/{} 失败: {}",
                        self.bucket, key, context
                    ))),
                };
            }
        };

        let data = output.body.collect().await.map_err(|e| {
            DriplnkError::object_store(format!(
                "读取 s3://{}/{} 内容失败: {}",
                self.bucket, key, e
            ))
        })?;
        Ok(Some(data.into_bytes().to_vec()))
    }

    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}

/// 本地目录充当对象存储，key 即文件名
pub struct LocalObjectStore {
    dir: PathBuf,
}

impl LocalObjectStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && Path::new(key)
                .components()
                .all(|c| matches!(c, std::path::Component::Normal(_)));
        if !valid {
            return Err(DriplnkError::object_store(format!("非法的对象 key: {}", key)));
        }
        Ok(self.dir.join(key))
    }
}

#[async_trait::async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, body).await?;
        debug!("Stored object at {}", path.display());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DriplnkError::object_store(format!(
                "读取 {} 失败: {}",
                path.display(),
                e
            ))),
        }
    }

    fn describe(&self) -> String {
        format!("file://{}", self.dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_store_put_get_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path());

        assert_eq!(store.get("snap.zip").await.unwrap(), None);
        store.put("snap.zip", b"v1".to_vec()).await.unwrap();
        store.put("snap.zip", b"v2".to_vec()).await.unwrap();
        assert_eq!(store.get("snap.zip").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn test_local_store_rejects_escaping_key() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path());
        assert!(store.put("../outside.zip", Vec::new()).await.is_err());
        assert!(store.get("/etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn test_s3_store_requires_bucket() {
        let config = SnapshotConfig::default();
        assert!(S3ObjectStore::from_config(&config).await.is_err());
    }
}
