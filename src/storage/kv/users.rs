use tracing::{debug, warn};

use super::{KvKey, KvStorage, keys, to_json};
use crate::domain::User;
use crate::errors::{DriplnkError, Result};
use crate::repository::UserRepository;

impl KvStorage {
    /// 唯一索引 `index_key` 已被其他用户占用时返回冲突
    fn ensure_unique(&self, index_key: &KvKey, user_id: &str, field: &str) -> Result<()> {
        match self.get_index_target(index_key)? {
            Some(owner) if owner != user_id => {
                // 索引指向的用户已不存在时视为孤儿索引，允许覆盖
                if self.get_raw(&KvKey::user(&owner))?.is_none() {
                    warn!(
                        "Overwriting orphaned {} index entry owned by missing user {}",
                        field, owner
                    );
                    return Ok(());
                }
                Err(DriplnkError::conflict(format!(
                    "{} 已被占用 (user={})",
                    field, user_id
                )))
            }
            _ => Ok(()),
        }
    }

    fn lookup_by_index(&self, index_key: &KvKey, what: &str) -> Result<User> {
        let id = self
            .get_index_target(index_key)?
            .ok_or_else(|| DriplnkError::not_found(format!("user not found by {}", what)))?;

        // 索引存在但主记录缺失：按未找到处理
        self.get_json(&KvKey::user(&id))?
            .ok_or_else(|| DriplnkError::not_found(format!("user not found by {} (id={})", what, id)))
    }
}

#[async_trait::async_trait]
impl UserRepository for KvStorage {
    async fn save(&self, user: &User) -> Result<()> {
        let email_key = KvKey::user_email(&user.email);
        let handle_key = KvKey::user_handle(&user.handle);

        {
            let _guard = self.write_lock.lock();

            self.ensure_unique(&email_key, &user.id, "email")?;
            self.ensure_unique(&handle_key, &user.id, "handle")?;

            let previous: Option<User> = self.get_json(&KvKey::user(&user.id))?;

            let mut batch = sled::Batch::default();
            batch.insert(KvKey::user(&user.id).encode(), to_json(user)?);
            batch.insert(email_key.encode(), user.id.as_bytes());
            batch.insert(handle_key.encode(), user.id.as_bytes());

            // email / handle 变更时，旧索引在同一批次内删除
            if let Some(prev) = previous {
                if prev.email != user.email {
                    batch.remove(KvKey::user_email(&prev.email).encode());
                }
                if prev.handle != user.handle {
                    batch.remove(KvKey::user_handle(&prev.handle).encode());
                }
            }

            self.apply(batch)
                .map_err(|e| e.with_context(format!("user save (id={})", user.id)))?;
        }

        self.sync().await?;
        debug!("User saved: {}", user.id);
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<User> {
        self.get_json(&KvKey::user(id))?
            .ok_or_else(|| DriplnkError::not_found(format!("user not found (id={})", id)))
    }

    async fn get_by_email(&self, email: &str) -> Result<User> {
        self.lookup_by_index(&KvKey::user_email(email), "email")
    }

    async fn get_by_handle(&self, handle: &str) -> Result<User> {
        self.lookup_by_index(&KvKey::user_handle(handle), "handle")
    }

    async fn list_all(&self) -> Result<Vec<User>> {
        let mut users = Vec::new();
        for key in self.scan_keys(&keys::prefix::users())? {
            // `user:` 前缀下还有 email / handle / links 索引，只取主记录
            if let KvKey::User { id } = key
                && let Some(user) = self.get_json::<User>(&KvKey::user(&id))?
            {
                users.push(user);
            }
        }
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn open_temp() -> (KvStorage, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = KvStorage::open(dir.path().join("kv"), false).unwrap();
        (storage, dir)
    }

    #[tokio::test]
    async fn test_handle_change_releases_old_index() {
        let (storage, _dir) = open_temp();
        let mut user = User::new("u1", "a@x.com", "alice");
        UserRepository::save(&storage, &user).await.unwrap();

        user.handle = "alice2".into();
        user.updated_at = Utc::now();
        UserRepository::save(&storage, &user).await.unwrap();

        assert!(storage.get_by_handle("alice").await.unwrap_err().is_not_found());
        assert_eq!(storage.get_by_handle("alice2").await.unwrap().id, "u1");

        // 旧 handle 可以被其他用户使用
        let other = User::new("u2", "b@y.com", "alice");
        UserRepository::save(&storage, &other).await.unwrap();
    }

    #[tokio::test]
    async fn test_orphaned_unique_index_does_not_block() {
        let (storage, _dir) = open_temp();
        storage
            .db
            .insert(KvKey::user_handle("ghost").encode(), "missing-user".as_bytes())
            .unwrap();

        let user = User::new("u1", "a@x.com", "ghost");
        UserRepository::save(&storage, &user).await.unwrap();
        assert_eq!(storage.get_by_handle("ghost").await.unwrap().id, "u1");
    }
}
