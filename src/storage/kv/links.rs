use chrono::Utc;
use tracing::{debug, warn};

use super::{KvKey, KvStorage, keys, to_json};
use crate::domain::Link;
use crate::errors::{DriplnkError, Result};
use crate::repository::LinkRepository;

#[async_trait::async_trait]
impl LinkRepository for KvStorage {
    async fn save(&self, link: &Link) -> Result<()> {
        {
            let _guard = self.write_lock.lock();

            if self.get_raw(&KvKey::user(&link.user_id))?.is_none() {
                return Err(DriplnkError::not_found(format!(
                    "link save (id={}): owner user not found (user={})",
                    link.id, link.user_id
                )));
            }

            let previous: Option<Link> = self.get_json(&KvKey::link(&link.id))?;

            let mut batch = sled::Batch::default();
            batch.insert(KvKey::link(&link.id).encode(), to_json(link)?);
            batch.insert(KvKey::user_link(&link.user_id, &link.id).encode(), Vec::new());

            // 所有者变更：把归属索引迁移到新用户下
            if let Some(prev) = previous
                && prev.user_id != link.user_id
            {
                batch.remove(KvKey::user_link(&prev.user_id, &link.id).encode());
            }

            self.apply(batch)
                .map_err(|e| e.with_context(format!("link save (id={})", link.id)))?;
        }

        self.sync().await?;
        debug!("Link saved: {} (user={})", link.id, link.user_id);
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Link> {
        self.get_json(&KvKey::link(id))?
            .ok_or_else(|| DriplnkError::not_found(format!("link not found (id={})", id)))
    }

    /// 扫描归属索引后按 `order` 重新排序（索引 key 不含排序信息）
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Link>> {
        let mut links = Vec::new();
        for key in self.scan_keys(&keys::prefix::user_links(user_id))? {
            let KvKey::UserLink { link_id, .. } = key else {
                continue;
            };
            match self.get_json::<Link>(&KvKey::link(&link_id))? {
                Some(link) if link.user_id == user_id => links.push(link),
                Some(_) => debug!("Skipping stale owner index {} -> {}", user_id, link_id),
                None => debug!("Skipping orphaned owner index {} -> {}", user_id, link_id),
            }
        }
        links.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        Ok(links)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        {
            let _guard = self.write_lock.lock();

            let link: Link = self
                .get_json(&KvKey::link(id))?
                .ok_or_else(|| DriplnkError::not_found(format!("link not found (id={})", id)))?;

            let mut batch = sled::Batch::default();
            batch.remove(KvKey::link(id).encode());
            batch.remove(KvKey::user_link(&link.user_id, id).encode());
            self.apply(batch)
                .map_err(|e| e.with_context(format!("link delete (id={})", id)))?;
        }

        self.sync().await?;
        debug!("Link deleted: {}", id);
        Ok(())
    }

    async fn reorder(&self, user_id: &str, ordered_ids: &[String]) -> Result<()> {
        let mut updated = 0usize;
        {
            let _guard = self.write_lock.lock();
            let now = Utc::now();

            let mut batch = sled::Batch::default();
            for (position, id) in ordered_ids.iter().enumerate() {
                let Some(mut link) = self.get_json::<Link>(&KvKey::link(id))? else {
                    debug!("Reorder skipped missing link {}", id);
                    continue;
                };
                if link.user_id != user_id {
                    warn!("Reorder skipped link {} not owned by {}", id, user_id);
                    continue;
                }
                link.order = i32::try_from(position).map_err(|_| {
                    DriplnkError::validation(format!("reorder list too long: {}", ordered_ids.len()))
                })?;
                link.updated_at = now;
                batch.insert(KvKey::link(id).encode(), to_json(&link)?);
                updated += 1;
            }

            self.apply(batch)
                .map_err(|e| e.with_context(format!("link reorder (user={})", user_id)))?;
        }

        self.sync().await?;
        debug!(
            "Reordered {}/{} links for user {}",
            updated,
            ordered_ids.len(),
            user_id
        );
        Ok(())
    }
}
