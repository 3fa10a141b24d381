use std::borrow::Cow;

use tracing::debug;

use super::{KvKey, KvStorage, keys, to_json};
use crate::domain::{AnalyticsEvent, AnalyticsSummary};
use crate::errors::Result;
use crate::repository::AnalyticsRepository;

#[async_trait::async_trait]
impl AnalyticsRepository for KvStorage {
    async fn save_event(&self, event: &AnalyticsEvent) -> Result<()> {
        let event: Cow<'_, AnalyticsEvent> = if event.id.is_empty() {
            let mut owned = event.clone();
            owned.id = uuid::Uuid::new_v4().to_string();
            Cow::Owned(owned)
        } else {
            Cow::Borrowed(event)
        };

        let mut batch = sled::Batch::default();
        batch.insert(KvKey::event(&event.id).encode(), to_json(event.as_ref())?);
        if let Some(user_id) = &event.user_id {
            batch.insert(KvKey::user_event(user_id, &event.id).encode(), Vec::new());
        }
        if let Some(link_id) = &event.link_id {
            batch.insert(KvKey::link_event(link_id, &event.id).encode(), Vec::new());
        }

        self.commit(batch)
            .await
            .map_err(|e| e.with_context(format!("analytics event save (id={})", event.id)))
    }

    /// 全量扫描用户（或链接）索引并在内存中累加，O(事件数)。
    /// 这是 KV 后端的扩展上限：没有预聚合。
    async fn get_summary(&self, user_id: &str, link_id: Option<&str>) -> Result<AnalyticsSummary> {
        let prefix = match link_id {
            Some(link_id) => keys::prefix::link_events(link_id),
            None => keys::prefix::user_events(user_id),
        };

        let mut summary = AnalyticsSummary::default();
        let mut scanned = 0usize;
        for key in self.scan_keys(&prefix)? {
            let event_id = match key {
                KvKey::UserEvent { event_id, .. } | KvKey::LinkEvent { event_id, .. } => event_id,
                _ => continue,
            };
            let Some(event) = self.get_json::<AnalyticsEvent>(&KvKey::event(&event_id))? else {
                debug!("Skipping orphaned analytics index entry {}", event_id);
                continue;
            };

            // 通过链接索引扫描时，只统计属于该用户的事件
            if link_id.is_some() && event.user_id.as_deref() != Some(user_id) {
                continue;
            }

            summary.accumulate(&event);
            scanned += 1;
        }

        debug!(
            "Analytics summary for user {} (link={:?}) scanned {} events",
            user_id, link_id, scanned
        );
        Ok(summary)
    }
}
