//! Orphaned index detection and repair.
//!
//! Scans skip index entries whose main record is missing. This pass makes
//! them visible: it walks every index family, checks that each entry still
//! points at a record that agrees with it, and can delete the ones that don't.

use tracing::{info, warn};

use super::{KvKey, KvStorage, keys};
use crate::domain::{AnalyticsEvent, Link, User};
use crate::errors::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// 检查过的索引条目数
    pub scanned: usize,
    /// 孤儿索引 key（可读形式）
    pub orphans: Vec<String>,
    /// 是否已删除孤儿条目
    pub repaired: bool,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.orphans.is_empty()
    }
}

impl KvStorage {
    pub async fn check_consistency(&self, repair: bool) -> Result<ConsistencyReport> {
        let mut report = ConsistencyReport::default();
        let mut orphan_keys: Vec<KvKey> = Vec::new();

        {
            let _guard = self.write_lock.lock();

            let families = [
                keys::prefix::user_emails(),
                keys::prefix::user_handles(),
                keys::prefix::all_user_links(),
                keys::prefix::all_user_events(),
                keys::prefix::all_link_events(),
            ];

            for prefix in families {
                for key in self.scan_keys(&prefix)? {
                    report.scanned += 1;
                    if !self.index_entry_is_live(&key)? {
                        orphan_keys.push(key);
                    }
                }
            }

            report.orphans = orphan_keys
                .iter()
                .map(|k| String::from_utf8_lossy(&k.encode()).into_owned())
                .collect();

            if repair && !orphan_keys.is_empty() {
                let mut batch = sled::Batch::default();
                for key in &orphan_keys {
                    batch.remove(key.encode());
                }
                self.apply(batch)?;
                report.repaired = true;
            }
        }

        if report.repaired {
            self.sync().await?;
            warn!("Removed {} orphaned index entries", report.orphans.len());
        }
        info!(
            "Consistency check: {} index entries scanned, {} orphaned",
            report.scanned,
            report.orphans.len()
        );
        Ok(report)
    }

    fn index_entry_is_live(&self, key: &KvKey) -> Result<bool> {
        let live = match key {
            KvKey::UserEmail { email } => match self.get_index_target(key)? {
                Some(id) => self
                    .get_json::<User>(&KvKey::user(&id))?
                    .is_some_and(|u| &u.email == email),
                None => false,
            },
            KvKey::UserHandle { handle } => match self.get_index_target(key)? {
                Some(id) => self
                    .get_json::<User>(&KvKey::user(&id))?
                    .is_some_and(|u| &u.handle == handle),
                None => false,
            },
            KvKey::UserLink { user_id, link_id } => self
                .get_json::<Link>(&KvKey::link(link_id))?
                .is_some_and(|l| &l.user_id == user_id),
            KvKey::UserEvent { user_id, event_id } => self
                .get_json::<AnalyticsEvent>(&KvKey::event(event_id))?
                .is_some_and(|e| e.user_id.as_deref() == Some(user_id.as_str())),
            KvKey::LinkEvent { link_id, event_id } => self
                .get_json::<AnalyticsEvent>(&KvKey::event(event_id))?
                .is_some_and(|e| e.link_id.as_deref() == Some(link_id.as_str())),
            // 主记录不是索引
            KvKey::User { .. } | KvKey::Link { .. } | KvKey::Event { .. } => true,
        };
        Ok(live)
    }
}
