//! Delete and reorder for SeaOrmStorage

use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, TransactionTrait, sea_query::Expr};
use tracing::{debug, info, warn};

use super::SeaOrmStorage;
use super::retry;
use crate::errors::{DriplnkError, Result};

use migration::entities::link;

impl SeaOrmStorage {
    pub(super) async fn delete_link(&self, id: &str) -> Result<()> {
        let db = &self.db;

        let result = retry::with_retry(&format!("delete_link({})", id), self.retry_config, || async {
            link::Entity::delete_by_id(id).exec(db).await
        })
        .await
        .map_err(|e| DriplnkError::from(e).with_context(format!("link delete (id={})", id)))?;

        if result.rows_affected == 0 {
            return Err(DriplnkError::not_found(format!("链接不存在: {}", id)));
        }

        info!("Link deleted: {}", id);
        Ok(())
    }

    /// 单个事务内逐条更新；不属于该用户的 id 更新 0 行，直接跳过
    pub(super) async fn reorder_links(&self, user_id: &str, ordered_ids: &[String]) -> Result<()> {
        let context = || format!("link reorder (user={})", user_id);
        let now = Utc::now();

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| DriplnkError::from(e).with_context(context()))?;

        let mut updated = 0usize;
        for (position, id) in ordered_ids.iter().enumerate() {
            let order = i32::try_from(position)
                .map_err(|_| DriplnkError::validation(format!("排序位置超出范围: {}", position)))?;

            let result = link::Entity::update_many()
                .col_expr(link::Column::LinkOrder, Expr::value(order))
                .col_expr(link::Column::UpdatedAt, Expr::value(now))
                .filter(link::Column::Id.eq(id.as_str()))
                .filter(link::Column::UserId.eq(user_id))
                .exec(&txn)
                .await
                .map_err(|e| DriplnkError::from(e).with_context(context()))?;

            if result.rows_affected == 0 {
                warn!("Reorder skipped link {}: not found or not owned by {}", id, user_id);
                continue;
            }
            updated += 1;
        }

        txn.commit()
            .await
            .map_err(|e| DriplnkError::from(e).with_context(context()))?;

        debug!(
            "Reordered {}/{} links for user {}",
            updated,
            ordered_ids.len(),
            user_id
        );
        Ok(())
    }
}
