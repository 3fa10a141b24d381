//! Analytics 事件写入与聚合查询
//!
//! 汇总在数据库端完成：按 event_type、国家、设备类型分别 GROUP BY。
//! `meta` 是 JSON 文本列，各后端的 JSON 取值语法不同。

use std::str::FromStr;

use sea_orm::{
    ColumnTrait, DbBackend, EntityTrait, FromQueryResult, QueryFilter, QuerySelect, Select,
    sea_query::Expr,
};
use tracing::{debug, warn};

use super::SeaOrmStorage;
use crate::domain::{AnalyticsEvent, AnalyticsSummary, EventType};
use crate::errors::{DriplnkError, Result};
use crate::repository::AnalyticsRepository;

use migration::entities::analytics_event;

#[derive(Debug, FromQueryResult)]
struct EventTypeRow {
    event_type: String,
    count: i64,
}

#[derive(Debug, FromQueryResult)]
struct LabelRow {
    label: Option<String>,
    count: i64,
}

/// `meta` 中某个键的取值表达式
fn meta_value_sql(backend: DbBackend, key: &str) -> String {
    match backend {
        DbBackend::Postgres => format!("(meta::jsonb ->> '{}')", key),
        DbBackend::MySql => format!("JSON_UNQUOTE(JSON_EXTRACT(meta, '$.{}'))", key),
        _ => format!("json_extract(meta, '$.{}')", key),
    }
}

/// country 列为空时回退到 meta.country
fn country_sql(backend: DbBackend) -> String {
    format!(
        "CASE WHEN country <> '' THEN country ELSE {} END",
        meta_value_sql(backend, AnalyticsEvent::META_COUNTRY)
    )
}

impl SeaOrmStorage {
    fn scoped_events(&self, user_id: &str, link_id: Option<&str>) -> Select<analytics_event::Entity> {
        let mut query = analytics_event::Entity::find()
            .select_only()
            .filter(analytics_event::Column::UserId.eq(user_id));
        if let Some(link_id) = link_id {
            query = query.filter(analytics_event::Column::LinkId.eq(link_id));
        }
        query
    }

    async fn count_by_label(
        &self,
        user_id: &str,
        link_id: Option<&str>,
        label_sql: String,
    ) -> Result<Vec<(String, i64)>> {
        let rows = self
            .scoped_events(user_id, link_id)
            .column_as(Expr::cust(label_sql.clone()), "label")
            .column_as(analytics_event::Column::Id.count(), "count")
            .group_by(Expr::cust(label_sql))
            .into_model::<LabelRow>()
            .all(&self.db)
            .await
            .map_err(|e| DriplnkError::from(e).with_context(format!("analytics summary (user={})", user_id)))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match row.label {
                Some(label) if !label.is_empty() => Some((label, row.count)),
                _ => None,
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl AnalyticsRepository for SeaOrmStorage {
    async fn save_event(&self, event: &AnalyticsEvent) -> Result<()> {
        self.insert_event(event).await
    }

    async fn get_summary(&self, user_id: &str, link_id: Option<&str>) -> Result<AnalyticsSummary> {
        let backend = self.db_backend();
        let mut summary = AnalyticsSummary::default();

        let totals = self
            .scoped_events(user_id, link_id)
            .column(analytics_event::Column::EventType)
            .column_as(analytics_event::Column::Id.count(), "count")
            .group_by(analytics_event::Column::EventType)
            .into_model::<EventTypeRow>()
            .all(&self.db)
            .await
            .map_err(|e| DriplnkError::from(e).with_context(format!("analytics summary (user={})", user_id)))?;

        for row in totals {
            match EventType::from_str(&row.event_type) {
                Ok(EventType::View) => summary.total_views += row.count,
                Ok(EventType::Click) => summary.total_clicks += row.count,
                Ok(EventType::Scroll) => {}
                Err(_) => warn!("Ignoring unknown event_type '{}' in summary", row.event_type),
            }
        }

        summary.by_country = self
            .count_by_label(user_id, link_id, country_sql(backend))
            .await?
            .into_iter()
            .collect();
        summary.by_device = self
            .count_by_label(
                user_id,
                link_id,
                meta_value_sql(backend, AnalyticsEvent::META_DEVICE_TYPE),
            )
            .await?
            .into_iter()
            .collect();

        debug!(
            "Analytics summary for user {} (link={:?}): {} views, {} clicks",
            user_id, link_id, summary.total_views, summary.total_clicks
        );
        Ok(summary)
    }
}
