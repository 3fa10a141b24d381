//! Upsert / insert statements
//!
//! `Save` is an upsert on the primary key: insert, and on conflict overwrite
//! every mutable column. `created_at` is kept from the first insert.

use sea_orm::{
    ColumnTrait, Condition, DbBackend, EntityTrait, QueryFilter, TransactionTrait, sea_query::OnConflict,
};
use tracing::debug;

use super::SeaOrmStorage;
use super::converters::{event_to_active_model, link_to_active_model, user_to_active_model};
use super::retry;
use crate::domain::{AnalyticsEvent, Link, User};
use crate::errors::{DriplnkError, Result};

use migration::entities::{analytics_event, link, user};

impl SeaOrmStorage {
    pub(super) async fn upsert_user(&self, user: &User) -> Result<()> {
        // MySQL 的 ON DUPLICATE KEY UPDATE 会命中任意唯一索引，需先确认 email/handle 未被他人占用
        if self.db_backend() == DbBackend::MySql {
            return self.upsert_user_checked(user).await;
        }

        let model = user_to_active_model(user)?;
        let db = &self.db;
        retry::with_retry(&format!("upsert_user({})", user.id), self.retry_config, || async {
            user::Entity::insert(model.clone())
                .on_conflict(user_on_conflict())
                .exec(db)
                .await
                .map(|_| ())
        })
        .await
        .map_err(|e| DriplnkError::from(e).with_context(format!("user save (id={})", user.id)))?;

        debug!("User upserted: {}", user.id);
        Ok(())
    }

    async fn upsert_user_checked(&self, user: &User) -> Result<()> {
        let context = || format!("user save (id={})", user.id);
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| DriplnkError::from(e).with_context(context()))?;

        let taken = user::Entity::find()
            .filter(user::Column::Id.ne(user.id.as_str()))
            .filter(
                Condition::any()
                    .add(user::Column::Email.eq(user.email.as_str()))
                    .add(user::Column::Handle.eq(user.handle.as_str())),
            )
            .one(&txn)
            .await
            .map_err(|e| DriplnkError::from(e).with_context(context()))?;
        if let Some(other) = taken {
            return Err(DriplnkError::conflict(format!(
                "{}: email 或 handle 已被用户 {} 占用",
                context(),
                other.id
            )));
        }

        user::Entity::insert(user_to_active_model(user)?)
            .on_conflict(user_on_conflict())
            .exec(&txn)
            .await
            .map_err(|e| DriplnkError::from(e).with_context(context()))?;

        txn.commit()
            .await
            .map_err(|e| DriplnkError::from(e).with_context(context()))?;
        debug!("User upserted: {}", user.id);
        Ok(())
    }

    pub(super) async fn upsert_link(&self, link: &Link) -> Result<()> {
        let model = link_to_active_model(link)?;
        let db = &self.db;

        retry::with_retry(&format!("upsert_link({})", link.id), self.retry_config, || async {
            link::Entity::insert(model.clone())
                .on_conflict(
                    OnConflict::column(link::Column::Id)
                        .update_columns([
                            link::Column::UserId,
                            link::Column::Title,
                            link::Column::Url,
                            link::Column::LinkType,
                            link::Column::LinkOrder,
                            link::Column::IsActive,
                            link::Column::Metadata,
                            link::Column::ClickCount,
                            link::Column::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .exec(db)
                .await
                .map(|_| ())
        })
        .await
        .map_err(|e| DriplnkError::from(e).with_context(format!("link save (id={})", link.id)))?;

        debug!("Link upserted: {} (user={})", link.id, link.user_id);
        Ok(())
    }

    /// 事件只追加；id 为空时分配 UUID
    pub(super) async fn insert_event(&self, event: &AnalyticsEvent) -> Result<()> {
        let mut model = event_to_active_model(event)?;
        if event.id.is_empty() {
            model.id = sea_orm::ActiveValue::Set(uuid::Uuid::new_v4().to_string());
        }
        let db = &self.db;

        retry::with_retry("insert_event", self.retry_config, || async {
            analytics_event::Entity::insert(model.clone())
                .exec_without_returning(db)
                .await
                .map(|_| ())
        })
        .await
        .map_err(|e| DriplnkError::from(e).with_context("analytics event save"))
    }
}

fn user_on_conflict() -> OnConflict {
    OnConflict::column(user::Column::Id)
        .update_columns([
            user::Column::Email,
            user::Column::Handle,
            user::Column::Title,
            user::Column::Description,
            user::Column::AvatarUrl,
            user::Column::SeoMeta,
            user::Column::Theme,
            user::Column::UpdatedAt,
        ])
        .to_owned()
}
