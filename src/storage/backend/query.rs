//! Read operations for SeaOrmStorage, plus the user/link port impls

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::debug;

use super::SeaOrmStorage;
use super::converters::{model_to_link, model_to_user};
use super::retry;
use crate::domain::{Link, User};
use crate::errors::{DriplnkError, Result};
use crate::repository::{LinkRepository, UserRepository};

use migration::entities::{link, user};

impl SeaOrmStorage {
    async fn find_user_by(&self, column: user::Column, value: &str) -> Result<User> {
        let db = &self.db;
        let label = format!("{:?}", column).to_lowercase();

        let model = retry::with_retry(&format!("find_user({}={})", label, value), self.retry_config, || async {
            user::Entity::find().filter(column.eq(value)).one(db).await
        })
        .await
        .map_err(|e| DriplnkError::from(e).with_context(format!("user lookup ({}={})", label, value)))?;

        match model {
            Some(model) => model_to_user(model),
            None => Err(DriplnkError::not_found(format!("用户不存在: {}={}", label, value))),
        }
    }

    pub(super) async fn find_link(&self, id: &str) -> Result<Link> {
        let db = &self.db;

        let model = retry::with_retry(&format!("find_link({})", id), self.retry_config, || async {
            link::Entity::find_by_id(id).one(db).await
        })
        .await
        .map_err(|e| DriplnkError::from(e).with_context(format!("link lookup (id={})", id)))?;

        match model {
            Some(model) => model_to_link(model),
            None => Err(DriplnkError::not_found(format!("链接不存在: {}", id))),
        }
    }

    async fn load_users(&self) -> Result<Vec<User>> {
        let models = user::Entity::find()
            .order_by_asc(user::Column::CreatedAt)
            .order_by_asc(user::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| DriplnkError::from(e).with_context("user list"))?;

        debug!("Loaded {} users", models.len());
        models.into_iter().map(model_to_user).collect()
    }

    async fn load_user_links(&self, user_id: &str) -> Result<Vec<Link>> {
        let db = &self.db;

        let models = retry::with_retry(&format!("list_links({})", user_id), self.retry_config, || async {
            link::Entity::find()
                .filter(link::Column::UserId.eq(user_id))
                .order_by_asc(link::Column::LinkOrder)
                .order_by_asc(link::Column::Id)
                .all(db)
                .await
        })
        .await
        .map_err(|e| DriplnkError::from(e).with_context(format!("link list (user={})", user_id)))?;

        models.into_iter().map(model_to_link).collect()
    }
}

#[async_trait::async_trait]
impl UserRepository for SeaOrmStorage {
    async fn save(&self, user: &User) -> Result<()> {
        self.upsert_user(user).await
    }

    async fn get_by_id(&self, id: &str) -> Result<User> {
        self.find_user_by(user::Column::Id, id).await
    }

    async fn get_by_email(&self, email: &str) -> Result<User> {
        self.find_user_by(user::Column::Email, email).await
    }

    async fn get_by_handle(&self, handle: &str) -> Result<User> {
        self.find_user_by(user::Column::Handle, handle).await
    }

    async fn list_all(&self) -> Result<Vec<User>> {
        self.load_users().await
    }
}

#[async_trait::async_trait]
impl LinkRepository for SeaOrmStorage {
    async fn save(&self, link: &Link) -> Result<()> {
        self.upsert_link(link).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Link> {
        self.find_link(id).await
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Link>> {
        self.load_user_links(user_id).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.delete_link(id).await
    }

    async fn reorder(&self, user_id: &str, ordered_ids: &[String]) -> Result<()> {
        self.reorder_links(user_id, ordered_ids).await
    }
}
