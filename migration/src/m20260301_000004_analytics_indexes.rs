use sea_orm_migration::prelude::*;

use crate::m20260301_000003_analytics_events::AnalyticsEvent;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // GetSummary(user) 按 user_id 过滤
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_analytics_events_user")
                    .table(AnalyticsEvent::Table)
                    .col(AnalyticsEvent::UserId)
                    .col(AnalyticsEvent::EventType)
                    .to_owned(),
            )
            .await?;

        // GetSummary(user, link) 按 link_id 过滤
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_analytics_events_link")
                    .table(AnalyticsEvent::Table)
                    .col(AnalyticsEvent::LinkId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_analytics_events_link")
                    .table(AnalyticsEvent::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_analytics_events_user")
                    .table(AnalyticsEvent::Table)
                    .to_owned(),
            )
            .await
    }
}
