use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 追加写入的事件日志，没有外键：链接删除后事件仍然保留
        manager
            .create_table(
                Table::create()
                    .table(AnalyticsEvent::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AnalyticsEvent::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AnalyticsEvent::EventType).string().not_null())
                    .col(ColumnDef::new(AnalyticsEvent::LinkId).string().null())
                    .col(ColumnDef::new(AnalyticsEvent::UserId).string().null())
                    .col(
                        ColumnDef::new(AnalyticsEvent::VisitorId)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(AnalyticsEvent::Country)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(AnalyticsEvent::Region)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(AnalyticsEvent::Meta).text().not_null())
                    .col(
                        ColumnDef::new(AnalyticsEvent::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(AnalyticsEvent::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum AnalyticsEvent {
    #[sea_orm(iden = "analytics_events")]
    Table,
    Id,
    EventType,
    LinkId,
    UserId,
    VisitorId,
    Country,
    Region,
    Meta,
    CreatedAt,
}
