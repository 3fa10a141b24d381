use sea_orm_migration::prelude::*;

use crate::m20260301_000001_users_table::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Link::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Link::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Link::UserId).string().not_null())
                    .col(ColumnDef::new(Link::Title).string().not_null())
                    .col(ColumnDef::new(Link::Url).text().not_null())
                    .col(
                        ColumnDef::new(Link::LinkType)
                            .string()
                            .not_null()
                            .default("standard"),
                    )
                    .col(
                        ColumnDef::new(Link::LinkOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Link::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Link::Metadata).text().not_null())
                    .col(
                        ColumnDef::new(Link::ClickCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Link::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Link::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_links_user_id")
                            .from(Link::Table, Link::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ListByUser: WHERE user_id = ? ORDER BY link_order
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_links_user_order")
                    .table(Link::Table)
                    .col(Link::UserId)
                    .col(Link::LinkOrder)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Link::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Link {
    #[sea_orm(iden = "links")]
    Table,
    Id,
    UserId,
    Title,
    Url,
    LinkType,
    LinkOrder,
    IsActive,
    Metadata,
    ClickCount,
    CreatedAt,
    UpdatedAt,
}
