pub use sea_orm_migration::prelude::*;

pub mod entities;
mod m20260301_000001_users_table;
mod m20260301_000002_links_table;
mod m20260301_000003_analytics_events;
mod m20260301_000004_analytics_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_users_table::Migration),
            Box::new(m20260301_000002_links_table::Migration),
            Box::new(m20260301_000003_analytics_events::Migration),
            Box::new(m20260301_000004_analytics_indexes::Migration),
        ]
    }
}
