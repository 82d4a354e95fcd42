pub use sea_orm_migration::prelude::*;

mod m20260101_000001_ledger;
mod m20260102_000001_bulk_transfers;
mod m20260103_000001_notifications;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_ledger::Migration),
            Box::new(m20260102_000001_bulk_transfers::Migration),
            Box::new(m20260103_000001_notifications::Migration),
        ]
    }
}
