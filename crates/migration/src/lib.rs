pub use sea_orm_migration::prelude::*;

mod m20260312_090000_init;
mod m20260405_110000_reconciliations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260312_090000_init::Migration),
            Box::new(m20260405_110000_reconciliations::Migration),
        ]
    }
}
