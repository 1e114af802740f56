//! Adds end-of-day reconciliation records and the per-date invoice
//! sequence counters.

use sea_orm_migration::prelude::*;

use crate::m20260312_090000_init::Trucks;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum DailyReconciliations {
    Table,
    Id,
    TruckId,
    ReconDate,
    LoadWeight,
    SoldWeight,
    WastageWeight,
    WastagePercentage,
    Status,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum InvoiceSequences {
    Table,
    Prefix,
    LastSeq,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DailyReconciliations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DailyReconciliations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DailyReconciliations::TruckId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DailyReconciliations::ReconDate)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DailyReconciliations::LoadWeight)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DailyReconciliations::SoldWeight)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DailyReconciliations::WastageWeight)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DailyReconciliations::WastagePercentage)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DailyReconciliations::Status)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DailyReconciliations::Notes).string())
                    .col(
                        ColumnDef::new(DailyReconciliations::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DailyReconciliations::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-daily_reconciliations-truck_id")
                            .from(DailyReconciliations::Table, DailyReconciliations::TruckId)
                            .to(Trucks::Table, Trucks::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // One reconciliation per truck per day.
        manager
            .create_index(
                Index::create()
                    .name("idx-daily_reconciliations-truck_id-recon_date")
                    .table(DailyReconciliations::Table)
                    .col(DailyReconciliations::TruckId)
                    .col(DailyReconciliations::ReconDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-daily_reconciliations-recon_date")
                    .table(DailyReconciliations::Table)
                    .col(DailyReconciliations::ReconDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InvoiceSequences::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InvoiceSequences::Prefix)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(InvoiceSequences::LastSeq)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InvoiceSequences::Table).to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(DailyReconciliations::Table)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
