//! Initial schema migration.
//!
//! Creates the ledger side of the system:
//!
//! - `customers`: buyers with a cached running balance
//! - `trucks`: vehicles sales and loads are attributed to
//! - `invoices`: append-only sale records with balance snapshots
//! - `payments`: append-only collection records
//! - `truck_loads`: per-day product loads per truck

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Customers {
    Table,
    Id,
    Name,
    Balance,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum Trucks {
    Table,
    Id,
    Plate,
    Name,
    CreatedAt,
}

#[derive(Iden)]
enum Invoices {
    Table,
    Id,
    Number,
    CustomerId,
    TruckId,
    IssuedOn,
    GrossWeight,
    TareWeight,
    NetWeight,
    UnitPrice,
    DiscountPercentage,
    Total,
    FinalAmount,
    PreviousBalance,
    CurrentBalance,
    CreatedAt,
}

#[derive(Iden)]
enum Payments {
    Table,
    Id,
    CustomerId,
    InvoiceId,
    Amount,
    Method,
    ReceivedAt,
}

#[derive(Iden)]
enum TruckLoads {
    Table,
    Id,
    TruckId,
    LoadDate,
    TotalWeight,
    CageCount,
    Status,
    Notes,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Customers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Customers::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Customers::Name).string().not_null())
                    .col(ColumnDef::new(Customers::Balance).double().not_null())
                    .col(ColumnDef::new(Customers::Version).big_integer().not_null())
                    .col(ColumnDef::new(Customers::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Customers::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Trucks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Trucks::Id).string().not_null().primary_key())
                    .col(
                        ColumnDef::new(Trucks::Plate)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Trucks::Name).string().not_null())
                    .col(ColumnDef::new(Trucks::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Invoices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Invoices::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Invoices::Number).string().not_null())
                    .col(ColumnDef::new(Invoices::CustomerId).string().not_null())
                    .col(ColumnDef::new(Invoices::TruckId).string().not_null())
                    .col(ColumnDef::new(Invoices::IssuedOn).date().not_null())
                    .col(ColumnDef::new(Invoices::GrossWeight).double().not_null())
                    .col(ColumnDef::new(Invoices::TareWeight).double().not_null())
                    .col(ColumnDef::new(Invoices::NetWeight).double().not_null())
                    .col(ColumnDef::new(Invoices::UnitPrice).double().not_null())
                    .col(
                        ColumnDef::new(Invoices::DiscountPercentage)
                            .double()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Invoices::Total).double().not_null())
                    .col(ColumnDef::new(Invoices::FinalAmount).double().not_null())
                    .col(
                        ColumnDef::new(Invoices::PreviousBalance)
                            .double()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Invoices::CurrentBalance).double().not_null())
                    .col(ColumnDef::new(Invoices::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-invoices-customer_id")
                            .from(Invoices::Table, Invoices::CustomerId)
                            .to(Customers::Table, Customers::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-invoices-truck_id")
                            .from(Invoices::Table, Invoices::TruckId)
                            .to(Trucks::Table, Trucks::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Invoice numbers are allocated by the engine; the unique index is the
        // collision backstop for concurrent allocators.
        manager
            .create_index(
                Index::create()
                    .name("idx-invoices-number")
                    .table(Invoices::Table)
                    .col(Invoices::Number)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-invoices-customer_id-created_at")
                    .table(Invoices::Table)
                    .col(Invoices::CustomerId)
                    .col(Invoices::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-invoices-truck_id-issued_on")
                    .table(Invoices::Table)
                    .col(Invoices::TruckId)
                    .col(Invoices::IssuedOn)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Payments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Payments::CustomerId).string().not_null())
                    .col(ColumnDef::new(Payments::InvoiceId).string())
                    .col(ColumnDef::new(Payments::Amount).double().not_null())
                    .col(ColumnDef::new(Payments::Method).string().not_null())
                    .col(ColumnDef::new(Payments::ReceivedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-payments-customer_id")
                            .from(Payments::Table, Payments::CustomerId)
                            .to(Customers::Table, Customers::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-payments-invoice_id")
                            .from(Payments::Table, Payments::InvoiceId)
                            .to(Invoices::Table, Invoices::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-payments-customer_id-received_at")
                    .table(Payments::Table)
                    .col(Payments::CustomerId)
                    .col(Payments::ReceivedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TruckLoads::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TruckLoads::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TruckLoads::TruckId).string().not_null())
                    .col(ColumnDef::new(TruckLoads::LoadDate).date().not_null())
                    .col(ColumnDef::new(TruckLoads::TotalWeight).double().not_null())
                    .col(ColumnDef::new(TruckLoads::CageCount).integer().not_null())
                    .col(ColumnDef::new(TruckLoads::Status).string().not_null())
                    .col(ColumnDef::new(TruckLoads::Notes).string())
                    .col(ColumnDef::new(TruckLoads::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-truck_loads-truck_id")
                            .from(TruckLoads::Table, TruckLoads::TruckId)
                            .to(Trucks::Table, Trucks::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-truck_loads-truck_id-load_date")
                    .table(TruckLoads::Table)
                    .col(TruckLoads::TruckId)
                    .col(TruckLoads::LoadDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TruckLoads::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Invoices::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Trucks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Customers::Table).to_owned())
            .await?;
        Ok(())
    }
}
