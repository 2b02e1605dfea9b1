//! Migration to create the provider_analytics rollup table.
//!
//! Rows here are advisory snapshots; authoritative aggregates are computed
//! from bookings and reviews on read.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProviderAnalytics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProviderAnalytics::ProviderId)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProviderAnalytics::TotalServices)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ProviderAnalytics::AverageRating).double().null())
                    .col(
                        ColumnDef::new(ProviderAnalytics::TotalBookings)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ProviderAnalytics::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_provider_analytics_provider_id")
                            .from(ProviderAnalytics::Table, ProviderAnalytics::ProviderId)
                            .to(Providers::Table, Providers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProviderAnalytics::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProviderAnalytics {
    Table,
    ProviderId,
    TotalServices,
    AverageRating,
    TotalBookings,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Providers {
    Table,
    Id,
}
