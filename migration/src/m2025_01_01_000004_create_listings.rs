//! Migration to create the listings table.
//!
//! Listings belong to a provider and optionally to a category. Removing a
//! category detaches its listings instead of deleting them.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Listings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Listings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Listings::ProviderId).integer().not_null())
                    .col(ColumnDef::new(Listings::CategoryId).integer().null())
                    .col(ColumnDef::new(Listings::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Listings::Description).text().null())
                    .col(ColumnDef::new(Listings::Price).double().not_null())
                    .col(
                        ColumnDef::new(Listings::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Listings::ImageUrl).text().null())
                    .col(ColumnDef::new(Listings::Location).text().null())
                    .col(ColumnDef::new(Listings::Latitude).double().null())
                    .col(ColumnDef::new(Listings::Longitude).double().null())
                    .col(
                        ColumnDef::new(Listings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_listings_provider_id")
                            .from(Listings::Table, Listings::ProviderId)
                            .to(Providers::Table, Providers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_listings_category_id")
                            .from(Listings::Table, Listings::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_listings_status")
                    .table(Listings::Table)
                    .col(Listings::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_listings_provider_id")
                    .table(Listings::Table)
                    .col(Listings::ProviderId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_listings_provider_id")
                    .table(Listings::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_listings_status")
                    .table(Listings::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Listings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Listings {
    Table,
    Id,
    ProviderId,
    CategoryId,
    Title,
    Description,
    Price,
    Status,
    ImageUrl,
    Location,
    Latitude,
    Longitude,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Providers {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Id,
}
