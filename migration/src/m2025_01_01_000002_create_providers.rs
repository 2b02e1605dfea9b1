//! Migration to create the providers table.
//!
//! A provider row is the business profile attached one-to-one to a user
//! whose role is `provider`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Providers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Providers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Providers::UserId).string_len(128).not_null())
                    .col(
                        ColumnDef::new(Providers::BusinessName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Providers::Description).text().not_null())
                    .col(
                        ColumnDef::new(Providers::Approved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_providers_user_id")
                            .from(Providers::Table, Providers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_providers_user_id_unique")
                    .table(Providers::Table)
                    .col(Providers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_providers_user_id_unique")
                    .table(Providers::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Providers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Providers {
    Table,
    Id,
    UserId,
    BusinessName,
    Description,
    Approved,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
