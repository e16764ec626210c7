//! Migration to create the providers table.
//!
//! Providers are keyed by an immutable slug and carry the typed capability map,
//! the sealed shared credential and the flag that opens the shared credential to
//! non-super operators.

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
                        ColumnDef::new(Providers::Slug)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Providers::DisplayName).text().not_null())
                    .col(
                        ColumnDef::new(Providers::IsActive)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Providers::Capabilities)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Providers::SharedCredentialCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Providers::AllowSharedForOperators)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Providers::ApiBaseUrl).text().null())
                    .col(ColumnDef::new(Providers::CreatedBy).uuid().null())
                    .col(
                        ColumnDef::new(Providers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Providers::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Access checks list active providers on every cache miss.
        manager
            .create_index(
                Index::create()
                    .name("idx_providers_is_active")
                    .table(Providers::Table)
                    .col(Providers::IsActive)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_providers_is_active")
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
    Slug,
    DisplayName,
    IsActive,
    Capabilities,
    SharedCredentialCiphertext,
    AllowSharedForOperators,
    ApiBaseUrl,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}
