//! Migration to create the capability_models table.
//!
//! A capability model is one concrete model a provider offers for one
//! capability. The single-active guard is added by a later migration so that
//! environments populated before it existed can be normalized first.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CapabilityModels::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CapabilityModels::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CapabilityModels::ProviderSlug)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CapabilityModels::Capability)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CapabilityModels::ModelIdentifier)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CapabilityModels::DisplayName).text().null())
                    .col(
                        ColumnDef::new(CapabilityModels::IsActive)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(CapabilityModels::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CapabilityModels::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_capability_models_provider_slug")
                            .from(CapabilityModels::Table, CapabilityModels::ProviderSlug)
                            .to(Providers::Table, Providers::Slug)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_capability_models_identity")
                    .table(CapabilityModels::Table)
                    .col(CapabilityModels::ProviderSlug)
                    .col(CapabilityModels::Capability)
                    .col(CapabilityModels::ModelIdentifier)
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
                    .name("idx_capability_models_identity")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(CapabilityModels::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CapabilityModels {
    Table,
    Id,
    ProviderSlug,
    Capability,
    ModelIdentifier,
    DisplayName,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Providers {
    Table,
    Slug,
}
