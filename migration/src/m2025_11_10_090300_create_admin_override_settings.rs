//! Migration to create the admin_override_settings table.
//!
//! One row per (operator, provider) holding the operator's optional sealed
//! personal credential.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AdminOverrideSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AdminOverrideSettings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AdminOverrideSettings::OperatorId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AdminOverrideSettings::ProviderSlug)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AdminOverrideSettings::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(AdminOverrideSettings::PersonalCredentialCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(AdminOverrideSettings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(AdminOverrideSettings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_admin_override_settings_provider_slug")
                            .from(
                                AdminOverrideSettings::Table,
                                AdminOverrideSettings::ProviderSlug,
                            )
                            .to(Providers::Table, Providers::Slug)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_admin_override_settings_operator_provider")
                    .table(AdminOverrideSettings::Table)
                    .col(AdminOverrideSettings::OperatorId)
                    .col(AdminOverrideSettings::ProviderSlug)
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
                    .name("idx_admin_override_settings_operator_provider")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(AdminOverrideSettings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AdminOverrideSettings {
    Table,
    Id,
    OperatorId,
    ProviderSlug,
    IsActive,
    PersonalCredentialCiphertext,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Providers {
    Table,
    Slug,
}
