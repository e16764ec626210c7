//! Migration to create the maintenance_runs table.
//!
//! One row per irreversible maintenance procedure that has been applied, so a
//! procedure can detect and refuse a second application.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MaintenanceRuns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MaintenanceRuns::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MaintenanceRuns::Name)
                            .text()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(MaintenanceRuns::Details).text().not_null())
                    .col(
                        ColumnDef::new(MaintenanceRuns::AppliedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MaintenanceRuns::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MaintenanceRuns {
    Table,
    Id,
    Name,
    Details,
    AppliedAt,
}
