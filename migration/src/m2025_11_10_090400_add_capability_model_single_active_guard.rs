//! Adds a partial unique index allowing at most one active model per
//! (provider, capability) scope.
//!
//! Databases populated before the guard existed may hold several active models
//! in one scope, which would make the index creation fail. Those scopes are
//! normalized first: the most recently updated model stays active (highest id
//! wins a tie) and every other active model in the scope is deactivated. The
//! normalization is recorded in `maintenance_runs` and is never applied twice.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{ConnectionTrait, Statement};

/// Name of the partial unique index guarding the single-active invariant.
pub const SINGLE_ACTIVE_INDEX: &str = "idx_capability_models_single_active";

/// Name under which the normalization run is recorded.
pub const NORMALIZATION_RUN: &str = "normalize_active_capability_models";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        normalize_active_models(manager).await?;

        let backend = manager.get_database_backend();
        manager
            .get_connection()
            .execute(Statement::from_string(
                backend,
                format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS {SINGLE_ACTIVE_INDEX} \
                     ON capability_models (provider_slug, capability) \
                     WHERE is_active"
                ),
            ))
            .await
            .map(|_| ())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                format!("DROP INDEX IF EXISTS {SINGLE_ACTIVE_INDEX}"),
            ))
            .await
            .map(|_| ())
    }
}

/// Deactivates every active model that is not the newest in its scope.
async fn normalize_active_models(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    let db = manager.get_connection();
    let backend = manager.get_database_backend();

    let previous_run = Query::select()
        .column(MaintenanceRuns::Id)
        .from(MaintenanceRuns::Table)
        .and_where(Expr::col(MaintenanceRuns::Name).eq(NORMALIZATION_RUN))
        .to_owned();
    if db.query_one(backend.build(&previous_run)).await?.is_some() {
        tracing::warn!(
            run = NORMALIZATION_RUN,
            "Active model normalization already recorded; not applying again"
        );
        return Ok(());
    }

    let active_models = Query::select()
        .columns([
            CapabilityModels::Id,
            CapabilityModels::ProviderSlug,
            CapabilityModels::Capability,
        ])
        .from(CapabilityModels::Table)
        .and_where(Expr::col(CapabilityModels::IsActive).eq(true))
        .order_by(CapabilityModels::ProviderSlug, Order::Asc)
        .order_by(CapabilityModels::Capability, Order::Asc)
        .order_by(CapabilityModels::UpdatedAt, Order::Desc)
        .order_by(CapabilityModels::Id, Order::Desc)
        .to_owned();
    let rows = db.query_all(backend.build(&active_models)).await?;

    let mut retained: Option<(String, String, i32)> = None;
    let mut retained_scope_fixed = false;
    let mut deactivated: Vec<i32> = Vec::new();
    let mut scopes_fixed = 0usize;

    for row in rows {
        let id: i32 = row.try_get("", "id")?;
        let provider_slug: String = row.try_get("", "provider_slug")?;
        let capability: String = row.try_get("", "capability")?;

        let kept_id = match &retained {
            Some((slug, cap, kept_id)) if *slug == provider_slug && *cap == capability => {
                Some(*kept_id)
            }
            _ => None,
        };

        let Some(kept_id) = kept_id else {
            retained = Some((provider_slug, capability, id));
            retained_scope_fixed = false;
            continue;
        };

        if !retained_scope_fixed {
            scopes_fixed += 1;
            retained_scope_fixed = true;
        }
        tracing::warn!(
            provider_slug = %provider_slug,
            capability = %capability,
            kept_model_id = kept_id,
            deactivated_model_id = id,
            "Deactivating duplicate active capability model"
        );
        deactivated.push(id);
    }

    if !deactivated.is_empty() {
        let update = Query::update()
            .table(CapabilityModels::Table)
            .value(CapabilityModels::IsActive, false)
            .value(CapabilityModels::UpdatedAt, Expr::current_timestamp())
            .and_where(Expr::col(CapabilityModels::Id).is_in(deactivated.clone()))
            .to_owned();
        db.execute(backend.build(&update)).await?;
    }

    let details = serde_json::json!({
        "scopes_fixed": scopes_fixed,
        "deactivated_model_ids": deactivated,
    })
    .to_string();
    let record = Query::insert()
        .into_table(MaintenanceRuns::Table)
        .columns([MaintenanceRuns::Name, MaintenanceRuns::Details])
        .values([NORMALIZATION_RUN.into(), details.into()])
        .map_err(|err| DbErr::Custom(err.to_string()))?
        .to_owned();
    db.execute(backend.build(&record)).await?;

    tracing::info!(
        run = NORMALIZATION_RUN,
        scopes_fixed,
        deactivated = deactivated.len(),
        "Active model normalization applied"
    );

    Ok(())
}

#[derive(DeriveIden)]
enum CapabilityModels {
    Table,
    Id,
    ProviderSlug,
    Capability,
    IsActive,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MaintenanceRuns {
    Table,
    Id,
    Name,
    Details,
}
