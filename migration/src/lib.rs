//! Database migrations for the AI access engine.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_11_01_102700_create_providers;
mod m2025_11_10_090000_create_maintenance_runs;
mod m2025_11_10_090200_create_capability_models;
mod m2025_11_10_090300_create_admin_override_settings;
mod m2025_11_10_090400_add_capability_model_single_active_guard;

pub use m2025_11_10_090400_add_capability_model_single_active_guard::{
    NORMALIZATION_RUN, SINGLE_ACTIVE_INDEX,
};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_11_01_102700_create_providers::Migration),
            Box::new(m2025_11_10_090000_create_maintenance_runs::Migration),
            Box::new(m2025_11_10_090200_create_capability_models::Migration),
            Box::new(m2025_11_10_090300_create_admin_override_settings::Migration),
            Box::new(m2025_11_10_090400_add_capability_model_single_active_guard::Migration),
        ]
    }
}
