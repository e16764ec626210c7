//! # Capability Sync
//!
//! Reconciles the stored capability models with what each active provider
//! offers: dynamically discoverable capabilities are listed through a
//! [`ModelDiscovery`] collaborator, statically catalogued ones come from the
//! provider's capability map. Sync only ever creates or describes models; it
//! never activates one.
//!
//! Each provider's upserts commit on their own, so a failure (or an abort)
//! part-way leaves the providers already processed reconciled.

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

use crate::cache::{ConfigChange, InvalidationBus};
use crate::error::EngineResult;
use crate::models::capability::Capability;
use crate::models::provider;
use crate::repositories::{ModelUpsert, UpsertOutcome};
use crate::store::ConfigStore;

pub mod discovery;
pub mod scheduler;

pub use discovery::{DiscoveredModel, DiscoveryError, HttpModelDiscovery, ModelDiscovery};
pub use scheduler::SyncScheduler;

/// Narrows a sync run to one provider and/or one capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, IntoParams, ToSchema)]
pub struct SyncFilter {
    /// Only sync this provider slug
    pub provider: Option<String>,
    /// Only sync this capability
    pub capability: Option<Capability>,
}

/// A provider (or one of its capabilities) that could not be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SyncFailure {
    pub provider_slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability: Option<Capability>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SyncReport {
    pub created_count: u64,
    pub updated_count: u64,
    pub unchanged_count: u64,
    pub errors: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        self.created_count + self.updated_count > 0
    }

    fn absorb(&mut self, other: SyncReport) {
        self.created_count += other.created_count;
        self.updated_count += other.updated_count;
        self.unchanged_count += other.unchanged_count;
        self.errors.extend(other.errors);
    }

    fn failure(provider_slug: &str, capability: Option<Capability>, message: String) -> Self {
        Self {
            errors: vec![SyncFailure {
                provider_slug: provider_slug.to_string(),
                capability,
                message,
            }],
            ..Self::default()
        }
    }
}

pub struct CapabilitySyncJob {
    store: Arc<dyn ConfigStore>,
    discovery: Arc<dyn ModelDiscovery>,
    bus: InvalidationBus,
    concurrency: usize,
}

impl CapabilitySyncJob {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        discovery: Arc<dyn ModelDiscovery>,
        bus: InvalidationBus,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            discovery,
            bus,
            concurrency: concurrency.max(1),
        }
    }

    /// Runs one reconciliation pass. Only a failure to list providers is an
    /// error; everything else is reported per provider in the result.
    #[instrument(skip(self), fields(provider = ?filter.provider, capability = ?filter.capability))]
    pub async fn sync(&self, filter: &SyncFilter) -> EngineResult<SyncReport> {
        let started = Instant::now();
        let providers: Vec<provider::Model> = self
            .store
            .list_active_providers()
            .await?
            .into_iter()
            .filter(|provider| {
                filter
                    .provider
                    .as_deref()
                    .is_none_or(|slug| provider.slug == slug)
            })
            .collect();

        let mut report = SyncReport::default();
        if let Some(slug) = filter.provider.as_deref()
            && providers.is_empty()
        {
            report.absorb(SyncReport::failure(
                slug,
                None,
                "provider not found or inactive".to_string(),
            ));
        }

        info!(providers = providers.len(), "Starting capability sync");

        // Dropping the set (a cancelled run) aborts every provider task still
        // pending; providers already committed stay reconciled.
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut slugs = HashMap::with_capacity(providers.len());
        for (position, provider) in providers.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let store = self.store.clone();
            let discovery = self.discovery.clone();
            let capability = filter.capability;
            let slug = provider.slug.clone();

            let handle = tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    let failure = SyncReport::failure(
                        &provider.slug,
                        None,
                        "sync was shut down".to_string(),
                    );
                    return (position, failure);
                };
                let provider_report =
                    sync_provider(store.as_ref(), discovery.as_ref(), &provider, capability).await;
                (position, provider_report)
            });
            slugs.insert(handle.id(), (position, slug));
        }

        let mut provider_reports: Vec<Option<SyncReport>> = vec![None; slugs.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, provider_report)) => provider_reports[position] = Some(provider_report),
                Err(err) => {
                    if let Some((position, slug)) = slugs.get(&err.id()) {
                        error!(provider_slug = %slug, error = ?err, "Provider sync task panicked or was cancelled");
                        provider_reports[*position] =
                            Some(SyncReport::failure(slug, None, "sync task aborted".to_string()));
                    }
                }
            }
        }
        for provider_report in provider_reports.into_iter().flatten() {
            report.absorb(provider_report);
        }

        if report.changed() {
            self.bus.publish(ConfigChange::Models).await;
        }

        counter!("capability_sync_models_total", "outcome" => "created")
            .increment(report.created_count);
        counter!("capability_sync_models_total", "outcome" => "updated")
            .increment(report.updated_count);
        counter!("capability_sync_models_total", "outcome" => "unchanged")
            .increment(report.unchanged_count);
        histogram!("capability_sync_duration_ms").record(started.elapsed().as_secs_f64() * 1_000.0);

        info!(
            created = report.created_count,
            updated = report.updated_count,
            unchanged = report.unchanged_count,
            failures = report.errors.len(),
            "Capability sync completed"
        );
        Ok(report)
    }
}

/// Collects the upserts for one provider and commits them together.
#[instrument(skip_all, fields(provider_slug = %provider.slug))]
async fn sync_provider(
    store: &dyn ConfigStore,
    discovery: &dyn ModelDiscovery,
    provider: &provider::Model,
    only: Option<Capability>,
) -> SyncReport {
    let map = match provider.capability_map() {
        Ok(map) => map,
        Err(err) => {
            warn!(error = %err, "Stored capability map is invalid; skipping provider");
            return SyncReport::failure(&provider.slug, None, err.to_string());
        }
    };

    let mut report = SyncReport::default();
    let mut seen: HashSet<(Capability, String)> = HashSet::new();
    let mut upserts = Vec::new();
    let mut push = |capability: Capability, identifier: String, display_name: Option<String>| {
        if seen.insert((capability, identifier.clone())) {
            upserts.push(ModelUpsert {
                provider_slug: provider.slug.clone(),
                capability,
                model_identifier: identifier,
                display_name,
            });
        }
    };

    let mut dynamic = BTreeSet::new();
    for (capability, support) in map.supported() {
        if only.is_some_and(|only| only != capability) {
            continue;
        }
        if support.dynamic_models {
            dynamic.insert(capability);
        } else {
            for identifier in &support.models {
                push(capability, identifier.clone(), None);
            }
        }
    }

    if !dynamic.is_empty() {
        match discovery.discover(provider).await {
            Ok(models) => {
                for model in models {
                    for capability in &model.capabilities {
                        if dynamic.contains(capability) {
                            push(*capability, model.identifier.clone(), model.display_name.clone());
                        }
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "Model discovery failed");
                for capability in &dynamic {
                    report.absorb(SyncReport::failure(
                        &provider.slug,
                        Some(*capability),
                        err.to_string(),
                    ));
                }
            }
        }
    }

    if upserts.is_empty() {
        return report;
    }

    match store.upsert_models(&provider.slug, upserts).await {
        Ok(outcomes) => {
            for outcome in outcomes {
                match outcome {
                    UpsertOutcome::Created(_) => report.created_count += 1,
                    UpsertOutcome::Updated(_) => report.updated_count += 1,
                    UpsertOutcome::Unchanged(_) => report.unchanged_count += 1,
                }
            }
        }
        Err(err) => {
            error!(error = %err, "Failed to store reconciled models");
            report.absorb(SyncReport::failure(&provider.slug, None, err.to_string()));
        }
    }
    report
}
