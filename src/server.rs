//! # Server Configuration
//!
//! Composition of the access engine and the axum router exposing it.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::access::AccessResolver;
use crate::activation::ActivationEnforcer;
use crate::cache::{CacheBackend, CapabilityCache, InvalidationBus, MemoryCache};
use crate::config::{AppConfig, ConfigError};
use crate::destinations::DestinationRegistry;
use crate::handlers;
use crate::repositories::ProviderRepository;
use crate::service::ConfigService;
use crate::store::{ConfigStore, DbConfigStore};
use crate::sync::{CapabilitySyncJob, ModelDiscovery, SyncScheduler};
use crate::telemetry;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseConnection>,
    pub resolver: Arc<AccessResolver>,
    pub service: Arc<ConfigService>,
    pub sync: Arc<CapabilitySyncJob>,
    pub destinations: Arc<DestinationRegistry>,
}

impl AppState {
    /// Wires the engine over one database. Every component shares the same
    /// cache so a write through the service is visible to the next read.
    pub fn compose(
        config: Arc<AppConfig>,
        db: Arc<DatabaseConnection>,
        discovery: Arc<dyn ModelDiscovery>,
        destinations: DestinationRegistry,
    ) -> Result<Self, ConfigError> {
        let key = config.credential_key()?;
        let store: Arc<dyn ConfigStore> = Arc::new(DbConfigStore::new(db.clone()));
        let backend: Arc<dyn CacheBackend> =
            Arc::new(MemoryCache::with_capacity(config.cache.capacity));
        let cache = Arc::new(CapabilityCache::new(
            backend,
            store.clone(),
            config.cache.ttl(),
        ));
        let bus = InvalidationBus::new(cache.clone());

        let activation = Arc::new(ActivationEnforcer::new(store.clone(), bus.clone()));
        let service = ConfigService::new(
            ProviderRepository::new(db.clone()),
            store.clone(),
            activation,
            cache.clone(),
            key.clone(),
        );
        let sync = CapabilitySyncJob::new(store, discovery, bus, config.sync.concurrency);

        Ok(Self {
            resolver: Arc::new(AccessResolver::new(cache, key)),
            service: Arc::new(service),
            sync: Arc::new(sync),
            destinations: Arc::new(destinations),
            config,
            db,
        })
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route(
            "/access/{operator_id}/{provider_slug}",
            get(handlers::access::resolve_access),
        )
        .route(
            "/operators/{operator_id}/providers",
            get(handlers::access::available_providers),
        )
        .route(
            "/models/{model_id}/activate",
            post(handlers::models::activate_model),
        )
        .route(
            "/models/{model_id}/deactivate",
            post(handlers::models::deactivate_model),
        )
        .route("/sync", post(handlers::sync::trigger_sync))
        .route(
            "/destinations",
            get(handlers::destinations::list_destinations),
        )
        .route(
            "/destinations/{key}",
            post(handlers::destinations::dispatch_content),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(telemetry::trace_middleware))
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Serves the API until ctrl-c, running the scheduled sync alongside when
/// enabled.
pub async fn run_server(state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let config = state.config.clone();
    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;

    let shutdown = CancellationToken::new();
    let scheduler = config.sync.enabled.then(|| {
        let scheduler = SyncScheduler::new(state.sync.clone(), config.sync.tick_interval());
        let token = shutdown.clone();
        tokio::spawn(async move { scheduler.run(token).await })
    });

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, profile = %config.profile, "Server listening");

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = %err, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Some(handle) = scheduler
        && let Err(err) = handle.await
    {
        error!(error = ?err, "Sync scheduler task failed");
    }

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::access::resolve_access,
        crate::handlers::access::available_providers,
        crate::handlers::models::activate_model,
        crate::handlers::models::deactivate_model,
        crate::handlers::sync::trigger_sync,
        crate::handlers::destinations::list_destinations,
        crate::handlers::destinations::dispatch_content,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::Capability,
            crate::models::capability_model::CapabilityModelView,
            crate::access::AccessState,
            crate::access::ProviderAccess,
            crate::handlers::access::AccessResponse,
            crate::sync::SyncReport,
            crate::sync::SyncFailure,
            crate::destinations::GeneratedContent,
            crate::destinations::DestinationInfo,
            crate::handlers::destinations::DestinationsResponse,
            crate::handlers::destinations::DispatchResponse,
            crate::error::ApiError,
        )
    ),
    tags(
        (name = "root", description = "Service information"),
        (name = "access", description = "Access state resolution"),
        (name = "models", description = "Capability model activation"),
        (name = "sync", description = "Capability sync"),
        (name = "destinations", description = "Generated content destinations"),
    ),
    info(
        title = "AI Access API",
        description = "Access resolution and capability routing for AI providers",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
