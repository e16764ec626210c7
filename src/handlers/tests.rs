//! # Tests for Handlers
//!
//! Router-level tests driving the composed engine over an in-memory database.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Request, StatusCode},
};
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::crypto::{Credential, CredentialScope, CryptoKey, seal_credential};
use crate::destinations::{BuiltinDestinations, DestinationInfo, DestinationRegistry};
use crate::handlers::destinations::DestinationsResponse;
use crate::models::capability::{Capability, CapabilityMap, CapabilitySupport};
use crate::models::{capability_model, provider};
use crate::repositories::{NewProvider, ProviderRepository};
use crate::server::{AppState, create_app};
use crate::sync::{DiscoveredModel, DiscoveryError, ModelDiscovery};

const KEY: [u8; 32] = [3u8; 32];

struct FixedDiscovery;

#[async_trait]
impl ModelDiscovery for FixedDiscovery {
    async fn discover(
        &self,
        _provider: &provider::Model,
    ) -> Result<Vec<DiscoveredModel>, DiscoveryError> {
        Ok(vec![DiscoveredModel {
            identifier: "gpt-4o".into(),
            display_name: None,
            capabilities: vec![Capability::Chat],
        }])
    }
}

async fn test_app() -> (Router, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    let key = CryptoKey::new(KEY.to_vec()).unwrap();
    let sealed = seal_credential(
        &key,
        CredentialScope::Shared {
            provider_slug: "openai",
        },
        &Credential::new("sk-shared"),
    )
    .unwrap();
    ProviderRepository::new(Arc::new(db.clone()))
        .create(NewProvider {
            slug: "openai".into(),
            display_name: "OpenAI".into(),
            is_active: true,
            capabilities: CapabilityMap::new()
                .with(Capability::Chat, CapabilitySupport::dynamic()),
            shared_credential_ciphertext: Some(sealed),
            allow_shared_for_operators: true,
            api_base_url: None,
            created_by: None,
        })
        .await
        .unwrap();

    let config = AppConfig {
        profile: "test".into(),
        crypto_key: Some(KEY.to_vec()),
        ..AppConfig::default()
    };
    let state = AppState::compose(
        Arc::new(config),
        Arc::new(db.clone()),
        Arc::new(FixedDiscovery),
        DestinationRegistry::compose(&[&BuiltinDestinations]),
    )
    .unwrap();
    (create_app(state), db)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn root_returns_service_info() {
    let (app, _db) = test_app().await;

    let (status, headers, body) = send(app, get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "ai-access");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(headers.contains_key("x-trace-id"));
}

#[tokio::test]
async fn access_endpoint_reports_the_resolved_state() {
    let (app, _db) = test_app().await;
    let operator_id = Uuid::new_v4();

    let (status, _, body) = send(
        app.clone(),
        get(&format!("/access/{operator_id}/openai?capability=chat")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "available_shared");
    assert_eq!(body["capability"], "chat");
    assert_eq!(body["operator_id"], operator_id.to_string());

    let (_, _, body) = send(
        app.clone(),
        get(&format!("/access/{operator_id}/openai?capability=image")),
    )
    .await;
    assert_eq!(body["state"], "no_access");

    let (_, _, body) = send(app, get(&format!("/access/{operator_id}/mistral"))).await;
    assert_eq!(body["state"], "no_access");
}

#[tokio::test]
async fn malformed_operator_id_is_rejected() {
    let (app, _db) = test_app().await;

    let (status, _, _) = send(app, get("/access/not-a-uuid/openai")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn providers_listing_includes_the_active_model() {
    let (app, db) = test_app().await;
    let now = Utc::now();
    capability_model::ActiveModel {
        provider_slug: Set("openai".into()),
        capability: Set(Capability::Chat),
        model_identifier: Set("gpt-4o".into()),
        display_name: Set(None),
        is_active: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap();

    let (status, _, body) = send(
        app,
        get(&format!("/operators/{}/providers?capability=chat", Uuid::new_v4())),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let listing = body.as_array().unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0]["slug"], "openai");
    assert_eq!(listing[0]["state"], "available_shared");
    assert_eq!(listing[0]["active_model"], "gpt-4o");
}

#[tokio::test]
async fn sync_then_activate_through_the_api() {
    let (app, _db) = test_app().await;

    let (status, _, report) = send(app.clone(), post_json("/sync?provider=openai", Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["created_count"], 1);
    assert_eq!(report["errors"].as_array().unwrap().len(), 0);

    let (_, _, body) = send(
        app.clone(),
        get(&format!("/access/{}/openai?model=gpt-4o", Uuid::new_v4())),
    )
    .await;
    assert_eq!(body["state"], "disabled");

    // The first synced model gets the first id.
    let (status, _, model) = send(app.clone(), post_json("/models/1/activate", Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(model["model_identifier"], "gpt-4o");
    assert_eq!(model["is_active"], true);

    let (_, _, body) = send(
        app,
        get(&format!("/access/{}/openai?model=gpt-4o", Uuid::new_v4())),
    )
    .await;
    assert_eq!(body["state"], "available_shared");
}

#[tokio::test]
async fn activating_an_unknown_model_is_not_found() {
    let (app, _db) = test_app().await;

    let (status, headers, body) = send(app, post_json("/models/999/activate", Value::Null)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers.get("content-type").unwrap(), "application/problem+json");
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn destinations_are_listed_and_dispatched() {
    let (app, _db) = test_app().await;

    let (status, _, body) = send(app.clone(), get("/destinations")).await;
    assert_eq!(status, StatusCode::OK);
    let listing: DestinationsResponse = serde_json::from_value(body).unwrap();
    assert_eq!(listing.destinations.len(), 1);
    assert_eq!(listing.destinations[0].key, "log");
    assert!(matches!(&listing.destinations[0], DestinationInfo { label, .. } if !label.is_empty()));

    let (status, _, body) = send(
        app,
        post_json(
            "/destinations/log",
            serde_json::json!({"capability": "content", "body": "Release notes"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["destination"], "log");
    assert!(Uuid::parse_str(body["stored_id"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn unknown_destination_is_a_problem_with_the_trace_id() {
    let (app, _db) = test_app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/destinations/portfolio")
        .header("content-type", "application/json")
        .header("x-trace-id", "trace-abc")
        .body(Body::from(
            serde_json::json!({"capability": "image", "body": "cover"}).to_string(),
        ))
        .unwrap();

    let (status, headers, body) = send(app, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers.get("content-type").unwrap(), "application/problem+json");
    assert_eq!(headers.get("x-trace-id").unwrap(), "trace-abc");
    assert_eq!(body["code"], "DESTINATION_NOT_SUPPORTED");
    assert_eq!(body["trace_id"], "trace-abc");
    assert_eq!(body["details"]["destination"], "portfolio");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (app, _db) = test_app().await;

    let (status, _, body) = send(app, get("/openapi.json")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/access/{operator_id}/{provider_slug}"].is_object());
    assert!(body["paths"]["/sync"].is_object());
}
