//! # Access API Handlers

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::access::{AccessRequest, AccessState, Operator, ProviderAccess};
use crate::error::ApiError;
use crate::models::capability::Capability;
use crate::server::AppState;

/// Query parameters for an access check
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct AccessQuery {
    /// Capability the operator wants to use
    pub capability: Option<Capability>,
    /// Specific model identifier; defaults to the active model
    pub model: Option<String>,
    /// Whether the operator holds super/full-admin privilege
    #[serde(rename = "super", default)]
    #[param(rename = "super")]
    pub is_super: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccessResponse {
    pub operator_id: Uuid,
    pub provider_slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability: Option<Capability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub state: AccessState,
}

/// Resolve an operator's access state for a provider
#[utoipa::path(
    get,
    path = "/access/{operator_id}/{provider_slug}",
    params(
        ("operator_id" = Uuid, Path, description = "Operator identifier"),
        ("provider_slug" = String, Path, description = "Provider slug"),
        AccessQuery
    ),
    responses(
        (status = 200, description = "Resolved access state", body = AccessResponse, example = json!({
            "operator_id": "7f0c2c1e-4a8f-4a57-9a55-0d2f8f0b6a11",
            "provider_slug": "openai",
            "capability": "chat",
            "state": "available_shared"
        })),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "access"
)]
pub async fn resolve_access(
    State(state): State<AppState>,
    Path((operator_id, provider_slug)): Path<(Uuid, String)>,
    Query(query): Query<AccessQuery>,
) -> Result<Json<AccessResponse>, ApiError> {
    let operator = Operator {
        id: operator_id,
        is_super: query.is_super,
    };
    let mut request = AccessRequest::provider(provider_slug.clone());
    if let Some(capability) = query.capability {
        request = request.capability(capability);
    }
    if let Some(model) = query.model.clone() {
        request = request.model(model);
    }

    let resolved = state.resolver.resolve_by_slug(&operator, &request).await?;

    Ok(Json(AccessResponse {
        operator_id,
        provider_slug,
        capability: query.capability,
        model: query.model,
        state: resolved,
    }))
}

/// Query parameters for listing providers available to an operator
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct AvailableProvidersQuery {
    pub capability: Capability,
    #[serde(rename = "super", default)]
    #[param(rename = "super")]
    pub is_super: bool,
}

/// List active providers for a capability with the operator's access state
#[utoipa::path(
    get,
    path = "/operators/{operator_id}/providers",
    params(
        ("operator_id" = Uuid, Path, description = "Operator identifier"),
        AvailableProvidersQuery
    ),
    responses(
        (status = 200, description = "Providers with access state", body = [ProviderAccess]),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "access"
)]
pub async fn available_providers(
    State(state): State<AppState>,
    Path(operator_id): Path<Uuid>,
    Query(query): Query<AvailableProvidersQuery>,
) -> Result<Json<Vec<ProviderAccess>>, ApiError> {
    let operator = Operator {
        id: operator_id,
        is_super: query.is_super,
    };
    let listing = state
        .resolver
        .available_providers(&operator, query.capability)
        .await?;
    Ok(Json(listing))
}
