//! # Destination API Handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::destinations::{DestinationError, DestinationInfo, GeneratedContent};
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DestinationsResponse {
    pub destinations: Vec<DestinationInfo>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DispatchResponse {
    pub destination: String,
    /// Identifier the destination stored the content under
    pub stored_id: String,
}

impl From<DestinationError> for ApiError {
    fn from(error: DestinationError) -> Self {
        match &error {
            DestinationError::Unsupported { key } => ApiError::new(
                StatusCode::NOT_FOUND,
                "DESTINATION_NOT_SUPPORTED",
                &error.to_string(),
            )
            .with_details(serde_json::json!({ "destination": key })),
            DestinationError::Rejected { key, .. } => ApiError::new(
                StatusCode::BAD_GATEWAY,
                "DESTINATION_REJECTED",
                &error.to_string(),
            )
            .with_details(serde_json::json!({ "destination": key })),
        }
    }
}

/// List registered destinations
#[utoipa::path(
    get,
    path = "/destinations",
    responses(
        (status = 200, description = "Registered destinations", body = DestinationsResponse, example = json!({
            "destinations": [{"key": "log", "label": "Log output"}]
        }))
    ),
    tag = "destinations"
)]
pub async fn list_destinations(State(state): State<AppState>) -> Json<DestinationsResponse> {
    Json(DestinationsResponse {
        destinations: state.destinations.list(),
    })
}

/// Send generated content to a destination
#[utoipa::path(
    post,
    path = "/destinations/{key}",
    params(("key" = String, Path, description = "Destination key")),
    request_body = GeneratedContent,
    responses(
        (status = 200, description = "Content accepted", body = DispatchResponse),
        (status = 404, description = "Destination not supported", body = ApiError),
        (status = 502, description = "Destination rejected the content", body = ApiError)
    ),
    tag = "destinations"
)]
pub async fn dispatch_content(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(content): Json<GeneratedContent>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let stored_id = state.destinations.dispatch(&key, content).await?;
    Ok(Json(DispatchResponse {
        destination: key,
        stored_id,
    }))
}
