//! # Sync API Handlers

use axum::{
    extract::{Query, State},
    response::Json,
};

use crate::error::ApiError;
use crate::server::AppState;
use crate::sync::{SyncFilter, SyncReport};

/// Trigger a capability sync, optionally narrowed to a provider or capability
#[utoipa::path(
    post,
    path = "/sync",
    params(SyncFilter),
    responses(
        (status = 200, description = "Sync report", body = SyncReport, example = json!({
            "created_count": 3,
            "updated_count": 0,
            "unchanged_count": 12,
            "errors": [
                {"provider_slug": "openai", "capability": "image", "message": "vendor responded with status 401"}
            ]
        })),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "sync"
)]
pub async fn trigger_sync(
    State(state): State<AppState>,
    Query(filter): Query<SyncFilter>,
) -> Result<Json<SyncReport>, ApiError> {
    let report = state.sync.sync(&filter).await?;
    Ok(Json(report))
}
