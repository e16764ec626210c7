//! # Capability Model API Handlers

use axum::{
    extract::{Path, State},
    response::Json,
};

use crate::error::ApiError;
use crate::models::capability_model::CapabilityModelView;
use crate::server::AppState;

/// Make a model the only active model of its (provider, capability) scope
#[utoipa::path(
    post,
    path = "/models/{model_id}/activate",
    params(("model_id" = i32, Path, description = "Capability model id")),
    responses(
        (status = 200, description = "Activated model", body = CapabilityModelView),
        (status = 404, description = "Model not found", body = ApiError),
        (status = 409, description = "Concurrent activation conflict", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "models"
)]
pub async fn activate_model(
    State(state): State<AppState>,
    Path(model_id): Path<i32>,
) -> Result<Json<CapabilityModelView>, ApiError> {
    let model = state.service.activate_model(model_id).await?;
    Ok(Json(model.into()))
}

/// Deactivate a model
#[utoipa::path(
    post,
    path = "/models/{model_id}/deactivate",
    params(("model_id" = i32, Path, description = "Capability model id")),
    responses(
        (status = 200, description = "Deactivated model", body = CapabilityModelView),
        (status = 404, description = "Model not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "models"
)]
pub async fn deactivate_model(
    State(state): State<AppState>,
    Path(model_id): Path<i32>,
) -> Result<Json<CapabilityModelView>, ApiError> {
    let model = state.service.deactivate_model(model_id).await?;
    Ok(Json(model.into()))
}
