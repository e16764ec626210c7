//! # API Handlers
//!
//! Thin HTTP endpoints over the access engine. Authentication happens
//! upstream; operator identity arrives in the request as supplied by it.

use crate::models::ServiceInfo;
use axum::response::Json;

pub mod access;
pub mod destinations;
pub mod models;
pub mod sync;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

#[cfg(test)]
mod tests;
