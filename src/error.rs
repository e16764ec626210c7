//! # Error Handling
//!
//! `EngineError` is the taxonomy raised by the access engine. The HTTP surface
//! maps it onto a problem+json `ApiError` carrying the request trace id.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::crypto::CryptoError;
use crate::models::{Capability, CapabilityMapError};
use crate::telemetry;

/// Errors raised by configuration reads and writes, activation and sync.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("provider '{slug}' not found")]
    ProviderNotFound { slug: String },
    #[error("capability model {id} not found")]
    ModelNotFound { id: i32 },
    #[error("no override setting for operator {operator_id} on provider '{provider_slug}'")]
    OverrideNotFound {
        operator_id: Uuid,
        provider_slug: String,
    },
    #[error("concurrent activation conflict on provider '{provider_slug}' capability '{capability}'")]
    ActivationConflict {
        provider_slug: String,
        capability: Capability,
    },
    #[error("invalid capability map: {0}")]
    InvalidCapabilityMap(#[from] CapabilityMapError),
    #[error("provider '{slug}' is still referenced by models or override settings")]
    ProviderInUse { slug: String },
    #[error("provider slug is immutable (attempted '{from}' -> '{to}')")]
    SlugImmutable { from: String, to: String },
    #[error("invalid provider slug '{slug}'")]
    InvalidSlug { slug: String },
    #[error("invalid api base url '{url}'")]
    InvalidApiBaseUrl { url: String },
    #[error("provider '{slug}' already exists")]
    ProviderExists { slug: String },
    #[error("credential error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Recognises unique-constraint rejections across the supported backends.
pub fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error.code().is_some_and(|code| {
        let code = code.as_ref();
        code == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code)
    })
}

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Correlation trace ID for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: &str) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
            trace_id: Self::current_trace_id(),
        }
    }

    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message)
    }

    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(String::into_boxed_str)
            .or_else(|| Some(format!("corr-{}", &Uuid::new_v4().to_string()[..8]).into_boxed_str()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );
        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        let message = error.to_string();
        match error {
            EngineError::ProviderNotFound { .. }
            | EngineError::ModelNotFound { .. }
            | EngineError::OverrideNotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", &message)
            }
            EngineError::ActivationConflict { .. }
            | EngineError::ProviderInUse { .. }
            | EngineError::ProviderExists { .. } => {
                Self::new(StatusCode::CONFLICT, "CONFLICT", &message)
            }
            EngineError::InvalidCapabilityMap(_)
            | EngineError::SlugImmutable { .. }
            | EngineError::InvalidSlug { .. }
            | EngineError::InvalidApiBaseUrl { .. } => Self::bad_request(&message),
            EngineError::Crypto(err) => {
                tracing::error!(error = %err, "Credential handling failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "An internal error occurred",
                )
            }
            EngineError::Database(err) => err.into(),
        }
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        if is_unique_violation(&error) {
            tracing::debug!(?error, "Unique constraint violation detected");
            return Self::new(StatusCode::CONFLICT, "CONFLICT", "Resource already exists");
        }

        match error {
            sea_orm::DbErr::RecordNotFound(record) => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("Record not found: {record}"),
            ),
            sea_orm::DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service unavailable",
                )
            }
            other => {
                tracing::error!("Database error: {:?}", other);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Database error occurred",
                )
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }
}
