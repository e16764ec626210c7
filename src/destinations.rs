//! # Destination Registry
//!
//! Maps a destination key to the handler that accepts generated content for
//! it. The registry is an explicit instance built by a composition step at
//! startup and then shared read-only; it knows nothing about what handlers do
//! with the content.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use utoipa::ToSchema;

use crate::models::capability::Capability;

/// Content produced by a capability invocation, on its way to a destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeneratedContent {
    pub capability: Capability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: String,
    /// Free-form data a handler may understand.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum DestinationError {
    #[error("destination '{key}' is not supported")]
    Unsupported { key: String },
    #[error("destination '{key}' rejected the content: {message}")]
    Rejected { key: String, message: String },
}

/// Accepts generated content and returns the identifier it was stored under.
#[async_trait]
pub trait DestinationHandler: Send + Sync {
    async fn accept(&self, content: GeneratedContent) -> Result<String, String>;
}

/// Adapts an async closure into a handler.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> DestinationHandler for FnHandler<F>
where
    F: Fn(GeneratedContent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, String>> + Send,
{
    async fn accept(&self, content: GeneratedContent) -> Result<String, String> {
        (self.0)(content).await
    }
}

/// A module that owns one or more destinations.
pub trait DestinationRegistrar {
    fn register_destinations(&self, registry: &mut DestinationRegistry);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DestinationInfo {
    pub key: String,
    pub label: String,
}

struct Registration {
    label: String,
    handler: Arc<dyn DestinationHandler>,
}

#[derive(Default)]
pub struct DestinationRegistry {
    destinations: HashMap<String, Registration>,
}

impl DestinationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from every registrar, in order.
    pub fn compose(registrars: &[&dyn DestinationRegistrar]) -> Self {
        let mut registry = Self::new();
        for registrar in registrars {
            registrar.register_destinations(&mut registry);
        }
        registry
    }

    /// Registers `handler` under `key`. A later registration under the same
    /// key replaces the earlier one.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        label: impl Into<String>,
        handler: Arc<dyn DestinationHandler>,
    ) {
        let key = key.into();
        let label = label.into();
        if let Some(previous) = self.destinations.get(&key) {
            warn!(
                destination = %key,
                previous_label = %previous.label,
                "Destination re-registered; last registration wins"
            );
        }
        self.destinations.insert(key, Registration { label, handler });
    }

    pub fn has(&self, key: &str) -> bool {
        self.destinations.contains_key(key)
    }

    /// Registered destinations sorted by key.
    pub fn list(&self) -> Vec<DestinationInfo> {
        let mut listing: Vec<_> = self
            .destinations
            .iter()
            .map(|(key, registration)| DestinationInfo {
                key: key.clone(),
                label: registration.label.clone(),
            })
            .collect();
        listing.sort_by(|a, b| a.key.cmp(&b.key));
        listing
    }

    /// Hands `content` to the handler registered under `key`.
    pub async fn dispatch(
        &self,
        key: &str,
        content: GeneratedContent,
    ) -> Result<String, DestinationError> {
        let Some(registration) = self.destinations.get(key) else {
            return Err(DestinationError::Unsupported {
                key: key.to_string(),
            });
        };

        let handler = registration.handler.clone();
        let stored = handler
            .accept(content)
            .await
            .map_err(|message| DestinationError::Rejected {
                key: key.to_string(),
                message,
            })?;
        debug!(destination = %key, stored_id = %stored, "Dispatched generated content");
        Ok(stored)
    }
}

/// Writes accepted content to the service log. Useful as a sink while no
/// publishing destination is wired in.
pub struct LogDestination;

#[async_trait]
impl DestinationHandler for LogDestination {
    async fn accept(&self, content: GeneratedContent) -> Result<String, String> {
        let stored_id = Uuid::new_v4().to_string();
        info!(
            stored_id = %stored_id,
            capability = %content.capability,
            title = content.title.as_deref().unwrap_or_default(),
            body_len = content.body.len(),
            "Generated content logged"
        );
        Ok(stored_id)
    }
}

/// Destinations that ship with the service.
pub struct BuiltinDestinations;

impl DestinationRegistrar for BuiltinDestinations {
    fn register_destinations(&self, registry: &mut DestinationRegistry) {
        registry.register("log", "Log output", Arc::new(LogDestination));
    }
}
