//! Vendor model discovery.
//!
//! Dynamically discoverable capabilities list their models by asking the
//! vendor. [`HttpModelDiscovery`] speaks the common `GET {base}/models`
//! listing shape (`{"data": [{"id": ...}]}`) using the provider's shared
//! credential as a bearer token.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::crypto::{CredentialScope, CryptoError, CryptoKey, open_credential};
use crate::models::capability::Capability;
use crate::models::provider;

/// A model reported by a vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredModel {
    pub identifier: String,
    pub display_name: Option<String>,
    /// Capabilities the model serves.
    pub capabilities: Vec<Capability>,
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("provider '{slug}' cannot be discovered: {reason}")]
    NotConfigured { slug: String, reason: &'static str },
    #[error("discovery request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("vendor responded with status {status}")]
    Status { status: u16 },
    #[error("failed to open shared credential: {0}")]
    Credential(#[from] CryptoError),
}

/// Lists the models a provider currently offers.
#[async_trait]
pub trait ModelDiscovery: Send + Sync {
    async fn discover(
        &self,
        provider: &provider::Model,
    ) -> Result<Vec<DiscoveredModel>, DiscoveryError>;
}

#[derive(Debug, Deserialize)]
struct ModelListing {
    #[serde(default)]
    data: Vec<ListedModel>,
}

#[derive(Debug, Deserialize)]
struct ListedModel {
    id: String,
    #[serde(default, alias = "name")]
    display_name: Option<String>,
}

pub struct HttpModelDiscovery {
    client: Client,
    key: CryptoKey,
}

impl HttpModelDiscovery {
    pub fn new(key: CryptoKey, timeout: Duration) -> Result<Self, DiscoveryError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ai-access/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, key })
    }
}

#[async_trait]
impl ModelDiscovery for HttpModelDiscovery {
    #[instrument(skip_all, fields(provider_slug = %provider.slug))]
    async fn discover(
        &self,
        provider: &provider::Model,
    ) -> Result<Vec<DiscoveredModel>, DiscoveryError> {
        let Some(base_url) = provider.api_base_url.as_deref() else {
            return Err(DiscoveryError::NotConfigured {
                slug: provider.slug.clone(),
                reason: "no api base url",
            });
        };
        let Some(sealed) = provider
            .shared_credential_ciphertext
            .as_deref()
            .filter(|sealed| !sealed.is_empty())
        else {
            return Err(DiscoveryError::NotConfigured {
                slug: provider.slug.clone(),
                reason: "no shared credential",
            });
        };

        let credential = open_credential(
            &self.key,
            CredentialScope::Shared {
                provider_slug: &provider.slug,
            },
            sealed,
        )?;

        let url = format!("{}/models", base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .bearer_auth(credential.expose())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                status: status.as_u16(),
            });
        }

        let listing: ModelListing = response.json().await?;
        debug!(listed = listing.data.len(), "Vendor listed models");

        Ok(listing
            .data
            .into_iter()
            .filter(|model| !model.id.trim().is_empty())
            .map(|model| DiscoveredModel {
                capabilities: classify(&model.id),
                identifier: model.id,
                display_name: model.display_name,
            })
            .collect())
    }
}

const IMAGE_MARKERS: [&str; 5] = ["dall-e", "image", "imagen", "flux", "stable-diffusion"];
const AUDIO_MARKERS: [&str; 4] = ["tts", "whisper", "audio", "speech"];

/// Infers the capabilities a model serves from its identifier. Anything that
/// is neither an image nor an audio model is treated as a text model.
pub fn classify(identifier: &str) -> Vec<Capability> {
    let identifier = identifier.to_ascii_lowercase();
    if IMAGE_MARKERS.iter().any(|marker| identifier.contains(marker)) {
        vec![Capability::Image]
    } else if AUDIO_MARKERS.iter().any(|marker| identifier.contains(marker)) {
        vec![Capability::Audio]
    } else {
        vec![Capability::Chat, Capability::Content]
    }
}
