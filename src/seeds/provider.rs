//! Provider seeding functionality
//!
//! Seeds the providers table with the default AI vendor catalogue. Seeded
//! providers start inactive and without credentials; an administrator turns
//! them on once a credential is configured.

use anyhow::Result;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::models::capability::{Capability, CapabilityMap, CapabilitySupport};
use crate::repositories::{NewProvider, ProviderRepository};

/// Seeds the default provider catalogue, skipping slugs that already exist.
///
/// Returns the number of providers created.
pub async fn seed_providers(db: &DatabaseConnection) -> Result<usize> {
    let repo = ProviderRepository::new(Arc::new(db.clone()));
    let mut created = 0;

    for seed in default_catalogue() {
        if repo.find_by_slug(&seed.slug).await?.is_some() {
            log::info!("Provider '{}' already exists, skipping", seed.slug);
            continue;
        }

        log::info!("Creating provider: {}", seed.slug);
        let slug = seed.slug.clone();
        match repo.create(seed).await {
            Ok(_) => created += 1,
            Err(e) => {
                log::error!("Failed to create provider '{}': {}", slug, e);
                return Err(e.into());
            }
        }
    }

    log::info!("Provider seeding completed ({} created)", created);
    Ok(created)
}

fn default_catalogue() -> Vec<NewProvider> {
    vec![
        catalogue_entry(
            "openai",
            "OpenAI",
            Some("https://api.openai.com/v1"),
            CapabilityMap::new()
                .with(Capability::Chat, CapabilitySupport::dynamic())
                .with(Capability::Content, CapabilitySupport::dynamic())
                .with(Capability::Image, CapabilitySupport::dynamic())
                .with(Capability::Audio, CapabilitySupport::dynamic()),
        ),
        catalogue_entry(
            "anthropic",
            "Anthropic",
            None,
            CapabilityMap::new()
                .with(
                    Capability::Chat,
                    CapabilitySupport::fixed(["claude-sonnet-4-5", "claude-haiku-4-5"]),
                )
                .with(
                    Capability::Content,
                    CapabilitySupport::fixed(["claude-sonnet-4-5"]),
                ),
        ),
        catalogue_entry(
            "stability",
            "Stability AI",
            None,
            CapabilityMap::new().with(
                Capability::Image,
                CapabilitySupport::fixed(["stable-image-core", "stable-image-ultra"]),
            ),
        ),
        catalogue_entry(
            "elevenlabs",
            "ElevenLabs",
            None,
            CapabilityMap::new().with(
                Capability::Audio,
                CapabilitySupport::fixed(["eleven_multilingual_v2", "eleven_turbo_v2_5"]),
            ),
        ),
    ]
}

fn catalogue_entry(
    slug: &str,
    display_name: &str,
    api_base_url: Option<&str>,
    capabilities: CapabilityMap,
) -> NewProvider {
    NewProvider {
        slug: slug.to_string(),
        display_name: display_name.to_string(),
        is_active: false,
        capabilities,
        shared_credential_ciphertext: None,
        allow_shared_for_operators: false,
        api_base_url: api_base_url.map(str::to_string),
        created_by: None,
    }
}
