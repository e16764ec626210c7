//! Integration tests for configuration writes through the service.

use ai_access::access::{AccessRequest, AccessState, Operator};
use ai_access::crypto::Credential;
use ai_access::error::EngineError;
use ai_access::models::capability::{Capability, CapabilityMap, CapabilitySupport};
use ai_access::service::{ProviderDraft, ProviderUpdate};
use anyhow::Result;
use std::sync::Arc;
use uuid::Uuid;

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{StaticDiscovery, chat_map, compose_engine, insert_model};

fn draft(slug: &str) -> ProviderDraft {
    ProviderDraft {
        slug: slug.to_string(),
        display_name: "OpenAI".into(),
        is_active: true,
        capabilities: chat_map(),
        shared_credential: Some(Credential::new("sk-org-1")),
        allow_shared_for_operators: true,
        api_base_url: Some("https://api.openai.com/v1".into()),
    }
}

#[tokio::test]
async fn created_provider_hands_out_its_sealed_credential() -> Result<()> {
    let (state, _db) = compose_engine(Arc::new(StaticDiscovery::default())).await?;
    let created_by = Uuid::new_v4();

    let provider = state
        .service
        .create_provider(draft("openai"), Some(created_by))
        .await?;
    assert_eq!(provider.created_by, Some(created_by));
    assert_ne!(
        provider.shared_credential_ciphertext.as_deref(),
        Some("sk-org-1".as_bytes()),
        "credential is stored sealed"
    );

    let grant = state
        .resolver
        .credential_for(
            &Operator::normal(Uuid::new_v4()),
            &AccessRequest::provider("openai"),
        )
        .await?;
    assert_eq!(grant.state, AccessState::AvailableShared);
    assert_eq!(grant.credential.map(|c| c.expose().to_string()).as_deref(), Some("sk-org-1"));
    Ok(())
}

#[tokio::test]
async fn rotating_the_shared_credential_takes_effect_immediately() -> Result<()> {
    let (state, _db) = compose_engine(Arc::new(StaticDiscovery::default())).await?;
    state.service.create_provider(draft("openai"), None).await?;
    let operator = Operator::normal(Uuid::new_v4());
    let request = AccessRequest::provider("openai");
    state.resolver.credential_for(&operator, &request).await?;

    state
        .service
        .update_provider(
            "openai",
            ProviderUpdate {
                shared_credential: Some(Some(Credential::new("sk-org-2"))),
                ..ProviderUpdate::default()
            },
        )
        .await?;
    let grant = state.resolver.credential_for(&operator, &request).await?;
    assert_eq!(grant.credential.unwrap().expose(), "sk-org-2");

    state
        .service
        .update_provider(
            "openai",
            ProviderUpdate {
                shared_credential: Some(None),
                ..ProviderUpdate::default()
            },
        )
        .await?;
    assert_eq!(
        state.resolver.resolve_by_slug(&operator, &request).await?,
        AccessState::NoAccess
    );
    Ok(())
}

#[tokio::test]
async fn provider_writes_are_validated() -> Result<()> {
    let (state, _db) = compose_engine(Arc::new(StaticDiscovery::default())).await?;

    let err = state
        .service
        .create_provider(draft("Open AI"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidSlug { .. }));

    let err = state
        .service
        .create_provider(
            ProviderDraft {
                api_base_url: Some("api.openai.com".into()),
                ..draft("openai")
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidApiBaseUrl { .. }));

    let err = state
        .service
        .create_provider(
            ProviderDraft {
                capabilities: CapabilityMap::new().with(
                    Capability::Image,
                    CapabilitySupport::fixed(["dall-e-3", "dall-e-3"]),
                ),
                ..draft("openai")
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCapabilityMap(_)));

    state.service.create_provider(draft("openai"), None).await?;
    let err = state
        .service
        .create_provider(draft("openai"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ProviderExists { ref slug } if slug == "openai"));
    Ok(())
}

#[tokio::test]
async fn slugs_never_change() -> Result<()> {
    let (state, _db) = compose_engine(Arc::new(StaticDiscovery::default())).await?;
    state.service.create_provider(draft("openai"), None).await?;

    let err = state
        .service
        .update_provider(
            "openai",
            ProviderUpdate {
                slug: Some("open-ai".into()),
                ..ProviderUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SlugImmutable { .. }));

    // Restating the current slug is fine.
    let updated = state
        .service
        .update_provider(
            "openai",
            ProviderUpdate {
                slug: Some("openai".into()),
                display_name: Some("OpenAI Platform".into()),
                ..ProviderUpdate::default()
            },
        )
        .await?;
    assert_eq!(updated.display_name, "OpenAI Platform");

    let err = state
        .service
        .update_provider("missing", ProviderUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ProviderNotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn providers_in_use_cannot_be_deleted() -> Result<()> {
    let (state, db) = compose_engine(Arc::new(StaticDiscovery::default())).await?;
    state.service.create_provider(draft("openai"), None).await?;
    state.service.create_provider(draft("spare"), None).await?;
    insert_model(&db, "openai", Capability::Chat, "gpt-4o", false).await?;

    let err = state.service.delete_provider("openai").await.unwrap_err();
    assert!(matches!(err, EngineError::ProviderInUse { .. }));

    let operator = Operator::normal(Uuid::new_v4());
    state.resolver.resolve_by_slug(&operator, &AccessRequest::provider("spare")).await?;
    state.service.delete_provider("spare").await?;
    assert_eq!(
        state
            .resolver
            .resolve_by_slug(&operator, &AccessRequest::provider("spare"))
            .await?,
        AccessState::NoAccess
    );

    let err = state.service.delete_provider("spare").await.unwrap_err();
    assert!(matches!(err, EngineError::ProviderNotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn override_settings_require_a_known_provider() -> Result<()> {
    let (state, _db) = compose_engine(Arc::new(StaticDiscovery::default())).await?;
    let operator_id = Uuid::new_v4();

    let err = state
        .service
        .set_override(operator_id, "openai", true, Some(Credential::new("sk-me")))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ProviderNotFound { .. }));

    let err = state
        .service
        .remove_override(operator_id, "openai")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::OverrideNotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn inactive_override_falls_back_to_shared_access() -> Result<()> {
    let (state, _db) = compose_engine(Arc::new(StaticDiscovery::default())).await?;
    state.service.create_provider(draft("openai"), None).await?;
    let operator_id = Uuid::new_v4();
    let operator = Operator::normal(operator_id);
    let request = AccessRequest::provider("openai");

    state
        .service
        .set_override(operator_id, "openai", false, Some(Credential::new("sk-me")))
        .await?;
    assert_eq!(state.service.list_overrides(operator_id).await?.len(), 1);

    let grant = state.resolver.credential_for(&operator, &request).await?;
    assert_eq!(grant.state, AccessState::AvailableShared);
    assert_eq!(grant.credential.unwrap().expose(), "sk-org-1");

    state
        .service
        .set_override(operator_id, "openai", true, Some(Credential::new("sk-me")))
        .await?;
    let grant = state.resolver.credential_for(&operator, &request).await?;
    assert_eq!(grant.state, AccessState::AvailablePersonal);
    assert_eq!(grant.credential.unwrap().expose(), "sk-me");
    assert_eq!(state.service.list_overrides(operator_id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn flushing_the_cache_succeeds_on_a_healthy_backend() -> Result<()> {
    let (state, _db) = compose_engine(Arc::new(StaticDiscovery::default())).await?;
    assert!(state.service.flush_cache().await);
    Ok(())
}
