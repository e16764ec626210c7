//! Integration tests for access resolution through the composed engine.

use ai_access::access::{AccessRequest, AccessState, Operator};
use ai_access::crypto::Credential;
use ai_access::models::capability::{Capability, CapabilityMap, CapabilitySupport};
use ai_access::service::ProviderUpdate;
use anyhow::Result;
use std::sync::Arc;
use uuid::Uuid;

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{StaticDiscovery, compose_engine, insert_model, insert_provider, shared_provider};

#[tokio::test]
async fn shared_access_until_provider_is_deactivated() -> Result<()> {
    let (state, db) = compose_engine(Arc::new(StaticDiscovery::default())).await?;
    insert_provider(&db, shared_provider("openai", test_utils::chat_map())).await?;
    insert_model(&db, "openai", Capability::Chat, "gpt-4o", true).await?;

    let operator = Operator::normal(Uuid::new_v4());
    let request = AccessRequest::provider("openai").capability(Capability::Chat);

    assert_eq!(
        state.resolver.resolve_by_slug(&operator, &request).await?,
        AccessState::AvailableShared
    );

    state.service.deactivate_provider("openai").await?;

    assert_eq!(
        state.resolver.resolve_by_slug(&operator, &request).await?,
        AccessState::Disabled
    );
    Ok(())
}

#[tokio::test]
async fn shared_flag_change_is_visible_to_the_next_resolution() -> Result<()> {
    let (state, db) = compose_engine(Arc::new(StaticDiscovery::default())).await?;
    insert_provider(&db, shared_provider("openai", test_utils::chat_map())).await?;

    let operator = Operator::normal(Uuid::new_v4());
    let request = AccessRequest::provider("openai");

    // Populate the cache before the write.
    assert_eq!(
        state.resolver.resolve_by_slug(&operator, &request).await?,
        AccessState::AvailableShared
    );

    state
        .service
        .update_provider(
            "openai",
            ProviderUpdate {
                allow_shared_for_operators: Some(false),
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
async fn super_operator_keeps_shared_access_despite_personal_override() -> Result<()> {
    let (state, db) = compose_engine(Arc::new(StaticDiscovery::default())).await?;
    insert_provider(&db, shared_provider("openai", test_utils::chat_map())).await?;

    let operator = Operator::super_operator(Uuid::new_v4());
    state
        .service
        .set_override(
            operator.id,
            "openai",
            true,
            Some(Credential::new("sk-personal")),
        )
        .await?;

    let grant = state
        .resolver
        .credential_for(&operator, &AccessRequest::provider("openai"))
        .await?;

    assert_eq!(grant.state, AccessState::AvailableShared);
    assert_eq!(
        grant.credential.as_ref().map(Credential::expose),
        Some(test_utils::SHARED_SECRET)
    );
    Ok(())
}

#[tokio::test]
async fn personal_override_hands_out_the_personal_credential() -> Result<()> {
    let (state, db) = compose_engine(Arc::new(StaticDiscovery::default())).await?;
    insert_provider(&db, shared_provider("openai", test_utils::chat_map())).await?;

    let operator = Operator::normal(Uuid::new_v4());
    let request = AccessRequest::provider("openai");
    state
        .service
        .set_override(operator.id, "openai", true, Some(Credential::new("sk-mine")))
        .await?;

    let grant = state.resolver.credential_for(&operator, &request).await?;
    assert_eq!(grant.state, AccessState::AvailablePersonal);
    assert_eq!(
        grant.credential.as_ref().map(Credential::expose),
        Some("sk-mine")
    );

    // Removing the override opts back into shared access.
    state.service.remove_override(operator.id, "openai").await?;
    let grant = state.resolver.credential_for(&operator, &request).await?;
    assert_eq!(grant.state, AccessState::AvailableShared);
    assert_eq!(
        grant.credential.as_ref().map(Credential::expose),
        Some(test_utils::SHARED_SECRET)
    );

    // Another operator never sees the first operator's override.
    let other = Operator::normal(Uuid::new_v4());
    assert_eq!(
        state.resolver.resolve_by_slug(&other, &request).await?,
        AccessState::AvailableShared
    );
    Ok(())
}

#[tokio::test]
async fn missing_configuration_resolves_to_no_access() -> Result<()> {
    let (state, db) = compose_engine(Arc::new(StaticDiscovery::default())).await?;
    insert_provider(&db, shared_provider("openai", test_utils::chat_map())).await?;
    let operator = Operator::normal(Uuid::new_v4());

    let unknown_provider = AccessRequest::provider("does-not-exist");
    assert_eq!(
        state.resolver.resolve_by_slug(&operator, &unknown_provider).await?,
        AccessState::NoAccess
    );

    let unknown_model = AccessRequest::provider("openai").model("gpt-unknown");
    assert_eq!(
        state.resolver.resolve_by_slug(&operator, &unknown_model).await?,
        AccessState::NoAccess
    );

    let unsupported = AccessRequest::provider("openai").capability(Capability::Audio);
    assert_eq!(
        state.resolver.resolve_by_slug(&operator, &unsupported).await?,
        AccessState::NoAccess
    );

    let grant = state
        .resolver
        .credential_for(&operator, &unknown_provider)
        .await?;
    assert!(grant.credential.is_none());
    Ok(())
}

#[tokio::test]
async fn requested_inactive_model_is_disabled() -> Result<()> {
    let (state, db) = compose_engine(Arc::new(StaticDiscovery::default())).await?;
    insert_provider(&db, shared_provider("openai", test_utils::chat_map())).await?;
    insert_model(&db, "openai", Capability::Chat, "gpt-4o", true).await?;
    insert_model(&db, "openai", Capability::Chat, "gpt-4o-mini", false).await?;

    let operator = Operator::super_operator(Uuid::new_v4());
    let request = AccessRequest::provider("openai")
        .capability(Capability::Chat)
        .model("gpt-4o-mini");

    assert_eq!(
        state.resolver.resolve_by_slug(&operator, &request).await?,
        AccessState::Disabled
    );
    Ok(())
}

#[tokio::test]
async fn available_providers_lists_state_and_active_model() -> Result<()> {
    let (state, db) = compose_engine(Arc::new(StaticDiscovery::default())).await?;
    insert_provider(&db, shared_provider("openai", test_utils::chat_map())).await?;
    let mut image_only = shared_provider(
        "stability",
        CapabilityMap::new().with(
            Capability::Image,
            CapabilitySupport::fixed(["stable-image-core"]),
        ),
    );
    image_only.allow_shared_for_operators = false;
    insert_provider(&db, image_only).await?;
    insert_model(&db, "openai", Capability::Chat, "gpt-4o", true).await?;

    let operator = Operator::normal(Uuid::new_v4());

    let chat = state
        .resolver
        .available_providers(&operator, Capability::Chat)
        .await?;
    assert_eq!(chat.len(), 1);
    assert_eq!(chat[0].slug, "openai");
    assert_eq!(chat[0].state, AccessState::AvailableShared);
    assert_eq!(chat[0].active_model.as_deref(), Some("gpt-4o"));

    let image = state
        .resolver
        .available_providers(&operator, Capability::Image)
        .await?;
    assert_eq!(image.len(), 1);
    assert_eq!(image[0].slug, "stability");
    assert_eq!(image[0].state, AccessState::NoAccess);
    assert!(image[0].active_model.is_none());
    Ok(())
}

#[tokio::test]
async fn super_operator_without_shared_credential_uses_personal_override() -> Result<()> {
    let (state, db) = compose_engine(Arc::new(StaticDiscovery::default())).await?;
    let mut unshared = shared_provider("openai", test_utils::chat_map());
    unshared.shared_credential_ciphertext = None;
    insert_provider(&db, unshared).await?;

    let operator = Operator::super_operator(Uuid::new_v4());
    let request = AccessRequest::provider("openai");

    assert_eq!(
        state.resolver.resolve_by_slug(&operator, &request).await?,
        AccessState::NoAccess
    );
    let listing = state
        .resolver
        .available_providers(&operator, Capability::Chat)
        .await?;
    assert_eq!(listing[0].state, AccessState::NoAccess);

    state
        .service
        .set_override(operator.id, "openai", true, Some(Credential::new("sk-mine")))
        .await?;

    let grant = state.resolver.credential_for(&operator, &request).await?;
    assert_eq!(grant.state, AccessState::AvailablePersonal);
    assert_eq!(
        grant.credential.as_ref().map(Credential::expose),
        Some("sk-mine")
    );
    let listing = state
        .resolver
        .available_providers(&operator, Capability::Chat)
        .await?;
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].state, AccessState::AvailablePersonal);
    Ok(())
}
