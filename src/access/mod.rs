//! # Access Resolution
//!
//! Decides whether and how an operator may use a provider, optionally for a
//! specific capability model. [`resolve`] is the pure decision; the
//! [`AccessResolver`] gathers its inputs cache-first.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{admin_override_setting, capability_model, provider};

pub mod resolver;

pub use resolver::{AccessGrant, AccessRequest, AccessResolver, ProviderAccess};

/// Outcome of an access check. Derived per request, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccessState {
    /// Use the provider's shared credential.
    AvailableShared,
    /// Use the operator's own credential.
    AvailablePersonal,
    NoAccess,
    /// The provider or the requested model is switched off.
    Disabled,
}

impl AccessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessState::AvailableShared => "available_shared",
            AccessState::AvailablePersonal => "available_personal",
            AccessState::NoAccess => "no_access",
            AccessState::Disabled => "disabled",
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(
            self,
            AccessState::AvailableShared | AccessState::AvailablePersonal
        )
    }
}

impl fmt::Display for AccessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The admin operator an access check is made for, as identified upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: Uuid,
    /// Super/full-admin privilege.
    pub is_super: bool,
}

impl Operator {
    pub fn normal(id: Uuid) -> Self {
        Self {
            id,
            is_super: false,
        }
    }

    pub fn super_operator(id: Uuid) -> Self {
        Self { id, is_super: true }
    }
}

/// Computes the access state for one (operator, provider, model) triple.
///
/// Rules apply in order and the first match wins:
/// 1. a requested model that is inactive is `Disabled`;
/// 2. an inactive provider is `Disabled`;
/// 3. a super-operator gets the shared credential when one exists, without
///    consulting their override setting;
/// 4. an active override carrying a personal credential is `AvailablePersonal`;
/// 5. a provider sharing its credential with normal operators is
///    `AvailableShared`;
/// 6. anything else is `NoAccess`.
///
/// `override_setting` must belong to `operator` and `provider` when given.
pub fn resolve(
    operator: &Operator,
    provider: &provider::Model,
    model: Option<&capability_model::Model>,
    override_setting: Option<&admin_override_setting::Model>,
) -> AccessState {
    debug_assert!(override_setting.is_none_or(|setting| {
        setting.operator_id == operator.id && setting.provider_slug == provider.slug
    }));

    if model.is_some_and(|model| !model.is_active) {
        return AccessState::Disabled;
    }
    if !provider.is_active {
        return AccessState::Disabled;
    }
    if operator.is_super && provider.has_shared_credential() {
        return AccessState::AvailableShared;
    }
    if override_setting.is_some_and(|setting| setting.grants_personal_access()) {
        return AccessState::AvailablePersonal;
    }
    if provider.allow_shared_for_operators && provider.has_shared_credential() {
        return AccessState::AvailableShared;
    }
    AccessState::NoAccess
}
