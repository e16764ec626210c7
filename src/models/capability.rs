//! Capability kinds and the typed per-provider capability map.
//!
//! A provider declares, for each capability it knows about, whether the
//! capability is supported, whether its models are discovered dynamically from
//! the vendor, and (for statically catalogued capabilities) which model
//! identifiers it offers. The map is validated when it is written so readers
//! never interpret it ad hoc.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Category of AI function a provider can expose.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    #[sea_orm(string_value = "chat")]
    Chat,
    #[sea_orm(string_value = "content")]
    Content,
    #[sea_orm(string_value = "image")]
    Image,
    #[sea_orm(string_value = "audio")]
    Audio,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Chat,
        Capability::Content,
        Capability::Image,
        Capability::Audio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Chat => "chat",
            Capability::Content => "content",
            Capability::Image => "image",
            Capability::Audio => "audio",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = CapabilityMapError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|capability| capability.as_str() == value)
            .ok_or_else(|| CapabilityMapError::UnknownCapability {
                value: value.to_string(),
            })
    }
}

/// Declared support for one capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySupport {
    pub supported: bool,
    /// Models are listed by querying the vendor rather than declared here.
    #[serde(default)]
    pub dynamic_models: bool,
    /// Statically catalogued model identifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
}

impl CapabilitySupport {
    pub fn dynamic() -> Self {
        Self {
            supported: true,
            dynamic_models: true,
            models: Vec::new(),
        }
    }

    pub fn fixed<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            supported: true,
            dynamic_models: false,
            models: models.into_iter().map(Into::into).collect(),
        }
    }
}

/// Errors raised while parsing or validating a capability map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityMapError {
    #[error("unknown capability '{value}'")]
    UnknownCapability { value: String },
    #[error("capability map is malformed: {message}")]
    Malformed { message: String },
    #[error("capability '{capability}' is unsupported but enables dynamic model discovery")]
    UnsupportedWithDiscovery { capability: Capability },
    #[error("capability '{capability}' is unsupported but declares models")]
    UnsupportedWithModels { capability: Capability },
    #[error("capability '{capability}' declares an empty model identifier")]
    EmptyModelIdentifier { capability: Capability },
    #[error("capability '{capability}' declares model '{identifier}' more than once")]
    DuplicateModelIdentifier {
        capability: Capability,
        identifier: String,
    },
}

/// Closed mapping from capability kind to its declared support.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityMap(BTreeMap<Capability, CapabilitySupport>);

impl CapabilityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, capability: Capability, support: CapabilitySupport) -> Self {
        self.0.insert(capability, support);
        self
    }

    pub fn get(&self, capability: Capability) -> Option<&CapabilitySupport> {
        self.0.get(&capability)
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.get(capability).is_some_and(|support| support.supported)
    }

    /// Supported capabilities with their declarations, in capability order.
    pub fn supported(&self) -> impl Iterator<Item = (Capability, &CapabilitySupport)> {
        self.0
            .iter()
            .filter(|(_, support)| support.supported)
            .map(|(capability, support)| (*capability, support))
    }

    /// Checks the structural rules every stored map must satisfy.
    pub fn validate(&self) -> Result<(), CapabilityMapError> {
        for (capability, support) in &self.0 {
            let capability = *capability;
            if !support.supported {
                if support.dynamic_models {
                    return Err(CapabilityMapError::UnsupportedWithDiscovery { capability });
                }
                if !support.models.is_empty() {
                    return Err(CapabilityMapError::UnsupportedWithModels { capability });
                }
                continue;
            }

            let mut seen = HashSet::new();
            for identifier in &support.models {
                if identifier.trim().is_empty() {
                    return Err(CapabilityMapError::EmptyModelIdentifier { capability });
                }
                if !seen.insert(identifier.as_str()) {
                    return Err(CapabilityMapError::DuplicateModelIdentifier {
                        capability,
                        identifier: identifier.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Parses and validates a stored JSON document.
    pub fn from_json(value: &Json) -> Result<Self, CapabilityMapError> {
        let map: Self = serde_json::from_value(value.clone()).map_err(|err| {
            CapabilityMapError::Malformed {
                message: err.to_string(),
            }
        })?;
        map.validate()?;
        Ok(map)
    }

    pub fn to_json(&self) -> Json {
        // A BTreeMap of plain structs always serializes.
        serde_json::to_value(self).unwrap_or_else(|_| Json::Object(Default::default()))
    }
}
