//! Credential sealing using AES-256-GCM.
//!
//! Shared provider credentials and personal operator credentials are stored
//! sealed. Each ciphertext is bound through additional authenticated data to
//! the record it belongs to, so a sealed value copied onto another provider or
//! operator fails to open.

#![allow(deprecated)]

use std::fmt;

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
};
use base64::Engine as _;
use thiserror::Error;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

const VERSION_SEALED: u8 = 0x01;
const VERSION_FIELD_LEN: usize = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const MIN_SEALED_LEN: usize = VERSION_FIELD_LEN + NONCE_LEN + TAG_LEN;
const KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("invalid ciphertext format")]
    InvalidFormat,
    #[error("empty ciphertext")]
    EmptyCiphertext,
}

/// Secure wrapper for encryption keys with zeroization
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ZeroizingKey(Vec<u8>);

pub type CryptoKey = ZeroizingKey;

impl CryptoKey {
    pub fn new(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(ZeroizingKey(bytes))
    }

    /// Decodes a standard base64 key as found in configuration.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("not valid base64: {e}")))?;
        Self::new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ZeroizingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ZeroizingKey(<redacted>)")
    }
}

/// Record a sealed credential is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialScope<'a> {
    /// Provider-wide credential managed by the super-operator.
    Shared { provider_slug: &'a str },
    /// An operator's own credential for one provider.
    Personal {
        operator_id: Uuid,
        provider_slug: &'a str,
    },
}

impl CredentialScope<'_> {
    fn aad(&self) -> String {
        match self {
            CredentialScope::Shared { provider_slug } => format!("provider:{provider_slug}"),
            CredentialScope::Personal {
                operator_id,
                provider_slug,
            } => format!("override:{operator_id}:{provider_slug}"),
        }
    }
}

/// Plaintext credential. Never printed, wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Encrypt bytes using AES-256-GCM
pub fn encrypt_bytes(
    key: &CryptoKey,
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let mut ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut result = Vec::with_capacity(VERSION_FIELD_LEN + NONCE_LEN + ciphertext.len());
    result.push(VERSION_SEALED);
    result.extend_from_slice(&nonce);
    result.append(&mut ciphertext);

    Ok(result)
}

/// Decrypt bytes using AES-256-GCM
pub fn decrypt_bytes(
    key: &CryptoKey,
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.is_empty() {
        return Err(CryptoError::EmptyCiphertext);
    }
    if ciphertext[0] != VERSION_SEALED || ciphertext.len() < MIN_SEALED_LEN {
        return Err(CryptoError::InvalidFormat);
    }

    let nonce = Nonce::from_slice(&ciphertext[VERSION_FIELD_LEN..VERSION_FIELD_LEN + NONCE_LEN]);
    let tag_and_ct = &ciphertext[VERSION_FIELD_LEN + NONCE_LEN..];
    debug_assert!(tag_and_ct.len() >= TAG_LEN);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    cipher
        .decrypt(
            nonce,
            Payload {
                msg: tag_and_ct,
                aad,
            },
        )
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

/// Seals a credential for storage against the given scope.
pub fn seal_credential(
    key: &CryptoKey,
    scope: CredentialScope<'_>,
    credential: &Credential,
) -> Result<Vec<u8>, CryptoError> {
    encrypt_bytes(key, scope.aad().as_bytes(), credential.expose().as_bytes())
}

/// Opens a stored credential previously sealed for `scope`.
pub fn open_credential(
    key: &CryptoKey,
    scope: CredentialScope<'_>,
    sealed: &[u8],
) -> Result<Credential, CryptoError> {
    let bytes = decrypt_bytes(key, scope.aad().as_bytes(), sealed)?;
    String::from_utf8(bytes)
        .map(Credential)
        .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> CryptoKey {
        CryptoKey::new(vec![7u8; 32]).expect("valid test key")
    }

    #[test]
    fn sealed_credential_opens_in_its_own_scope() {
        let key = test_key();
        let scope = CredentialScope::Shared {
            provider_slug: "openai",
        };
        let sealed = seal_credential(&key, scope, &Credential::new("sk-shared")).unwrap();

        assert_ne!(sealed, b"sk-shared".to_vec());
        let opened = open_credential(&key, scope, &sealed).unwrap();
        assert_eq!(opened.expose(), "sk-shared");
    }

    #[test]
    fn sealed_credential_is_bound_to_provider_and_operator() {
        let key = test_key();
        let operator_id = Uuid::new_v4();
        let personal = CredentialScope::Personal {
            operator_id,
            provider_slug: "openai",
        };
        let sealed = seal_credential(&key, personal, &Credential::new("sk-mine")).unwrap();

        let other_operator = CredentialScope::Personal {
            operator_id: Uuid::new_v4(),
            provider_slug: "openai",
        };
        let other_provider = CredentialScope::Personal {
            operator_id,
            provider_slug: "anthropic",
        };
        let shared = CredentialScope::Shared {
            provider_slug: "openai",
        };
        assert!(open_credential(&key, other_operator, &sealed).is_err());
        assert!(open_credential(&key, other_provider, &sealed).is_err());
        assert!(open_credential(&key, shared, &sealed).is_err());
    }

    #[test]
    fn modified_ciphertext_fails() {
        let key = test_key();
        let mut sealed = encrypt_bytes(&key, b"aad", b"secret").unwrap();
        sealed[13] ^= 0x01;
        assert!(decrypt_bytes(&key, b"aad", &sealed).is_err());
    }

    #[test]
    fn nonces_are_unique_per_seal() {
        let key = test_key();
        let first = encrypt_bytes(&key, b"aad", b"secret").unwrap();
        let second = encrypt_bytes(&key, b"aad", b"secret").unwrap();
        assert_ne!(&first[1..13], &second[1..13]);
    }

    #[test]
    fn unsealed_payloads_are_rejected() {
        let key = test_key();
        assert!(matches!(
            decrypt_bytes(&key, b"aad", b""),
            Err(CryptoError::EmptyCiphertext)
        ));
        assert!(matches!(
            decrypt_bytes(&key, b"aad", b"plain-token"),
            Err(CryptoError::InvalidFormat)
        ));
        assert!(matches!(
            decrypt_bytes(&key, b"aad", &[VERSION_SEALED, 0x02]),
            Err(CryptoError::InvalidFormat)
        ));
    }

    #[test]
    fn key_must_be_32_bytes_of_base64() {
        assert!(CryptoKey::new(vec![0u8; 16]).is_err());
        assert!(CryptoKey::from_base64("not base64!").is_err());

        let encoded = base64::engine::general_purpose::STANDARD.encode([1u8; 32]);
        assert!(CryptoKey::from_base64(&encoded).is_ok());
    }

    #[test]
    fn debug_output_is_redacted() {
        let credential = Credential::new("sk-very-secret");
        assert!(!format!("{credential:?}").contains("sk-very-secret"));
        assert!(!format!("{:?}", test_key()).contains('7'));
    }
}
