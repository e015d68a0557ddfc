//! Key material acquisition.
//!
//! The controller needs exactly two distinct keys: one for authenticating
//! cluster members ("worker-auth") and one for encrypting secrets at rest ("root").

use thiserror::Error;

use crate::config::schema::{KmsConfig, KMS_PURPOSE_ROOT, KMS_PURPOSE_WORKER_AUTH};

/// Number of KMS blocks the controller requires.
pub const REQUIRED_KMS_COUNT: usize = 2;

/// Minimum key length in bytes.
pub const MIN_KEY_BYTES: usize = 32;

/// Errors raised while acquiring key material.
#[derive(Debug, Error)]
pub enum KmsError {
    #[error("expected {expected} KMS blocks, found {found}")]
    WrongCount { expected: usize, found: usize },

    #[error("unknown KMS purpose {0:?}")]
    UnknownPurpose(String),

    #[error("duplicate KMS block for purpose {0:?}")]
    DuplicatePurpose(String),

    #[error("no KMS block for purpose {0:?}")]
    MissingPurpose(&'static str),

    #[error("KMS block {purpose:?}: invalid key material: {reason}")]
    InvalidKey { purpose: String, reason: String },

    #[error("KMS keys for \"root\" and \"worker-auth\" must be distinct")]
    KeysNotDistinct,
}

/// Decoded key bytes. Never printed.
pub struct KeyMaterial {
    key_id: String,
    bytes: Vec<u8>,
}

impl KeyMaterial {
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_id", &self.key_id)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

/// The controller's acquired keys.
#[derive(Debug)]
pub struct KmsSet {
    pub root: KeyMaterial,
    pub worker_auth: KeyMaterial,
}

fn decode(config: &KmsConfig) -> Result<KeyMaterial, KmsError> {
    let bytes = hex::decode(config.key.trim()).map_err(|e| KmsError::InvalidKey {
        purpose: config.purpose.clone(),
        reason: e.to_string(),
    })?;
    if bytes.len() < MIN_KEY_BYTES {
        return Err(KmsError::InvalidKey {
            purpose: config.purpose.clone(),
            reason: format!("need at least {} bytes, got {}", MIN_KEY_BYTES, bytes.len()),
        });
    }
    let key_id = if config.key_id.is_empty() {
        config.purpose.clone()
    } else {
        config.key_id.clone()
    };
    Ok(KeyMaterial { key_id, bytes })
}

/// Acquire the controller's key material from the configured blocks.
pub fn setup_kmses(configs: &[KmsConfig], required: usize) -> Result<KmsSet, KmsError> {
    if configs.len() != required {
        return Err(KmsError::WrongCount {
            expected: required,
            found: configs.len(),
        });
    }

    let mut root = None;
    let mut worker_auth = None;

    for config in configs {
        let slot = match config.purpose.as_str() {
            KMS_PURPOSE_ROOT => &mut root,
            KMS_PURPOSE_WORKER_AUTH => &mut worker_auth,
            other => return Err(KmsError::UnknownPurpose(other.to_string())),
        };
        if slot.is_some() {
            return Err(KmsError::DuplicatePurpose(config.purpose.clone()));
        }
        *slot = Some(decode(config)?);
    }

    let root = root.ok_or(KmsError::MissingPurpose(KMS_PURPOSE_ROOT))?;
    let worker_auth = worker_auth.ok_or(KmsError::MissingPurpose(KMS_PURPOSE_WORKER_AUTH))?;

    if root.as_bytes() == worker_auth.as_bytes() {
        return Err(KmsError::KeysNotDistinct);
    }

    tracing::info!(
        root_key_id = %root.key_id(),
        worker_auth_key_id = %worker_auth.key_id(),
        "KMS keys acquired"
    );

    Ok(KmsSet { root, worker_auth })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(purpose: &str, fill: u8) -> KmsConfig {
        KmsConfig {
            purpose: purpose.into(),
            key_id: String::new(),
            key: hex::encode([fill; 32]),
        }
    }

    #[test]
    fn acquires_two_distinct_keys() {
        let set = setup_kmses(
            &[block("root", 1), block("worker-auth", 2)],
            REQUIRED_KMS_COUNT,
        )
        .unwrap();
        assert_eq!(set.root.key_id(), "root");
        assert_eq!(set.worker_auth.as_bytes(), &[2u8; 32]);
    }

    #[test]
    fn rejects_wrong_count() {
        assert!(matches!(
            setup_kmses(&[block("root", 1)], REQUIRED_KMS_COUNT),
            Err(KmsError::WrongCount { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn rejects_duplicate_purpose() {
        assert!(matches!(
            setup_kmses(&[block("root", 1), block("root", 2)], REQUIRED_KMS_COUNT),
            Err(KmsError::DuplicatePurpose(_))
        ));
    }

    #[test]
    fn rejects_identical_material() {
        assert!(matches!(
            setup_kmses(&[block("root", 7), block("worker-auth", 7)], REQUIRED_KMS_COUNT),
            Err(KmsError::KeysNotDistinct)
        ));
    }

    #[test]
    fn rejects_short_or_bad_hex() {
        let mut short = block("root", 1);
        short.key = "abcd".into();
        assert!(matches!(
            setup_kmses(&[short, block("worker-auth", 2)], REQUIRED_KMS_COUNT),
            Err(KmsError::InvalidKey { .. })
        ));

        let mut bad = block("root", 1);
        bad.key = "zz".into();
        assert!(setup_kmses(&[bad, block("worker-auth", 2)], REQUIRED_KMS_COUNT).is_err());
    }

    #[test]
    fn debug_redacts_key_bytes() {
        let set = setup_kmses(&[block("root", 1), block("worker-auth", 2)], 2).unwrap();
        let printed = format!("{:?}", set);
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("0101"));
    }
}
