//! Ephemeral backing store for `--dev` mode.
//!
//! Lives in a uniquely named directory under the system temp dir and is
//! removed again when the controller exits.

use std::fs;
use std::path::{Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Login name of the generated admin account.
pub const DEV_ADMIN_LOGIN: &str = "admin";

const GENERATED_PASSWORD_LEN: usize = 20;

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreManifest {
    pub id: Uuid,
    pub admin_login: String,
    pub admin_password: String,
}

#[derive(Debug)]
pub struct DevStore {
    id: Uuid,
    root: PathBuf,
    admin_password: String,
}

impl DevStore {
    pub fn create(admin_password: Option<String>) -> std::io::Result<Self> {
        Self::create_in(&std::env::temp_dir(), admin_password)
    }

    pub fn create_in(base: &Path, admin_password: Option<String>) -> std::io::Result<Self> {
        let id = Uuid::new_v4();
        let root = base.join(format!("broker-dev-{}", id));
        fs::create_dir_all(&root)?;

        let admin_password = admin_password
            .filter(|p| !p.is_empty())
            .unwrap_or_else(generate_password);
        let manifest = StoreManifest {
            id,
            admin_login: DEV_ADMIN_LOGIN.to_string(),
            admin_password: admin_password.clone(),
        };
        let encoded = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(root.join("store.json"), encoded)?;

        tracing::info!(store_id = %id, path = ?root, "Dev store created");
        Ok(Self {
            id,
            root,
            admin_password,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn admin_password(&self) -> &str {
        &self.admin_password
    }

    /// Remove the store. Removing an already missing store succeeds.
    pub fn destroy(&self) -> std::io::Result<()> {
        match fs::remove_dir_all(&self.root) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => {
                tracing::info!(store_id = %self.id, "Dev store destroyed");
                Ok(())
            }
        }
    }
}

fn generate_password() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_writes_manifest_and_destroy_removes_it() {
        let base = tempfile::tempdir().unwrap();
        let store = DevStore::create_in(base.path(), Some("hunter22".into())).unwrap();

        let raw = fs::read(store.path().join("store.json")).unwrap();
        let manifest: StoreManifest = serde_json::from_slice(&raw).unwrap();
        assert_eq!(manifest.admin_password, "hunter22");
        assert_eq!(manifest.id, store.id());

        store.destroy().unwrap();
        assert!(!store.path().exists());
        store.destroy().unwrap();
    }

    #[test]
    fn generates_password_when_absent() {
        let base = tempfile::tempdir().unwrap();
        let store = DevStore::create_in(base.path(), Some(String::new())).unwrap();
        assert_eq!(store.admin_password().len(), GENERATED_PASSWORD_LEN);
        assert!(store.admin_password().chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
