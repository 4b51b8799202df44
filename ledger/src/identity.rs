//! Client credentials: the node's registry of known callers and the relayer's wallet.
//!
//! Both use the same enrollment document:
//! `{"mspId": "RelayerMSP", "id": "x509::CN=relayer", "credential": "<secret>"}`.

use crate::models::ClientIdentity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Request header carrying the caller's credential.
pub const CREDENTIAL_HEADER: &str = "X-CLIENT-CREDENTIAL";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("cannot read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("invalid enrollment document {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },

    #[error("identity {label} not found in wallet at {path}")]
    Missing { label: String, path: PathBuf },

    #[error("credential registered twice")]
    Duplicate,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub msp_id: String,
    pub id: String,
    pub credential: String,
}

impl Enrollment {
    pub fn identity(&self) -> ClientIdentity {
        ClientIdentity::new(&self.msp_id, &self.id)
    }
}

impl std::fmt::Debug for Enrollment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enrollment")
            .field("msp_id", &self.msp_id)
            .field("id", &self.id)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// Credential → identity lookup used by the gateway.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    by_credential: HashMap<String, ClientIdentity>,
}

impl IdentityRegistry {
    pub fn from_enrollments(enrollments: Vec<Enrollment>) -> Result<Self, IdentityError> {
        let mut by_credential = HashMap::with_capacity(enrollments.len());
        for e in enrollments {
            let identity = e.identity();
            if by_credential.insert(e.credential, identity).is_some() {
                return Err(IdentityError::Duplicate);
            }
        }
        Ok(Self { by_credential })
    }

    /// Load a JSON array of enrollments.
    pub fn load(path: &Path) -> Result<Self, IdentityError> {
        let raw = std::fs::read(path).map_err(|source| IdentityError::Io { path: path.to_path_buf(), source })?;
        let enrollments: Vec<Enrollment> =
            serde_json::from_slice(&raw).map_err(|source| IdentityError::Parse { path: path.to_path_buf(), source })?;
        Self::from_enrollments(enrollments)
    }

    pub fn resolve(&self, credential: &str) -> Option<&ClientIdentity> {
        self.by_credential.get(credential)
    }

    pub fn len(&self) -> usize {
        self.by_credential.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_credential.is_empty()
    }
}

/// File-system wallet: one `<label>.id` enrollment document per identity.
#[derive(Debug, Clone)]
pub struct Wallet {
    dir: PathBuf,
}

impl Wallet {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn get(&self, label: &str) -> Result<Enrollment, IdentityError> {
        let path = self.dir.join(format!("{label}.id"));
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IdentityError::Missing { label: label.to_string(), path: self.dir.clone() });
            }
            Err(source) => return Err(IdentityError::Io { path, source }),
        };
        serde_json::from_slice(&raw).map_err(|source| IdentityError::Parse { path, source })
    }

    pub fn put(&self, label: &str, enrollment: &Enrollment) -> Result<(), IdentityError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| IdentityError::Io { path: self.dir.clone(), source })?;
        let path = self.dir.join(format!("{label}.id"));
        let bytes = serde_json::to_vec_pretty(enrollment).map_err(|source| IdentityError::Parse { path: path.clone(), source })?;
        std::fs::write(&path, bytes).map_err(|source| IdentityError::Io { path, source })
    }
}
