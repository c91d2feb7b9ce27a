//! Static credential store.
//!
//! Records are loaded once at startup from a TOML file of `[[user]]` tables
//! and never mutated afterwards — there is no hot reload.  Verification is a
//! case-sensitive exact comparison performed in constant time; unknown user
//! and wrong password are deliberately indistinguishable to the caller.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::AuthError;

/// A single user record, immutable after load.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialRecord {
    pub user_id: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
struct CredentialFile {
    #[serde(default, rename = "user")]
    users: Vec<CredentialRecord>,
}

/// Read-only map of user id to credential record.
#[derive(Debug)]
pub struct CredentialStore {
    users: HashMap<String, CredentialRecord>,
}

impl CredentialStore {
    /// Load the full credential set from a TOML file.
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let contents = std::fs::read_to_string(path).map_err(|source| AuthError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: CredentialFile =
            toml::from_str(&contents).map_err(|source| AuthError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let store = Self::from_records(file.users)?;
        tracing::info!(users = store.len(), "credential store loaded");
        Ok(store)
    }

    /// Build a store from in-memory records. Duplicate user ids are rejected.
    pub fn from_records(records: Vec<CredentialRecord>) -> Result<Self, AuthError> {
        let mut users = HashMap::with_capacity(records.len());
        for record in records {
            if users.insert(record.user_id.clone(), record).is_some() {
                return Err(AuthError::ConfigurationMissing(
                    "credential file contains a duplicate user id".to_string(),
                ));
            }
        }
        Ok(Self { users })
    }

    /// Check a user id + password pair. Returns the record on success.
    pub fn verify(&self, user_id: &str, password: &str) -> Result<&CredentialRecord, AuthError> {
        match self.users.get(user_id) {
            Some(record) => {
                if constant_time_eq(record.password.as_bytes(), password.as_bytes()) {
                    Ok(record)
                } else {
                    Err(AuthError::UnknownUser)
                }
            }
            None => {
                // Dummy comparison so a missing user takes the same time as
                // a present one with a wrong password.
                let _ = constant_time_eq(password.as_bytes(), b"--------");
                Err(AuthError::UnknownUser)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
