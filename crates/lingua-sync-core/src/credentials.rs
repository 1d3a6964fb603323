// SPDX-License-Identifier: AGPL-3.0
// Lingua Sync Core - Secure credential storage
//
// Secrets live in the OS keychain (Secret Service, macOS Keychain,
// Windows Credential Manager) behind a small trait so tests and headless
// hosts can substitute an in-memory store.

use crate::types::AppError;
use std::collections::HashMap;
use std::sync::RwLock;

/// Key/value secret storage addressed by a (service, account) pair
pub trait CredentialStore: Send + Sync {
    /// Look up a secret; absence is not an error
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, AppError>;

    /// Store a secret, replacing any previous value under the same key
    fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), AppError>;

    /// Delete a secret; deleting a missing entry is a no-op
    fn delete(&self, service: &str, account: &str) -> Result<(), AppError>;
}

/// OS keychain-backed store
pub struct KeyringStore;

impl KeyringStore {
    pub fn new() -> Self {
        Self
    }

    fn entry(service: &str, account: &str) -> Result<keyring::Entry, AppError> {
        keyring::Entry::new(service, account)
            .map_err(|e| AppError::CredentialStore(format!("Keychain unavailable: {}", e)))
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, AppError> {
        match Self::entry(service, account)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AppError::CredentialStore(format!(
                "Failed to read secret: {}",
                e
            ))),
        }
    }

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), AppError> {
        Self::entry(service, account)?
            .set_password(secret)
            .map_err(|e| AppError::CredentialStore(format!("Failed to store secret: {}", e)))
    }

    fn delete(&self, service: &str, account: &str) -> Result<(), AppError> {
        match Self::entry(service, account)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AppError::CredentialStore(format!(
                "Failed to delete secret: {}",
                e
            ))),
        }
    }
}

/// In-memory store for tests and hosts without a system keychain
#[derive(Default)]
pub struct MemoryStore {
    secrets: RwLock<HashMap<(String, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, AppError> {
        Ok(self
            .secrets
            .read()
            .unwrap()
            .get(&(service.to_string(), account.to_string()))
            .cloned())
    }

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), AppError> {
        self.secrets
            .write()
            .unwrap()
            .insert((service.to_string(), account.to_string()), secret.to_string());
        Ok(())
    }

    fn delete(&self, service: &str, account: &str) -> Result<(), AppError> {
        self.secrets
            .write()
            .unwrap()
            .remove(&(service.to_string(), account.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("svc", "acct").unwrap(), None);

        store.set("svc", "acct", "secret").unwrap();
        assert_eq!(store.get("svc", "acct").unwrap(), Some("secret".to_string()));

        store.set("svc", "acct", "replaced").unwrap();
        assert_eq!(
            store.get("svc", "acct").unwrap(),
            Some("replaced".to_string())
        );

        store.delete("svc", "acct").unwrap();
        assert_eq!(store.get("svc", "acct").unwrap(), None);
    }

    #[test]
    fn test_memory_store_delete_missing_is_noop() {
        let store = MemoryStore::new();
        store.delete("svc", "missing").unwrap();
    }
}
