//! Tab-scoped key/value storage
//!
//! Every component reads and writes the same store with no transactional
//! guarantee, so reads are treated as the best current snapshot.

use std::collections::HashMap;
use std::sync::RwLock;

/// Storage keys owned by the session.
pub mod keys {
    /// Application bearer credential
    pub const TOKEN: &str = "token";
    /// Credential expiry (Unix seconds)
    pub const TOKEN_EXPIRATION: &str = "tokenExpiration";
    /// Backend user id
    pub const USER_ID: &str = "userId";
    /// "true" while the session is authenticated
    pub const IS_AUTHENTICATED: &str = "isAuthenticated";
    /// Raw federated identity token
    pub const ORIGINAL_TOKEN: &str = "originalToken";
    /// Refresh-capability expiry (Unix seconds)
    pub const REFRESH_TOKEN_EXPIRATION: &str = "refreshTokenExpiration";
    /// Provider kind that owns the session
    pub const AUTH_PROVIDER: &str = "authProvider";

    /// All session keys.
    pub const ALL: [&str; 7] = [
        TOKEN,
        TOKEN_EXPIRATION,
        USER_ID,
        IS_AUTHENTICATED,
        ORIGINAL_TOKEN,
        REFRESH_TOKEN_EXPIRATION,
        AUTH_PROVIDER,
    ];
}

/// Key prefix used by the enterprise-directory SDK cache.
pub const ENTERPRISE_SDK_PREFIX: &str = "msal.";

/// Key prefix used by the hosted-UI SDK cache.
pub const HOSTED_UI_SDK_PREFIX: &str = "CognitoIdentityServiceProvider.";

/// Whether a key follows one of the identity SDK naming conventions.
pub fn is_identity_sdk_key(key: &str) -> bool {
    key.starts_with(ENTERPRISE_SDK_PREFIX)
        || key.contains("login.windows.net")
        || key.contains("login.microsoftonline.com")
        || key.contains("CognitoIdentityServiceProvider")
        || key.starts_with("amplify-")
}

/// Synchronous key/value storage.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value.
    fn set(&self, key: &str, value: &str);

    /// Remove a value. Removing a missing key is a no-op.
    fn remove(&self, key: &str);

    /// All keys currently stored.
    fn keys(&self) -> Vec<String>;

    /// Remove every key.
    fn clear(&self) {
        for key in self.keys() {
            self.remove(&key);
        }
    }
}

/// In-process storage with the lifetime of the owning session.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, String>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, String>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.write().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.write().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    fn clear(&self) {
        self.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        storage.set(keys::TOKEN, "abc");

        assert_eq!(storage.get(keys::TOKEN).as_deref(), Some("abc"));
        storage.remove(keys::TOKEN);
        storage.remove(keys::TOKEN);
        assert!(storage.get(keys::TOKEN).is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_identity_sdk_keys() {
        assert!(is_identity_sdk_key("msal.client-1.idtoken"));
        assert!(is_identity_sdk_key(
            "uid.tid-login.windows.net-idtoken-client-1"
        ));
        assert!(is_identity_sdk_key(
            "CognitoIdentityServiceProvider.client-1.LastAuthUser"
        ));
        assert!(is_identity_sdk_key("amplify-signin-with-hostedUI"));

        assert!(!is_identity_sdk_key(keys::TOKEN));
        assert!(!is_identity_sdk_key("datasetFilter"));
    }
}
