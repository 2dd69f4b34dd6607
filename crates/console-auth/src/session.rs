//! Session state
//!
//! `SessionStore` is the single owner of the authenticated session. It keeps
//! an in-memory snapshot mirrored into tab-scoped storage so that a reload can
//! restore a still-valid session. Providers write to it, the HTTP client reads
//! from it; neither imports the other.

use crate::claims::Credential;
use crate::config::ProviderKind;
use crate::storage::{is_identity_sdk_key, keys, KeyValueStore};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// The authenticated session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Whether a login completed
    pub authenticated: bool,

    /// Active application credential
    pub credential: Option<Credential>,

    /// Backend user id
    pub user_id: Option<String>,

    /// Provider that created the session
    pub provider_kind: Option<ProviderKind>,

    /// Raw federated token the credential was minted from
    pub original_federated_token: Option<String>,
}

/// Owner of the session snapshot and its storage mirror.
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    state: RwLock<Session>,
    /// Bumped whenever a credential is installed or restored.
    generation: AtomicU64,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.snapshot();
        f.debug_struct("SessionStore")
            .field("authenticated", &session.authenticated)
            .field("provider_kind", &session.provider_kind)
            .field("credential", &session.credential.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl SessionStore {
    /// Create an empty session over the given storage.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            state: RwLock::new(Session::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Underlying storage.
    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.storage
    }

    /// Copy of the current session.
    pub fn snapshot(&self) -> Session {
        self.read().clone()
    }

    /// Whether the session is authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.read().authenticated
    }

    /// Counter identifying the installed credential.
    ///
    /// Changes on every install and successful restore; clearing keeps it.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Current bearer token, reloading from storage if memory has none.
    pub fn token(&self) -> Option<String> {
        if let Some(credential) = self.read().credential.as_ref() {
            return Some(credential.token.clone());
        }

        let token = self.storage.get(keys::TOKEN)?;
        debug!("Credential reloaded from storage");
        let credential = self.stored_credential(token.clone());
        self.write().credential = Some(credential);
        Some(token)
    }

    /// Current credential.
    pub fn credential(&self) -> Option<Credential> {
        self.read().credential.clone()
    }

    /// Backend user id.
    pub fn user_id(&self) -> Option<String> {
        self.read()
            .user_id
            .clone()
            .or_else(|| self.storage.get(keys::USER_ID))
    }

    /// Provider that owns the session.
    pub fn provider_kind(&self) -> Option<ProviderKind> {
        self.read().provider_kind.or_else(|| {
            self.storage
                .get(keys::AUTH_PROVIDER)
                .and_then(|s| ProviderKind::parse(&s))
        })
    }

    /// Raw federated token, if one was stored.
    pub fn original_token(&self) -> Option<String> {
        self.read()
            .original_federated_token
            .clone()
            .or_else(|| self.storage.get(keys::ORIGINAL_TOKEN))
    }

    /// Install a credential and mark the session authenticated.
    ///
    /// The previous credential, if any, is replaced.
    pub fn install(&self, credential: Credential, user_id: Option<String>, kind: ProviderKind) {
        self.storage.set(keys::TOKEN, &credential.token);
        set_or_remove_time(&*self.storage, keys::TOKEN_EXPIRATION, credential.expires_at);
        set_or_remove_time(
            &*self.storage,
            keys::REFRESH_TOKEN_EXPIRATION,
            credential.refresh_expires_at,
        );
        match user_id.as_deref() {
            Some(id) => self.storage.set(keys::USER_ID, id),
            None => self.storage.remove(keys::USER_ID),
        }
        self.storage.set(keys::AUTH_PROVIDER, kind.as_str());
        self.storage.set(keys::IS_AUTHENTICATED, "true");

        let mut state = self.write();
        state.authenticated = true;
        state.credential = Some(credential);
        state.user_id = user_id;
        state.provider_kind = Some(kind);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Persist the raw federated token a credential is minted from.
    pub fn set_original_token(&self, token: &str, refresh_expires_at: Option<DateTime<Utc>>) {
        self.storage.set(keys::ORIGINAL_TOKEN, token);
        set_or_remove_time(&*self.storage, keys::REFRESH_TOKEN_EXPIRATION, refresh_expires_at);
        self.write().original_federated_token = Some(token.to_string());
    }

    /// Drop the federated token only.
    pub fn discard_original_token(&self) {
        self.storage.remove(keys::ORIGINAL_TOKEN);
        self.write().original_federated_token = None;
    }

    /// Restore the session from storage.
    ///
    /// Returns `true` when storage holds an authenticated session with a
    /// credential; the in-memory snapshot is replaced either way.
    pub fn restore(&self) -> bool {
        let token = self.storage.get(keys::TOKEN);
        let authenticated = self
            .storage
            .get(keys::IS_AUTHENTICATED)
            .map_or(false, |v| v == "true")
            && token.is_some();

        let session = Session {
            authenticated,
            credential: token.map(|t| self.stored_credential(t)),
            user_id: self.storage.get(keys::USER_ID),
            provider_kind: self
                .storage
                .get(keys::AUTH_PROVIDER)
                .and_then(|s| ProviderKind::parse(&s)),
            original_federated_token: self.storage.get(keys::ORIGINAL_TOKEN),
        };

        *self.write() = session;
        if authenticated {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        debug!(authenticated, "Session restored from storage");
        authenticated
    }

    /// Clear every session key. Safe to call on an empty session.
    pub fn clear(&self) {
        for key in keys::ALL {
            self.storage.remove(key);
        }
        *self.write() = Session::default();
    }

    /// Clear the session and every identity-SDK artifact in storage.
    ///
    /// Artifacts of more than one provider can coexist after provider
    /// switches, so all of them go.
    pub fn purge_all(&self) {
        self.clear();
        for key in self.storage.keys() {
            if is_identity_sdk_key(&key) {
                self.storage.remove(&key);
            }
        }
    }

    fn stored_credential(&self, token: String) -> Credential {
        let mut credential = Credential::from_token(token);
        if credential.expires_at.is_none() {
            credential.expires_at = get_time(&*self.storage, keys::TOKEN_EXPIRATION);
        }
        credential.with_refresh_expiry(get_time(&*self.storage, keys::REFRESH_TOKEN_EXPIRATION))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Session> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Session> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn set_or_remove_time(storage: &dyn KeyValueStore, key: &str, value: Option<DateTime<Utc>>) {
    match value {
        Some(at) => storage.set(key, &at.timestamp().to_string()),
        None => storage.remove(key),
    }
}

fn get_time(storage: &dyn KeyValueStore, key: &str) -> Option<DateTime<Utc>> {
    storage
        .get(key)
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}
