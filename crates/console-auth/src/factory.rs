//! Provider selection
//!
//! `AuthProviderFactory` owns the provider registry. Configuration is
//! supplied already loaded, so construction never races a config fetch.
//! Every configured provider is built at most once; a federated provider
//! whose SDK cannot be built or initialized is recorded as unavailable and
//! is not retried until [`AuthProviderFactory::reset`].

use crate::backend::BackendAuthApi;
use crate::config::{AuthConfig, ProviderKind};
use crate::error::AuthResult;
use crate::federated::{FederatedAuthProvider, IdentitySdkBuilder};
use crate::navigation::Navigator;
use crate::password::PasswordAuthProvider;
use crate::provider::AuthProvider;
use crate::session::SessionStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
struct Registered {
    provider: Arc<dyn AuthProvider>,
    federated: Option<Arc<FederatedAuthProvider>>,
}

/// Builds, caches and selects authentication providers.
pub struct AuthProviderFactory {
    config: AuthConfig,
    session: Arc<SessionStore>,
    backend: Arc<dyn BackendAuthApi>,
    navigator: Arc<dyn Navigator>,
    sdk_builder: Arc<dyn IdentitySdkBuilder>,
    registry: Mutex<HashMap<ProviderKind, Option<Registered>>>,
}

impl std::fmt::Debug for AuthProviderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthProviderFactory")
            .field("default_provider", &self.config.default_provider)
            .field("configured", &self.config.configured_providers())
            .finish()
    }
}

impl AuthProviderFactory {
    /// Create a factory. No provider is built until first requested.
    pub fn new(
        config: AuthConfig,
        session: Arc<SessionStore>,
        backend: Arc<dyn BackendAuthApi>,
        navigator: Arc<dyn Navigator>,
        sdk_builder: Arc<dyn IdentitySdkBuilder>,
    ) -> Self {
        Self {
            config,
            session,
            backend,
            navigator,
            sdk_builder,
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// Factory wired to the HTTP backend and the `openidconnect` SDK adapter.
    #[cfg(feature = "oidc")]
    pub fn with_defaults(
        config: AuthConfig,
        session: Arc<SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> AuthResult<Self> {
        let backend = Arc::new(crate::backend::ReqwestBackend::from_config(&config)?);
        Ok(Self::new(
            config,
            session,
            backend,
            navigator,
            Arc::new(crate::federated::oidc::OidcSdkBuilder),
        ))
    }

    /// The loaded configuration.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// The shared session store.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Whether the configuration for `kind` is complete.
    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        self.config.is_configured(kind)
    }

    /// Every configured provider that could be constructed.
    pub async fn get_all_providers(&self) -> Vec<Arc<dyn AuthProvider>> {
        let mut registry = self.registry.lock().await;
        let mut providers = Vec::new();
        for kind in self.config.configured_providers() {
            if let Some(registered) = self.ensure(&mut registry, kind).await {
                providers.push(registered.provider);
            }
        }
        providers
    }

    /// Provider for `kind`; `None` when unconfigured or unavailable.
    pub async fn get_provider(&self, kind: ProviderKind) -> Option<Arc<dyn AuthProvider>> {
        let mut registry = self.registry.lock().await;
        self.ensure(&mut registry, kind)
            .await
            .map(|registered| registered.provider)
    }

    /// Typed access to a federated provider, e.g. to complete a redirect.
    pub async fn federated(&self, kind: ProviderKind) -> Option<Arc<FederatedAuthProvider>> {
        let mut registry = self.registry.lock().await;
        self.ensure(&mut registry, kind)
            .await
            .and_then(|registered| registered.federated)
    }

    /// The configured default provider, falling back to password.
    pub async fn get_default_provider(&self) -> Arc<dyn AuthProvider> {
        let mut registry = self.registry.lock().await;
        let preferred = self.config.default_provider;

        if let Some(registered) = self.ensure(&mut registry, preferred).await {
            return registered.provider;
        }

        warn!(provider = %preferred, "Default provider unavailable, using password");
        match self.ensure(&mut registry, ProviderKind::Password).await {
            Some(registered) => registered.provider,
            None => self.password_provider().provider,
        }
    }

    /// Provider that owns the current session, if any.
    pub async fn active_provider(&self) -> Option<Arc<dyn AuthProvider>> {
        if !self.session.is_authenticated() && !self.session.restore() {
            return None;
        }
        let kind = self.session.provider_kind()?;
        self.get_provider(kind).await
    }

    /// End the current session after the backend rejected it.
    ///
    /// The owning provider, when already constructed, drops its own state
    /// before the session and identity-SDK keys are purged.
    pub async fn revoke_session(&self) {
        if let Some(kind) = self.session.provider_kind() {
            let registry = self.registry.lock().await;
            if let Some(Some(registered)) = registry.get(&kind) {
                registered.provider.revoke();
            }
        }
        self.session.purge_all();
    }

    /// Drop every cached provider; the next request constructs afresh.
    pub async fn reset(&self) {
        self.registry.lock().await.clear();
        info!("Provider registry reset");
    }

    async fn ensure(
        &self,
        registry: &mut HashMap<ProviderKind, Option<Registered>>,
        kind: ProviderKind,
    ) -> Option<Registered> {
        if let Some(slot) = registry.get(&kind) {
            return slot.clone();
        }

        if !self.is_configured(kind) {
            debug!(provider = %kind, "Provider not configured");
            return None;
        }

        let slot = if kind.is_federated() {
            match self.build_federated(kind).await {
                Ok(provider) => Some(Registered {
                    provider: provider.clone(),
                    federated: Some(provider),
                }),
                Err(e) => {
                    error!(provider = %kind, error = %e, "Provider unavailable");
                    None
                }
            }
        } else {
            Some(self.password_provider())
        };

        registry.insert(kind, slot.clone());
        slot
    }

    fn password_provider(&self) -> Registered {
        Registered {
            provider: Arc::new(PasswordAuthProvider::new(
                self.session.clone(),
                self.backend.clone(),
            )),
            federated: None,
        }
    }

    async fn build_federated(&self, kind: ProviderKind) -> AuthResult<Arc<FederatedAuthProvider>> {
        let sdk = self
            .sdk_builder
            .build(kind, &self.config, self.session.storage().clone())?;

        let provider = Arc::new(FederatedAuthProvider::new(
            kind,
            sdk,
            self.session.clone(),
            self.backend.clone(),
            self.navigator.clone(),
            &self.config,
        ));
        provider.initialize().await?;

        info!(provider = %kind, "Provider constructed");
        Ok(provider)
    }
}
