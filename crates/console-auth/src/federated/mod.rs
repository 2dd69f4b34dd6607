//! OpenID-Connect provider
//!
//! `FederatedAuthProvider` wraps an identity SDK for one directory
//! (enterprise-directory or hosted-UI) and turns its identity token into the
//! application's own credential through the backend exchange.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized -> Initializing -> Idle | FailedInit
//! Idle -> AwaitingRedirect -> (backend exchange) -> Authenticated
//! Authenticated -> RefreshingToken -> Authenticated | Unauthenticated
//! any -> LoggedOut
//! ```
//!
//! `LoggedOut` is terminal; a new instance is needed to sign in again.
//!
//! ## Refresh
//!
//! At most one refresh runs per instance. Concurrent callers share the same
//! future and observe the same outcome. A timer fires a fixed lead time
//! before the identity token expires and runs the same shared refresh.

pub mod sdk;

#[cfg(feature = "oidc")]
pub mod oidc;

pub use sdk::{IdentitySdk, IdentitySdkBuilder, OidcSettings, ProviderResponse, RedirectCallback};

use crate::backend::{BackendAuthApi, LoginRequest};
use crate::claims::{Credential, RefreshedToken};
use crate::codec;
use crate::config::{AuthConfig, ProviderKind};
use crate::error::{AuthError, AuthResult};
use crate::navigation::{Navigator, SignInReason};
use crate::provider::AuthProvider;
use crate::session::SessionStore;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

type RefreshOutcome = AuthResult<Option<RefreshedToken>>;
type PendingRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Lifecycle state of a federated provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FederatedState {
    /// Constructed, SDK not set up yet
    Uninitialized,
    /// SDK setup running
    Initializing,
    /// Ready to log in
    Idle,
    /// SDK setup failed; the provider is unusable
    FailedInit,
    /// Redirect login started or callback being processed
    AwaitingRedirect,
    /// Application credential installed
    Authenticated,
    /// Silent renewal in flight
    RefreshingToken,
    /// Session lost after a failed refresh or exchange
    Unauthenticated,
    /// Signed out
    LoggedOut,
}

/// Provider backed by an OpenID-Connect identity SDK.
pub struct FederatedAuthProvider {
    inner: Arc<Inner>,
}

struct Inner {
    kind: ProviderKind,
    sdk: Arc<dyn IdentitySdk>,
    session: Arc<SessionStore>,
    backend: Arc<dyn BackendAuthApi>,
    navigator: Arc<dyn Navigator>,
    landing_path: String,
    expiry_buffer: Duration,
    refresh_lead: Duration,
    state: Mutex<FederatedState>,
    init: OnceCell<AuthResult<()>>,
    redirect_consumed: AtomicBool,
    pending_refresh: Mutex<Option<PendingRefresh>>,
    refresh_timer: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for FederatedAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederatedAuthProvider")
            .field("kind", &self.inner.kind)
            .field("state", &self.inner.state())
            .finish()
    }
}

impl FederatedAuthProvider {
    /// Create a provider around a configured SDK.
    ///
    /// Construction performs no I/O; call [`FederatedAuthProvider::initialize`]
    /// and then [`FederatedAuthProvider::complete_redirect_if_present`] from
    /// application startup.
    pub fn new(
        kind: ProviderKind,
        sdk: Arc<dyn IdentitySdk>,
        session: Arc<SessionStore>,
        backend: Arc<dyn BackendAuthApi>,
        navigator: Arc<dyn Navigator>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                kind,
                sdk,
                session,
                backend,
                navigator,
                landing_path: config.landing_path.clone(),
                expiry_buffer: config.expiry_buffer,
                refresh_lead: config.refresh_lead,
                state: Mutex::new(FederatedState::Uninitialized),
                init: OnceCell::new(),
                redirect_consumed: AtomicBool::new(false),
                pending_refresh: Mutex::new(None),
                refresh_timer: Mutex::new(None),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> FederatedState {
        self.inner.state()
    }

    /// Whether a refresh timer is armed.
    pub fn has_refresh_timer(&self) -> bool {
        lock(&self.inner.refresh_timer)
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Set up the SDK.
    ///
    /// Runs once; concurrent and later callers get the same outcome.
    pub async fn initialize(&self) -> AuthResult<()> {
        let inner = &self.inner;
        inner
            .init
            .get_or_init(|| async {
                inner.set_state(FederatedState::Initializing);
                match inner.sdk.initialize().await {
                    Ok(()) => {
                        inner.set_state(FederatedState::Idle);
                        info!(provider = %inner.kind, "Identity provider initialized");
                        Ok(())
                    }
                    Err(e) => {
                        inner.set_state(FederatedState::FailedInit);
                        error!(provider = %inner.kind, error = %e, "Identity provider initialization failed");
                        Err(match e {
                            AuthError::InitializationFailure(_) => e,
                            other => AuthError::InitializationFailure(other.to_string()),
                        })
                    }
                }
            })
            .await
            .clone()
    }

    /// Consume the redirect callback of this page load, if there is one.
    ///
    /// Only the first call per instance processes a callback. Returns `true`
    /// when a login completed.
    #[instrument(skip(self, callback), fields(provider = %self.inner.kind))]
    pub async fn complete_redirect_if_present(
        &self,
        callback: Option<&RedirectCallback>,
    ) -> AuthResult<bool> {
        self.initialize().await?;

        let Some(callback) = callback else {
            return Ok(false);
        };

        if self.inner.redirect_consumed.swap(true, Ordering::SeqCst) {
            debug!("Redirect callback already consumed");
            return Ok(false);
        }

        if let Some(err) = callback.error() {
            warn!(error = %err, "Identity provider reported an error");
            self.inner.reset_in_progress();
            return Err(err);
        }

        self.inner.set_state(FederatedState::AwaitingRedirect);
        match self.inner.sdk.complete_redirect(callback).await {
            Ok(Some(response)) => {
                self.handle_auth_response(response).await?;
                Ok(true)
            }
            Ok(None) => {
                self.inner.reset_in_progress();
                Ok(false)
            }
            Err(e) => {
                warn!(error = %e, "Redirect callback rejected");
                self.inner.reset_in_progress();
                Err(e)
            }
        }
    }

    /// Finish a login with the tokens returned by the identity SDK.
    ///
    /// An undecodable identity token leaves the session untouched. A rejected
    /// backend exchange clears the whole session, because an application
    /// credential cannot outlive the federated token it was minted from.
    #[instrument(skip(self, response), fields(provider = %self.inner.kind))]
    pub async fn handle_auth_response(&self, response: ProviderResponse) -> AuthResult<()> {
        let inner = &self.inner;

        let Some(claims) = codec::decode(&response.id_token) else {
            warn!("Identity token could not be decoded");
            inner.reset_in_progress();
            return Err(AuthError::DecodeFailure("identity token".to_string()));
        };
        debug!(subject = ?claims.sub, "Identity token received");

        inner
            .session
            .set_original_token(&response.id_token, response.refresh_expires_at);
        inner.schedule_token_refresh(&response.id_token);

        inner.exchange(&response).await?;

        let current = inner.navigator.current_path();
        if current != inner.landing_path {
            inner.navigator.navigate(&inner.landing_path);
        }

        info!("Federated login completed");
        Ok(())
    }

    /// Arm the refresh timer for a token's expiry, replacing any armed timer.
    ///
    /// Outside a Tokio runtime no timer is armed.
    pub fn schedule_token_refresh(&self, token: &str) {
        self.inner.schedule_token_refresh(token);
    }
}

#[async_trait]
impl AuthProvider for FederatedAuthProvider {
    fn kind(&self) -> ProviderKind {
        self.inner.kind
    }

    #[instrument(skip(self, password), fields(provider = %self.inner.kind))]
    async fn login(&self, username: Option<&str>, password: Option<&str>) -> AuthResult<bool> {
        self.initialize().await?;
        let inner = &self.inner;

        if inner.try_restore() {
            return Ok(true);
        }

        if username.is_some() || password.is_some() {
            debug!("Federated providers do not accept a username and password");
            return Ok(false);
        }

        match inner.claim_redirect() {
            RedirectClaim::AlreadyAuthenticated => return Ok(true),
            RedirectClaim::Busy => return Ok(false),
            RedirectClaim::Claimed => {}
        }

        match inner.sdk.begin_redirect_login().await {
            Ok(url) => {
                info!("Redirecting to identity provider");
                inner.navigator.redirect_external(&url);
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "Could not start redirect login");
                inner.reset_in_progress();
                Err(e)
            }
        }
    }

    #[instrument(skip(self), fields(provider = %self.inner.kind))]
    async fn logout(&self) {
        let inner = &self.inner;
        inner.cancel_timer();
        inner.set_state(FederatedState::LoggedOut);
        inner.session.purge_all();

        match inner.sdk.sign_out().await {
            Ok(Some(url)) => inner.navigator.redirect_external(&url),
            Ok(None) => inner.navigator.redirect_to_sign_in(SignInReason::SignedOut),
            Err(e) => {
                warn!(error = %e, "Identity provider sign-out failed");
                inner.navigator.redirect_to_sign_in(SignInReason::SignedOut);
            }
        }
        info!("Signed out");
    }

    fn is_authenticated(&self) -> bool {
        self.inner.session.is_authenticated()
    }

    fn get_token(&self) -> Option<String> {
        self.inner.session.token()
    }

    fn get_user_id(&self) -> Option<String> {
        self.inner.session.user_id()
    }

    async fn refresh_token(&self) -> AuthResult<Option<RefreshedToken>> {
        Inner::refresh(&self.inner).await
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    fn revoke(&self) {
        let inner = &self.inner;
        inner.cancel_timer();
        inner.set_state(FederatedState::Unauthenticated);
        debug!(provider = %inner.kind, "Session revoked, refresh timer cancelled");
    }
}

enum RedirectClaim {
    AlreadyAuthenticated,
    Busy,
    Claimed,
}

impl Inner {
    fn state(&self) -> FederatedState {
        *lock(&self.state)
    }

    /// `LoggedOut` is terminal.
    fn set_state(&self, next: FederatedState) {
        let mut state = lock(&self.state);
        if *state != FederatedState::LoggedOut {
            *state = next;
        }
    }

    fn reset_in_progress(&self) {
        let mut state = lock(&self.state);
        if matches!(
            *state,
            FederatedState::AwaitingRedirect | FederatedState::Initializing | FederatedState::Uninitialized
        ) {
            *state = FederatedState::Idle;
        }
    }

    fn claim_redirect(&self) -> RedirectClaim {
        let mut state = lock(&self.state);
        match *state {
            FederatedState::Authenticated | FederatedState::RefreshingToken
                if self.session.is_authenticated() =>
            {
                RedirectClaim::AlreadyAuthenticated
            }
            FederatedState::AwaitingRedirect => {
                debug!("Login already in progress");
                RedirectClaim::Busy
            }
            FederatedState::LoggedOut | FederatedState::FailedInit => {
                warn!(state = ?*state, "Provider cannot start a login");
                RedirectClaim::Busy
            }
            _ => {
                *state = FederatedState::AwaitingRedirect;
                RedirectClaim::Claimed
            }
        }
    }

    /// Restore a session left by a previous page load.
    ///
    /// Requires a federated token still outside the expiry buffer and an
    /// application credential of this provider in storage.
    fn try_restore(self: &Arc<Self>) -> bool {
        if self.state() == FederatedState::LoggedOut {
            return false;
        }

        let Some(original) = self.session.original_token() else {
            return false;
        };

        if codec::is_expired(&original, self.expiry_buffer) {
            debug!("Stored federated token is stale, discarding");
            self.session.discard_original_token();
            return false;
        }

        if self.session.provider_kind() != Some(self.kind) || !self.session.restore() {
            return false;
        }

        self.set_state(FederatedState::Authenticated);
        self.schedule_token_refresh(&original);
        info!(provider = %self.kind, "Session restored from stored federated token");
        true
    }

    /// Trade an identity token for the application credential.
    async fn exchange(&self, response: &ProviderResponse) -> AuthResult<Credential> {
        let request = LoginRequest::Federated {
            token: response.id_token.clone(),
        };

        match self.backend.login(request).await {
            Ok(login) if self.state() != FederatedState::LoggedOut => {
                let credential = Credential::from_token(login.token)
                    .with_refresh_expiry(response.refresh_expires_at);
                self.session
                    .install(credential.clone(), Some(login.id), self.kind);
                self.set_state(FederatedState::Authenticated);
                Ok(credential)
            }
            Ok(_) => {
                debug!("Exchange finished after sign-out, discarding credential");
                Err(AuthError::Unauthorized)
            }
            Err(e) => {
                error!(error = %e, "Backend token exchange failed");
                self.cancel_timer();
                self.session.clear();
                self.set_state(FederatedState::Unauthenticated);
                Err(match e {
                    AuthError::LoginRejected { status } => AuthError::BackendExchangeFailure { status },
                    other => other,
                })
            }
        }
    }

    /// Join the in-flight refresh, or start one.
    fn refresh(self: &Arc<Self>) -> PendingRefresh {
        let mut pending = lock(&self.pending_refresh);
        if let Some(existing) = pending.as_ref() {
            debug!("Joining in-flight refresh");
            return existing.clone();
        }

        let inner = Arc::clone(self);
        let refresh = async move {
            let outcome = inner.run_refresh().await;
            *lock(&inner.pending_refresh) = None;
            outcome
        }
        .boxed()
        .shared();

        *pending = Some(refresh.clone());
        refresh
    }

    async fn run_refresh(self: &Arc<Self>) -> RefreshOutcome {
        if self.state() == FederatedState::LoggedOut {
            return Ok(None);
        }
        if !self.sdk.has_account() {
            debug!("No account to refresh");
            return Ok(None);
        }

        let previous = self.state();
        self.set_state(FederatedState::RefreshingToken);

        let silent = match self.sdk.acquire_token_silent(false).await {
            Ok(response) => response,
            Err(e) if self.kind == ProviderKind::Azure => {
                warn!(error = %e, "Silent renewal failed, forcing refresh");
                match self.sdk.acquire_token_silent(true).await {
                    Ok(response) => response,
                    Err(e) => return self.fail_refresh(e),
                }
            }
            Err(e) => return self.fail_refresh(e),
        };

        let Some(response) = silent else {
            debug!("Identity provider has no session to renew");
            self.set_state(previous);
            return Ok(None);
        };

        if self.state() == FederatedState::LoggedOut {
            return Ok(None);
        }

        if codec::decode(&response.id_token).is_none() {
            return self.fail_refresh(AuthError::DecodeFailure("renewed identity token".to_string()));
        }

        self.session
            .set_original_token(&response.id_token, response.refresh_expires_at);
        let credential = self
            .exchange(&response)
            .await
            .map_err(|e| AuthError::RefreshFailure(e.to_string()))?;
        self.schedule_token_refresh(&response.id_token);

        info!(provider = %self.kind, "Token refreshed");
        Ok(Some(RefreshedToken {
            token: credential.token,
            expires_at: credential.expires_at,
        }))
    }

    fn fail_refresh(&self, cause: AuthError) -> RefreshOutcome {
        error!(provider = %self.kind, error = %cause, "Token refresh failed");
        self.cancel_timer();
        self.session.clear();
        self.set_state(FederatedState::Unauthenticated);
        Err(match cause {
            AuthError::RefreshFailure(_) => cause,
            other => AuthError::RefreshFailure(other.to_string()),
        })
    }

    fn schedule_token_refresh(self: &Arc<Self>, token: &str) {
        let Some(expires_at) = codec::expires_at(token) else {
            warn!("Token has no expiry, refresh timer not armed");
            return;
        };

        let delay = (expires_at - self.refresh_lead - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        debug!(delay_secs = delay.as_secs(), "Arming refresh timer");

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, refresh timer not armed");
            return;
        };

        let weak = Arc::downgrade(self);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.state() == FederatedState::LoggedOut
                || !inner.session.is_authenticated()
                || inner.session.provider_kind() != Some(inner.kind)
            {
                debug!("Refresh timer fired without a session of this provider, ignoring");
                return;
            }
            if let Err(e) = Inner::refresh(&inner).await {
                warn!(error = %e, "Scheduled token refresh failed");
            }
        });

        if let Some(previous) = lock(&self.refresh_timer).replace(handle) {
            previous.abort();
        }
    }

    fn cancel_timer(&self) {
        if let Some(handle) = lock(&self.refresh_timer).take() {
            handle.abort();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
