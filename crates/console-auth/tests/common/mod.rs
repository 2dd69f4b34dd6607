//! Shared fixtures for console-auth integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use console_auth::{
    AuthConfig, AuthError, AuthResult, BackendAuthApi, IdentitySdk, IdentitySdkBuilder,
    KeyValueStore, LoginRequest, LoginResponse, Navigator, ProviderKind, ProviderResponse,
    RedirectCallback, SignInReason,
};
use jsonwebtoken::{EncodingKey, Header};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mint a signed token expiring `ttl` from now.
pub fn mint_token(subject: &str, ttl: Duration) -> String {
    let now = Utc::now();
    let claims = serde_json::json!({
        "sub": subject,
        "email": format!("{}@example.com", subject),
        "iat": now.timestamp(),
        "exp": (now + ttl).timestamp(),
    });
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"console-test-secret"),
    )
    .expect("token encodes")
}

/// Identity SDK double with scripted answers and call counters.
pub struct MockSdk {
    pub init_calls: AtomicUsize,
    pub silent_calls: AtomicUsize,
    pub forced_calls: AtomicUsize,
    pub redirect_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
    pub fail_init: AtomicBool,
    pub has_account: AtomicBool,
    pub silent: Mutex<AuthResult<Option<ProviderResponse>>>,
    pub forced: Mutex<AuthResult<Option<ProviderResponse>>>,
    pub redirect: Mutex<AuthResult<Option<ProviderResponse>>>,
    pub silent_delay: std::time::Duration,
    pub logout_url: Option<String>,
}

impl Default for MockSdk {
    fn default() -> Self {
        Self {
            init_calls: AtomicUsize::new(0),
            silent_calls: AtomicUsize::new(0),
            forced_calls: AtomicUsize::new(0),
            redirect_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            fail_init: AtomicBool::new(false),
            has_account: AtomicBool::new(true),
            silent: Mutex::new(Ok(None)),
            forced: Mutex::new(Ok(None)),
            redirect: Mutex::new(Ok(None)),
            silent_delay: std::time::Duration::from_millis(20),
            logout_url: Some("https://idp.example/logout".to_string()),
        }
    }
}

impl MockSdk {
    pub fn set_silent(&self, outcome: AuthResult<Option<ProviderResponse>>) {
        *self.silent.lock().unwrap() = outcome;
    }

    pub fn set_forced(&self, outcome: AuthResult<Option<ProviderResponse>>) {
        *self.forced.lock().unwrap() = outcome;
    }

    pub fn set_redirect(&self, outcome: AuthResult<Option<ProviderResponse>>) {
        *self.redirect.lock().unwrap() = outcome;
    }
}

#[async_trait]
impl IdentitySdk for MockSdk {
    async fn initialize(&self) -> AuthResult<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(AuthError::InitializationFailure("discovery failed".to_string()));
        }
        Ok(())
    }

    async fn begin_redirect_login(&self) -> AuthResult<String> {
        self.redirect_calls.fetch_add(1, Ordering::SeqCst);
        Ok("https://idp.example/authorize?client_id=console".to_string())
    }

    async fn complete_redirect(&self, _callback: &RedirectCallback) -> AuthResult<Option<ProviderResponse>> {
        self.redirect.lock().unwrap().clone()
    }

    async fn acquire_token_silent(&self, force_refresh: bool) -> AuthResult<Option<ProviderResponse>> {
        tokio::time::sleep(self.silent_delay).await;
        if force_refresh {
            self.forced_calls.fetch_add(1, Ordering::SeqCst);
            self.forced.lock().unwrap().clone()
        } else {
            self.silent_calls.fetch_add(1, Ordering::SeqCst);
            self.silent.lock().unwrap().clone()
        }
    }

    fn has_account(&self) -> bool {
        self.has_account.load(Ordering::SeqCst)
    }

    async fn sign_out(&self) -> AuthResult<Option<String>> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.logout_url.clone())
    }
}

/// Backend double returning a scripted answer and recording requests.
pub struct MockBackend {
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<LoginRequest>>,
    pub response: Mutex<AuthResult<LoginResponse>>,
}

impl MockBackend {
    pub fn accepting(token: impl Into<String>, id: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            response: Mutex::new(Ok(LoginResponse {
                token: token.into(),
                id: id.to_string(),
            })),
        }
    }

    pub fn rejecting(status: u16) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            response: Mutex::new(Err(AuthError::LoginRejected { status })),
        }
    }

    pub fn set_response(&self, response: AuthResult<LoginResponse>) {
        *self.response.lock().unwrap() = response;
    }
}

#[async_trait]
impl BackendAuthApi for MockBackend {
    async fn login(&self, request: LoginRequest) -> AuthResult<LoginResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        self.response.lock().unwrap().clone()
    }
}

/// Navigator that records every request.
#[derive(Default)]
pub struct RecordingNavigator {
    pub path: Mutex<String>,
    pub navigations: Mutex<Vec<String>>,
    pub external: Mutex<Vec<String>>,
    pub sign_in: Mutex<Vec<SignInReason>>,
}

impl RecordingNavigator {
    pub fn at(path: &str) -> Self {
        let navigator = Self::default();
        *navigator.path.lock().unwrap() = path.to_string();
        navigator
    }

    pub fn external(&self) -> Vec<String> {
        self.external.lock().unwrap().clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn sign_in(&self) -> Vec<SignInReason> {
        self.sign_in.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_path(&self) -> String {
        self.path.lock().unwrap().clone()
    }

    fn navigate(&self, path: &str) {
        self.navigations.lock().unwrap().push(path.to_string());
        *self.path.lock().unwrap() = path.to_string();
    }

    fn redirect_external(&self, url: &str) {
        self.external.lock().unwrap().push(url.to_string());
    }

    fn redirect_to_sign_in(&self, reason: SignInReason) {
        self.sign_in.lock().unwrap().push(reason);
    }
}

/// SDK builder handing out one shared `MockSdk` and counting builds.
pub struct MockSdkBuilder {
    pub sdk: Arc<MockSdk>,
    pub builds: AtomicUsize,
    pub failing: Vec<ProviderKind>,
}

impl MockSdkBuilder {
    pub fn new(sdk: Arc<MockSdk>) -> Self {
        Self {
            sdk,
            builds: AtomicUsize::new(0),
            failing: Vec::new(),
        }
    }
}

impl IdentitySdkBuilder for MockSdkBuilder {
    fn build(
        &self,
        kind: ProviderKind,
        _config: &AuthConfig,
        _storage: Arc<dyn KeyValueStore>,
    ) -> AuthResult<Arc<dyn IdentitySdk>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&kind) {
            return Err(AuthError::ConfigError(format!("{} rejected", kind)));
        }
        Ok(self.sdk.clone())
    }
}

/// Configuration with both federated directories filled in.
pub fn federated_config() -> AuthConfig {
    let mut config = AuthConfig::default();
    config.azure.client_id = Some("azure-client".to_string());
    config.azure.authority = Some("https://login.microsoftonline.com/tenant".to_string());
    config.azure.redirect_uri = Some("https://console.example/".to_string());
    config.cognito.client_id = Some("cognito-client".to_string());
    config.cognito.domain = Some("console.auth.eu-west-1.amazoncognito.com".to_string());
    config.cognito.region = Some("eu-west-1".to_string());
    config.cognito.user_pool_id = Some("eu-west-1_pool".to_string());
    config.cognito.redirect_uri = Some("https://console.example/".to_string());
    config
}
