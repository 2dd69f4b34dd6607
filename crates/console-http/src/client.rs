//! Token-aware request pipeline.
//!
//! Every backend call goes through [`HttpClient::request`]:
//!
//! 1. the URL is built from the configured endpoint and path prefix;
//! 2. an expired credential is renewed first when the active provider can
//!    refresh (federated only), sharing the provider's in-flight refresh;
//! 3. the bearer header is attached and the request sent;
//! 4. a 401 tears down the owning provider, purges the session and sends
//!    the user to sign-in, once no matter how many requests fail together;
//! 5. any other response is decoded by content type.

use crate::error::{HttpError, HttpResult};
use crate::request::{RequestBody, RequestOptions};
use crate::response::ApiResponse;
use console_auth::codec;
use console_auth::{ApiEndpoint, AuthProviderFactory, Navigator, SessionStore, SignInReason};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Backend client that keeps the session credential valid.
pub struct HttpClient {
    /// HTTP client instance.
    client: Client,

    /// Backend endpoint.
    endpoint: ApiEndpoint,

    /// Login endpoint path, exempt from refresh and 401 handling.
    login_path: String,

    /// Margin before expiry at which the credential is renewed.
    expiry_buffer: chrono::Duration,

    factory: Arc<AuthProviderFactory>,
    navigator: Arc<dyn Navigator>,

    /// Session generation the last sign-in redirect was issued for.
    redirected_generation: AtomicU64,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("endpoint", &self.endpoint)
            .field("login_path", &self.login_path)
            .finish()
    }
}

impl HttpClient {
    /// Create a client over the factory's configuration and session.
    pub fn new(factory: Arc<AuthProviderFactory>, navigator: Arc<dyn Navigator>) -> HttpResult<Self> {
        let config = factory.config();
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| HttpError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.api.clone(),
            login_path: config.login_path.clone(),
            expiry_buffer: config.expiry_buffer,
            factory,
            navigator,
            redirected_generation: AtomicU64::new(u64::MAX),
        })
    }

    fn session(&self) -> &Arc<SessionStore> {
        self.factory.session()
    }

    /// Headers carrying the current credential.
    ///
    /// Without a credential the request goes out anonymously.
    pub fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        match self.session().token() {
            Some(token) => match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(e) => warn!(error = %e, "Credential is not a valid header value"),
            },
            None => warn!("No credential available, sending request without authorization"),
        }

        headers
    }

    /// Send a request to the backend.
    #[instrument(skip(self, options), fields(method = %options.method))]
    pub async fn request(&self, path: &str, options: RequestOptions) -> HttpResult<ApiResponse> {
        let url = self.endpoint.url(path);
        let is_login = self.is_login_path(path);

        if !is_login {
            self.ensure_fresh_credential().await?;
        }

        let mut request = self.client.request(options.method, &url).headers(self.get_headers());
        for (name, value) in options.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::from_str(&value)) {
                (Ok(name), Ok(value)) => request = request.header(name, value),
                _ => warn!(header = %name, "Skipping invalid header"),
            }
        }
        request = match options.body {
            RequestBody::Empty => request,
            RequestBody::Json(body) => request.json(&body),
            RequestBody::Raw {
                bytes,
                content_type,
            } => request.header(CONTENT_TYPE, content_type).body(bytes),
        };

        let response = request.send().await.map_err(|e| {
            error!(url = %url, error = %e, "Request failed");
            HttpError::Network(e)
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED && !is_login {
            self.end_session().await;
            return Err(HttpError::Unauthorized);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| {
            error!(url = %url, error = %e, "Failed to read response body");
            HttpError::Network(e)
        })?;

        debug!(status = status.as_u16(), "Response received");
        Ok(ApiResponse::decode(status.as_u16(), content_type.as_deref(), &body))
    }

    /// `GET` a path.
    pub async fn get(&self, path: &str) -> HttpResult<ApiResponse> {
        self.request(path, RequestOptions::new(Method::GET)).await
    }

    /// `POST` a JSON body.
    pub async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> HttpResult<ApiResponse> {
        self.request(path, RequestOptions::new(Method::POST).json(body)).await
    }

    /// `PUT` a JSON body.
    pub async fn put_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> HttpResult<ApiResponse> {
        self.request(path, RequestOptions::new(Method::PUT).json(body)).await
    }

    /// `DELETE` a path.
    pub async fn delete(&self, path: &str) -> HttpResult<ApiResponse> {
        self.request(path, RequestOptions::new(Method::DELETE)).await
    }

    /// `POST` a raw payload such as a spreadsheet upload.
    pub async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> HttpResult<ApiResponse> {
        self.request(path, RequestOptions::new(Method::POST).raw(bytes, content_type))
            .await
    }

    fn is_login_path(&self, path: &str) -> bool {
        let normalize = |p: &str| p.trim_matches('/').to_string();
        normalize(path) == normalize(&self.login_path)
    }

    /// Renew an expired credential before it is sent.
    ///
    /// Only providers that support refresh are asked; a password session
    /// sends its expired token and lets the backend answer 401.
    async fn ensure_fresh_credential(&self) -> HttpResult<()> {
        let Some(token) = self.session().token() else {
            return Ok(());
        };
        if !codec::is_expired(&token, self.expiry_buffer) {
            return Ok(());
        }

        let Some(provider) = self.factory.active_provider().await else {
            debug!("Expired credential without an active provider");
            return Ok(());
        };
        if !provider.supports_refresh() {
            debug!(provider = %provider.kind(), "Provider cannot refresh, sending credential as is");
            return Ok(());
        }

        info!(provider = %provider.kind(), "Credential expired, refreshing before request");
        match provider.refresh_token().await {
            Ok(_) => Ok(()),
            Err(e) if e.ends_session() => {
                warn!(error = %e, "Refresh before request failed");
                self.end_session().await;
                Err(HttpError::Refresh(e))
            }
            Err(e) => {
                warn!(error = %e, "Refresh before request failed, session kept");
                Err(HttpError::Refresh(e))
            }
        }
    }

    /// Purge the session and redirect to sign-in once per installed credential.
    ///
    /// Concurrent failures of the same session share one redirect; a later
    /// login arms a new one.
    async fn end_session(&self) {
        let generation = self.session().generation();
        self.factory.revoke_session().await;
        if self.redirected_generation.swap(generation, Ordering::SeqCst) == generation {
            debug!("Sign-in redirect already issued");
            return;
        }
        warn!("Session expired, redirecting to sign-in");
        self.navigator.redirect_to_sign_in(SignInReason::SessionExpired);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use console_auth::{
        AuthConfig, AuthResult, BackendAuthApi, IdentitySdk, IdentitySdkBuilder, KeyValueStore,
        LoginRequest, LoginResponse, MemoryStorage, NoopNavigator, ProviderKind,
    };

    struct UnusedBackend;

    #[async_trait::async_trait]
    impl BackendAuthApi for UnusedBackend {
        async fn login(&self, _request: LoginRequest) -> AuthResult<LoginResponse> {
            Err(console_auth::AuthError::Internal("unused".to_string()))
        }
    }

    struct NoSdk;

    impl IdentitySdkBuilder for NoSdk {
        fn build(
            &self,
            _kind: ProviderKind,
            _config: &AuthConfig,
            _storage: Arc<dyn KeyValueStore>,
        ) -> AuthResult<Arc<dyn IdentitySdk>> {
            Err(console_auth::AuthError::ConfigError("no sdk".to_string()))
        }
    }

    fn client(storage: Arc<MemoryStorage>) -> HttpClient {
        let mut config = AuthConfig::default();
        config.api = ApiEndpoint::new("http://localhost:8000").with_path_prefix("/console");
        let factory = AuthProviderFactory::new(
            config,
            Arc::new(SessionStore::new(storage)),
            Arc::new(UnusedBackend),
            Arc::new(NoopNavigator),
            Arc::new(NoSdk),
        );
        HttpClient::new(Arc::new(factory), Arc::new(NoopNavigator)).unwrap()
    }

    #[test]
    fn test_headers_with_credential() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(console_auth::storage::keys::TOKEN, "abc.def.ghi");
        let client = client(storage);

        let headers = client.get_headers();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc.def.ghi");
    }

    #[test]
    fn test_headers_without_credential() {
        let client = client(Arc::new(MemoryStorage::new()));
        assert!(client.get_headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_login_path_detection() {
        let client = client(Arc::new(MemoryStorage::new()));
        assert!(client.is_login_path("/login/"));
        assert!(client.is_login_path("login"));
        assert!(!client.is_login_path("/jobs/"));
    }
}
