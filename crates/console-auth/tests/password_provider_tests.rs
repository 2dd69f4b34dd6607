//! Password provider tests against a mock backend login endpoint.

mod common;

use chrono::Duration;
use common::mint_token;
use console_auth::storage::keys;
use console_auth::{
    ApiEndpoint, AuthError, AuthProvider, KeyValueStore, MemoryStorage, PasswordAuthProvider,
    ProviderKind, ReqwestBackend, SessionStore,
};
use std::sync::Arc;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test fixture with a mock backend and a provider pointed at it.
struct TestFixture {
    server: MockServer,
    storage: Arc<MemoryStorage>,
    session: Arc<SessionStore>,
    provider: PasswordAuthProvider,
}

impl TestFixture {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let storage = Arc::new(MemoryStorage::new());
        let session = Arc::new(SessionStore::new(storage.clone()));
        let backend = ReqwestBackend::new(
            ApiEndpoint::new(server.uri()),
            "/login/",
            std::time::Duration::from_secs(5),
        )
        .expect("backend builds");
        let provider = PasswordAuthProvider::new(session.clone(), Arc::new(backend));

        Self {
            server,
            storage,
            session,
            provider,
        }
    }

    async fn accept(&self, token: &str) {
        Mock::given(method("POST"))
            .and(path("/login/"))
            .and(body_json(serde_json::json!({
                "username": "ada",
                "password": "correct horse"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": token,
                "id": 7
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }
}

#[tokio::test]
async fn test_login_success() {
    let fixture = TestFixture::new().await;
    let token = mint_token("ada", Duration::hours(1));
    fixture.accept(&token).await;

    let ok = fixture
        .provider
        .login(Some("ada"), Some("correct horse"))
        .await
        .expect("login completes");

    assert!(ok);
    assert!(fixture.provider.is_authenticated());
    assert_eq!(fixture.provider.get_token(), Some(token.clone()));
    assert_eq!(fixture.provider.get_user_id().as_deref(), Some("7"));
    assert_eq!(fixture.storage.get(keys::TOKEN), Some(token));
    assert_eq!(fixture.storage.get(keys::AUTH_PROVIDER).as_deref(), Some("password"));
    assert!(fixture.session.credential().unwrap().expires_at.is_some());
}

#[tokio::test]
async fn test_login_bad_password() {
    let fixture = TestFixture::new().await;

    Mock::given(method("POST"))
        .and(path("/login/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "detail": "Invalid credentials"
        })))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let ok = fixture
        .provider
        .login(Some("ada"), Some("wrong"))
        .await
        .expect("rejection is not an error");

    assert!(!ok);
    assert!(!fixture.provider.is_authenticated());
    assert_eq!(fixture.provider.get_token(), None);
    assert!(fixture.storage.is_empty());
}

#[tokio::test]
async fn test_rejected_login_clears_previous_session() {
    let fixture = TestFixture::new().await;
    fixture.storage.set(keys::TOKEN, "stale");
    fixture.storage.set(keys::IS_AUTHENTICATED, "true");
    fixture.session.restore();

    Mock::given(method("POST"))
        .and(path("/login/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&fixture.server)
        .await;

    assert!(!fixture.provider.login(Some("ada"), Some("wrong")).await.unwrap());
    assert_eq!(fixture.provider.get_token(), None);
}

#[tokio::test]
async fn test_login_missing_arguments() {
    let fixture = TestFixture::new().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&fixture.server)
        .await;

    assert!(!fixture.provider.login(Some("ada"), None).await.unwrap());
    assert!(!fixture.provider.login(None, Some("pw")).await.unwrap());
    assert!(!fixture.provider.login(None, None).await.unwrap());
}

#[tokio::test]
async fn test_login_network_error() {
    let storage = Arc::new(MemoryStorage::new());
    let session = Arc::new(SessionStore::new(storage));
    let backend = ReqwestBackend::new(
        ApiEndpoint::new("http://127.0.0.1:1"),
        "/login/",
        std::time::Duration::from_secs(2),
    )
    .unwrap();
    let provider = PasswordAuthProvider::new(session, Arc::new(backend));

    let err = provider.login(Some("ada"), Some("pw")).await.unwrap_err();
    assert!(matches!(err, AuthError::Network(_)));
}

#[tokio::test]
async fn test_refresh_unsupported() {
    let fixture = TestFixture::new().await;

    assert!(!fixture.provider.supports_refresh());
    assert_eq!(fixture.provider.kind(), ProviderKind::Password);
    assert_eq!(
        fixture.provider.refresh_token().await,
        Err(AuthError::RefreshUnsupported)
    );
}

#[tokio::test]
async fn test_logout_and_reload() {
    let fixture = TestFixture::new().await;
    let token = mint_token("ada", Duration::hours(1));
    fixture.accept(&token).await;
    fixture
        .provider
        .login(Some("ada"), Some("correct horse"))
        .await
        .unwrap();

    // A reload sees the stored session.
    let reloaded = SessionStore::new(fixture.storage.clone());
    assert!(reloaded.restore());
    assert_eq!(reloaded.token(), Some(token));

    fixture.provider.logout().await;
    assert!(!fixture.provider.is_authenticated());
    assert!(fixture.storage.is_empty());

    // Logging out again is harmless.
    fixture.provider.logout().await;
    assert!(fixture.storage.is_empty());
}
