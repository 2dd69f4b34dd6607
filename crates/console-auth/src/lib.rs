//! # Console Authentication
//!
//! Session lifecycle for the Solver Console dashboard: issuing, restoring,
//! proactively refreshing and revoking the bearer credential every backend
//! call carries.
//!
//! ## Overview
//!
//! - **Providers**: one [`AuthProvider`] contract over a username/password
//!   backend and two OpenID-Connect directories (enterprise-directory and
//!   hosted-UI)
//! - **Session**: [`SessionStore`] mirrors the session into tab-scoped
//!   storage so a reload restores it
//! - **Refresh**: federated providers renew silently, single-flight, with a
//!   timer armed before expiry
//! - **Selection**: [`AuthProviderFactory`] builds every configured provider
//!   once and records failures as unavailable
//!
//! ## Features
//!
//! - `oidc`: identity SDK adapter built on `openidconnect`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use console_auth::{
//!     AuthConfig, AuthProvider, AuthProviderFactory, MemoryStorage, NoopNavigator,
//!     ProviderKind, ReqwestBackend, SessionStore,
//! };
//! use std::sync::Arc;
//!
//! # async fn run(sdk_builder: Arc<dyn console_auth::IdentitySdkBuilder>) -> console_auth::AuthResult<()> {
//! let config = AuthConfig::from_env();
//! let session = Arc::new(SessionStore::new(Arc::new(MemoryStorage::new())));
//! let backend = Arc::new(ReqwestBackend::from_config(&config)?);
//!
//! let factory = AuthProviderFactory::new(
//!     config,
//!     session,
//!     backend,
//!     Arc::new(NoopNavigator),
//!     sdk_builder,
//! );
//!
//! let provider = factory.get_default_provider().await;
//! if provider.kind() == ProviderKind::Password {
//!     provider.login(Some("ada"), Some("secret")).await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Startup
//!
//! Configuration is loaded before the factory is created. A federated
//! provider then needs [`FederatedAuthProvider::initialize`] (done by the
//! factory) and [`FederatedAuthProvider::complete_redirect_if_present`] with
//! the [`RedirectCallback`] of the current page, if any.

pub mod backend;
pub mod claims;
pub mod codec;
pub mod config;
pub mod error;
pub mod factory;
pub mod federated;
pub mod navigation;
pub mod password;
pub mod provider;
pub mod session;
pub mod storage;

// Re-export main types
pub use backend::{BackendAuthApi, LoginRequest, LoginResponse, ReqwestBackend};
pub use claims::{Credential, RefreshedToken, TokenClaims};
pub use config::{ApiEndpoint, AuthConfig, AzureConfig, CognitoConfig, ProviderKind};
pub use error::{AuthError, AuthResult};
pub use factory::AuthProviderFactory;
pub use federated::{
    FederatedAuthProvider, FederatedState, IdentitySdk, IdentitySdkBuilder, OidcSettings,
    ProviderResponse, RedirectCallback,
};
pub use navigation::{Navigator, NoopNavigator, SignInReason};
pub use password::PasswordAuthProvider;
pub use provider::AuthProvider;
pub use session::{Session, SessionStore};
pub use storage::{KeyValueStore, MemoryStorage};

#[cfg(feature = "oidc")]
pub use federated::oidc::{OidcSdk, OidcSdkBuilder};
