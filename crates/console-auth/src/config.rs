//! Authentication configuration.
//!
//! Configuration is loaded before any provider is constructed. Values come
//! from environment variables with defaults suitable for local development;
//! the remote JSON configuration used by hosted deployments is mapped onto
//! the same structure by the application.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Identity backends the console can authenticate against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Username/password exchanged directly with the backend
    Password,
    /// Enterprise-directory OpenID Connect (redirect login)
    Azure,
    /// Hosted-UI OpenID Connect (redirect login)
    Cognito,
}

impl ProviderKind {
    /// Every provider kind, password first.
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Password, ProviderKind::Azure, ProviderKind::Cognito];

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Password => "password",
            ProviderKind::Azure => "azure",
            ProviderKind::Cognito => "cognito",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "password" | "custom" | "local" => Some(ProviderKind::Password),
            "azure" | "azuread" | "msal" | "entra" => Some(ProviderKind::Azure),
            "cognito" | "amplify" => Some(ProviderKind::Cognito),
            _ => None,
        }
    }

    /// Whether the identity is held by an external provider.
    pub fn is_federated(&self) -> bool {
        !matches!(self, ProviderKind::Password)
    }

    /// Whether sessions of this kind can be silently renewed.
    pub fn supports_refresh(&self) -> bool {
        self.is_federated()
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Application backend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEndpoint {
    /// Base URL for the backend (e.g., "https://api.solver.example").
    pub base_url: String,

    /// Extra path segment used when the console is embedded inside another
    /// application (e.g., "/optimizer").
    pub path_prefix: Option<String>,
}

impl ApiEndpoint {
    /// Create an endpoint without a path prefix.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path_prefix: None,
        }
    }

    /// Set the embedded-deployment path prefix.
    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = Some(prefix.into());
        self
    }

    /// Build a full URL by appending a path to the base URL and prefix.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');

        match self
            .path_prefix
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
        {
            Some(prefix) => format!("{}/{}/{}", base, prefix, path),
            None => format!("{}/{}", base, path),
        }
    }
}

/// Enterprise-directory provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureConfig {
    /// Application (client) id
    pub client_id: Option<String>,

    /// Authority URL (e.g., "https://login.microsoftonline.com/{tenant}")
    pub authority: Option<String>,

    /// Redirect URI registered for the console
    pub redirect_uri: Option<String>,
}

/// Hosted-UI provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CognitoConfig {
    /// App client id
    pub client_id: Option<String>,

    /// Hosted UI domain (e.g., "console.auth.eu-west-1.amazoncognito.com")
    pub domain: Option<String>,

    /// Region of the user pool
    pub region: Option<String>,

    /// User pool id
    pub user_pool_id: Option<String>,

    /// Redirect URI registered for the console
    pub redirect_uri: Option<String>,
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Application backend.
    pub api: ApiEndpoint,

    /// Login endpoint path, shared by every provider.
    pub login_path: String,

    /// Page users land on after a federated login.
    pub landing_path: String,

    /// Provider used when the user has not picked one.
    pub default_provider: ProviderKind,

    /// Enterprise-directory settings.
    pub azure: AzureConfig,

    /// Hosted-UI settings.
    pub cognito: CognitoConfig,

    /// Margin before expiry at which a token counts as expired.
    #[serde(with = "duration_secs")]
    pub expiry_buffer: Duration,

    /// How long before expiry the refresh timer fires.
    #[serde(with = "duration_secs")]
    pub refresh_lead: Duration,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AuthConfig {
    /// Returns default configuration suitable for local development.
    fn default() -> Self {
        Self {
            api: ApiEndpoint::new("http://localhost:8000"),
            login_path: "/login/".to_string(),
            landing_path: "/".to_string(),
            default_provider: ProviderKind::Password,
            azure: AzureConfig::default(),
            cognito: CognitoConfig::default(),
            expiry_buffer: crate::codec::DEFAULT_EXPIRY_BUFFER,
            refresh_lead: Duration::minutes(5),
            request_timeout_secs: 30,
        }
    }
}

impl AuthConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CONSOLE_API_URL`: backend URL (default: http://localhost:8000)
    /// - `CONSOLE_PATH_PREFIX`: prefix when embedded in another application
    /// - `AUTH_PROVIDER`: default provider (`password`, `azure`, `cognito`)
    /// - `AZURE_CLIENT_ID`, `AZURE_AUTHORITY`, `AZURE_REDIRECT_URI`
    /// - `COGNITO_CLIENT_ID`, `COGNITO_DOMAIN`, `COGNITO_REGION`,
    ///   `COGNITO_USER_POOL_ID`, `COGNITO_REDIRECT_URI`
    /// - `CONSOLE_TIMEOUT_SECS`: request timeout (default: 30)
    pub fn from_env() -> Self {
        let default = Self::default();
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self {
            api: ApiEndpoint {
                base_url: var("CONSOLE_API_URL").unwrap_or(default.api.base_url),
                path_prefix: var("CONSOLE_PATH_PREFIX"),
            },
            default_provider: var("AUTH_PROVIDER")
                .and_then(|s| ProviderKind::parse(&s))
                .unwrap_or(default.default_provider),
            azure: AzureConfig {
                client_id: var("AZURE_CLIENT_ID"),
                authority: var("AZURE_AUTHORITY"),
                redirect_uri: var("AZURE_REDIRECT_URI"),
            },
            cognito: CognitoConfig {
                client_id: var("COGNITO_CLIENT_ID"),
                domain: var("COGNITO_DOMAIN"),
                region: var("COGNITO_REGION"),
                user_pool_id: var("COGNITO_USER_POOL_ID"),
                redirect_uri: var("COGNITO_REDIRECT_URI"),
            },
            request_timeout_secs: var("CONSOLE_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.request_timeout_secs),
            ..default
        }
    }

    /// Whether every field the provider needs is present and non-empty.
    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        fn present(value: &Option<String>) -> bool {
            value.as_deref().map_or(false, |v| !v.trim().is_empty())
        }

        match kind {
            ProviderKind::Password => true,
            ProviderKind::Azure => {
                present(&self.azure.client_id)
                    && present(&self.azure.authority)
                    && present(&self.azure.redirect_uri)
            }
            ProviderKind::Cognito => {
                present(&self.cognito.client_id)
                    && present(&self.cognito.domain)
                    && present(&self.cognito.region)
                    && present(&self.cognito.user_pool_id)
                    && present(&self.cognito.redirect_uri)
            }
        }
    }

    /// Provider kinds whose configuration is complete.
    pub fn configured_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.is_configured(*kind))
            .collect()
    }

    /// Request timeout as a std Duration.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    /// Full URL of the login endpoint.
    pub fn login_url(&self) -> String {
        self.api.url(&self.login_path)
    }
}

mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        i64::deserialize(deserializer).map(Duration::seconds)
    }
}
