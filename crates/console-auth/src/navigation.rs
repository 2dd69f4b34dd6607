//! Navigation seam to the UI layer.
//!
//! Routing belongs to the application shell. Providers and the HTTP client
//! only ask it to move the user somewhere.

use serde::{Deserialize, Serialize};

/// Why the user is sent back to the sign-in screen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SignInReason {
    /// The session could not be recovered
    SessionExpired,
    /// The user signed out
    SignedOut,
}

impl SignInReason {
    /// Query marker appended to the sign-in route.
    pub fn as_query(&self) -> &'static str {
        match self {
            SignInReason::SessionExpired => "sessionExpired=true",
            SignInReason::SignedOut => "signedOut=true",
        }
    }
}

/// Routing operations provided by the UI layer.
pub trait Navigator: Send + Sync {
    /// Path of the page currently shown.
    fn current_path(&self) -> String;

    /// Move to an in-app route.
    fn navigate(&self, path: &str);

    /// Leave the application for an external URL (identity provider pages).
    fn redirect_external(&self, url: &str);

    /// Show the sign-in screen.
    fn redirect_to_sign_in(&self, reason: SignInReason);
}

/// Navigator for headless use; it logs and stays put.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn current_path(&self) -> String {
        "/".to_string()
    }

    fn navigate(&self, path: &str) {
        tracing::debug!(path, "Navigation requested");
    }

    fn redirect_external(&self, url: &str) {
        tracing::debug!(url, "External redirect requested");
    }

    fn redirect_to_sign_in(&self, reason: SignInReason) {
        tracing::debug!(reason = reason.as_query(), "Sign-in redirect requested");
    }
}
