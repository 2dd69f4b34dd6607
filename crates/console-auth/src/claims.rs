//! Token claims and credentials
//!
//! This module defines the claims decoded from bearer credentials and the
//! `Credential` value installed in the session. Claims are advisory: they are
//! read without verifying signatures and never used to make security
//! decisions on the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Claims carried by an application or federated identity token.
///
/// Only the fields the console reads are typed; everything else the issuer
/// adds is kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    /// Subject
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub sub: Option<String>,

    /// Expiration time (Unix timestamp)
    #[serde(
        default,
        deserialize_with = "lenient::timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<i64>,

    /// Issued at (Unix timestamp)
    #[serde(
        default,
        deserialize_with = "lenient::timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<i64>,

    /// Issuer
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub iss: Option<String>,

    /// User email
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub email: Option<String>,

    /// Display name
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,

    /// Login name (enterprise directory tokens)
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub preferred_username: Option<String>,

    /// Directory object id (enterprise directory tokens)
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub oid: Option<String>,

    /// Any other claim
    #[serde(default, flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl TokenClaims {
    /// Get expiration as DateTime.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Best human-readable name for the user.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.preferred_username.as_deref())
            .or(self.email.as_deref())
    }

    /// Look up a claim that has no typed field.
    pub fn claim(&self, name: &str) -> Option<&serde_json::Value> {
        self.extra.get(name)
    }
}

/// Claim readers that accept what issuers actually send.
///
/// Ids may arrive as numbers and timestamps as floats. A claim of an
/// unusable type reads as absent instead of failing the whole payload.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub(super) fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub(super) fn timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.floor() as i64)),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| f.floor() as i64),
            _ => None,
        })
    }
}

/// Bearer credential installed in the session.
///
/// A credential is never mutated; refresh replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque bearer value
    pub token: String,

    /// Absolute expiry, when the token carries one
    pub expires_at: Option<DateTime<Utc>>,

    /// Expiry of the refresh capability, when the provider reports one
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Build a credential, deriving the expiry from the token's claims.
    pub fn from_token(token: impl Into<String>) -> Self {
        let token = token.into();
        let expires_at = crate::codec::expires_at(&token);

        Self {
            token,
            expires_at,
            refresh_expires_at: None,
        }
    }

    /// Attach the refresh-capability expiry.
    pub fn with_refresh_expiry(mut self, refresh_expires_at: Option<DateTime<Utc>>) -> Self {
        self.refresh_expires_at = refresh_expires_at;
        self
    }
}

/// Result of a successful token refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    /// New application credential
    pub token: String,

    /// Expiry of the new credential
    pub expires_at: Option<DateTime<Utc>>,
}
