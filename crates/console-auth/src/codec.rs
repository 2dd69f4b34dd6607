//! Bearer token decoding and expiry checks
//!
//! Tokens are decoded without verifying their signature. The backend is the
//! only party that enforces validity; the values read here are used to decide
//! when to refresh, not whether to trust the caller.

use crate::claims::TokenClaims;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

/// Safety margin applied before the backend would reject a token.
pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::minutes(5);

/// Decode the claims segment of a token.
///
/// Returns `None` (and logs why) when the token is empty, does not have
/// three segments, or the payload is not a JSON object.
pub fn decode(token: &str) -> Option<TokenClaims> {
    if token.is_empty() {
        debug!("No token to decode");
        return None;
    }

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        warn!(segments = segments.len(), "Malformed token");
        return None;
    }

    let payload = match URL_SAFE_NO_PAD.decode(segments[1].trim_end_matches('=')) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Token payload is not base64url");
            return None;
        }
    };

    match serde_json::from_slice::<TokenClaims>(&payload) {
        Ok(claims) => Some(claims),
        Err(e) => {
            warn!(error = %e, "Token payload is not a claims object");
            None
        }
    }
}

/// Expiry of a token, if it can be decoded and carries one.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    decode(token).and_then(|claims| claims.expires_at())
}

/// Check whether a token is expired, or will be within `buffer`.
///
/// Undecodable tokens and tokens without `exp` count as expired.
pub fn is_expired(token: &str, buffer: Duration) -> bool {
    is_expired_at(token, buffer, Utc::now())
}

/// Same as [`is_expired`] against an explicit clock.
pub fn is_expired_at(token: &str, buffer: Duration, now: DateTime<Utc>) -> bool {
    match decode(token).and_then(|claims| claims.exp) {
        Some(exp) => exp - buffer.num_seconds() <= now.timestamp(),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{}.{}.signature", header, body)
    }

    #[test]
    fn test_decode_valid_token() {
        let token = token_with(serde_json::json!({"sub": "42", "exp": 2_000_000_000}));
        let claims = decode(&token).unwrap();

        assert_eq!(claims.sub.as_deref(), Some("42"));
        assert_eq!(claims.exp, Some(2_000_000_000));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode("").is_none());
        assert!(decode("only.two").is_none());
        assert!(decode("a.b.c.d").is_none());
        assert!(decode("header.%%%.sig").is_none());

        let not_object = format!("h.{}.s", URL_SAFE_NO_PAD.encode("[1,2,3]"));
        assert!(decode(&not_object).is_none());
    }

    #[test]
    fn test_decode_tolerates_padding() {
        let body = base64::engine::general_purpose::URL_SAFE.encode(r#"{"sub":"ab"}"#);
        let token = format!("h.{}.s", body);
        assert_eq!(decode(&token).unwrap().sub.as_deref(), Some("ab"));
    }

    #[test]
    fn test_numeric_subject_keeps_expiry() {
        let exp = Utc::now() + Duration::hours(1);
        let token = token_with(serde_json::json!({"sub": 42, "exp": exp.timestamp()}));

        let claims = decode(&token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("42"));
        assert_eq!(expires_at(&token).map(|t| t.timestamp()), Some(exp.timestamp()));
        assert!(!is_expired(&token, DEFAULT_EXPIRY_BUFFER));
    }

    #[test]
    fn test_fractional_timestamps() {
        let exp = (Utc::now() + Duration::hours(1)).timestamp() as f64 + 0.5;
        let token = token_with(serde_json::json!({"iat": 1.5, "exp": exp}));

        assert!(decode(&token).is_some());
        assert!(!is_expired(&token, DEFAULT_EXPIRY_BUFFER));
    }

    #[test]
    fn test_undecodable_is_expired() {
        for token in ["", "garbage", "a.b.c", "x.eyJ9.y"] {
            assert!(decode(token).is_none());
            assert!(is_expired(token, Duration::zero()));
            assert!(is_expired(token, DEFAULT_EXPIRY_BUFFER));
        }
    }

    #[test]
    fn test_missing_exp_is_expired() {
        let token = token_with(serde_json::json!({"sub": "42"}));
        assert!(is_expired(&token, Duration::zero()));
    }

    #[test]
    fn test_buffer_window_flips_once() {
        let now = Utc::now();
        let exp = now + Duration::minutes(30);
        let token = token_with(serde_json::json!({"exp": exp.timestamp()}));
        let buffer = DEFAULT_EXPIRY_BUFFER;

        assert!(!is_expired_at(&token, buffer, now));
        assert!(!is_expired_at(&token, buffer, now + Duration::minutes(24)));

        // From exp - buffer onwards it stays expired.
        for minutes in [25, 26, 30, 31, 120] {
            assert!(is_expired_at(&token, buffer, now + Duration::minutes(minutes)));
        }
    }

    #[test]
    fn test_default_buffer() {
        let soon = Utc::now() + Duration::minutes(3);
        let token = token_with(serde_json::json!({"exp": soon.timestamp()}));

        assert!(is_expired(&token, DEFAULT_EXPIRY_BUFFER));
        assert!(!is_expired(&token, Duration::zero()));
    }
}
