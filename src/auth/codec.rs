// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HS256 token encoding and decoding.
//!
//! Every component that signs or verifies tokens goes through a
//! [`TokenCodec`] built from the shared secret in [`TokenSettings`]. The
//! codec never consults process-wide state.
//!
//! [`TokenSettings`]: crate::config::TokenSettings

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};

use super::claims::{self, Claims};
use crate::config::MIN_SECRET_BYTES;

/// Why a token could not be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token has expired")]
    Expired,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("signing secret must be at least {MIN_SECRET_BYTES} bytes")]
    WeakSecret,

    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Signs and verifies compact HS256 tokens.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    leeway_secs: i64,
}

impl TokenCodec {
    pub fn new(secret: &[u8], leeway_secs: u64) -> Result<Self, CodecError> {
        if secret.len() < MIN_SECRET_BYTES {
            return Err(CodecError::WeakSecret);
        }

        // Expiry is checked separately so that signature failures are
        // reported ahead of expiry.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            leeway_secs: i64::try_from(leeway_secs).unwrap_or(i64::MAX),
        })
    }

    /// Sign `claims` merged with `iat`/`exp` (and `sub` when given).
    ///
    /// Caller-supplied values for the registered claims are overwritten.
    pub fn issue(
        &self,
        claims: Claims,
        subject: Option<&str>,
        validity: chrono::Duration,
    ) -> Result<String, CodecError> {
        let now = Utc::now();
        let mut payload: Map<String, Value> = claims.into_map();
        if let Some(subject) = subject {
            payload.insert(claims::SUBJECT.to_string(), Value::from(subject));
        }
        payload.insert(claims::ISSUED_AT.to_string(), Value::from(now.timestamp()));
        payload.insert(
            claims::EXPIRES_AT.to_string(),
            Value::from((now + validity).timestamp()),
        );

        let token = encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)?;
        Ok(token)
    }

    /// Verify structure and signature, and decode the payload.
    ///
    /// Expiry is NOT checked here; see [`TokenCodec::is_expired`] and
    /// [`TokenCodec::decode`].
    pub fn parse_claims(&self, token: &str) -> Result<Claims, TokenError> {
        check_segments(token)?;
        let data = decode::<Map<String, Value>>(token, &self.decoding_key, &self.validation)
            .map_err(|e| map_jwt_error(e.kind()))?;
        Ok(Claims::from(data.claims))
    }

    /// Verify structure, signature and expiry.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.parse_claims(token)?;
        if self.is_expired(&claims) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Decode the payload without checking the signature or expiry.
    ///
    /// Only for callers that treat the result as advisory.
    pub fn decode_unverified(token: &str) -> Result<Claims, TokenError> {
        check_segments(token)?;
        let data = jsonwebtoken::dangerous::insecure_decode::<Map<String, Value>>(token)
            .map_err(|_| TokenError::Malformed)?;
        Ok(Claims::from(data.claims))
    }

    /// True when `exp` is missing or already in the past (beyond leeway).
    pub fn is_expired(&self, claims: &Claims) -> bool {
        match claims.expires_at() {
            Some(exp) => exp.saturating_add(self.leeway_secs) < Utc::now().timestamp(),
            None => true,
        }
    }
}

/// Compact tokens have exactly three dot-separated, non-empty segments.
fn check_segments(token: &str) -> Result<(), TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(TokenError::Malformed);
    }
    Ok(())
}

fn map_jwt_error(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
    const OTHER_SECRET: &[u8] = b"fedcba9876543210fedcba9876543210";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET, 0).unwrap()
    }

    #[test]
    fn rejects_short_secret() {
        assert!(matches!(TokenCodec::new(b"short", 0), Err(CodecError::WeakSecret)));
    }

    #[test]
    fn issue_then_parse_recovers_subject_and_claims() {
        let codec = codec();
        let input = Claims::new().with("role", "ADMIN").with("userId", "7");
        let token = codec
            .issue(input, Some("alice"), chrono::Duration::minutes(30))
            .unwrap();

        assert_eq!(token.split('.').count(), 3);

        let claims = codec.parse_claims(&token).unwrap();
        assert_eq!(claims.subject().as_deref(), Some("alice"));
        assert_eq!(claims.get_text("role").as_deref(), Some("ADMIN"));
        assert_eq!(claims.get_text("userId").as_deref(), Some("7"));
        let iat = claims.issued_at().unwrap();
        let exp = claims.expires_at().unwrap();
        assert!((exp - iat - 1800).abs() <= 1);
        assert!(!codec.is_expired(&claims));
    }

    #[test]
    fn registered_claims_are_overwritten() {
        let codec = codec();
        let input = Claims::new().with("sub", "mallory").with("exp", 1);
        let token = codec
            .issue(input, Some("alice"), chrono::Duration::minutes(5))
            .unwrap();
        let claims = codec.decode(&token).unwrap();
        assert_eq!(claims.subject().as_deref(), Some("alice"));
        assert!(claims.expires_at().unwrap() > 1);
    }

    #[test]
    fn expired_token_parses_but_fails_decode() {
        let codec = codec();
        let token = codec
            .issue(Claims::new(), Some("alice"), chrono::Duration::seconds(-10))
            .unwrap();

        let claims = codec.parse_claims(&token).unwrap();
        assert!(codec.is_expired(&claims));
        assert_eq!(codec.decode(&token), Err(TokenError::Expired));
    }

    #[test]
    fn leeway_tolerates_recent_expiry() {
        let lenient = TokenCodec::new(SECRET, 60).unwrap();
        let token = lenient
            .issue(Claims::new(), Some("alice"), chrono::Duration::seconds(-10))
            .unwrap();
        assert!(lenient.decode(&token).is_ok());
    }

    #[test]
    fn wrong_secret_is_bad_signature() {
        let token = TokenCodec::new(OTHER_SECRET, 0)
            .unwrap()
            .issue(Claims::new(), Some("alice"), chrono::Duration::minutes(5))
            .unwrap();
        assert_eq!(codec().parse_claims(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn bad_signature_reported_before_expiry() {
        let token = TokenCodec::new(OTHER_SECRET, 0)
            .unwrap()
            .issue(Claims::new(), Some("alice"), chrono::Duration::seconds(-10))
            .unwrap();
        assert_eq!(codec().decode(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn structural_garbage_is_malformed() {
        let codec = codec();
        assert_eq!(codec.parse_claims(""), Err(TokenError::Malformed));
        assert_eq!(codec.parse_claims("abc"), Err(TokenError::Malformed));
        assert_eq!(codec.parse_claims("a..c"), Err(TokenError::Malformed));
        assert_eq!(codec.parse_claims("a.b.c"), Err(TokenError::Malformed));
    }

    #[test]
    fn duplicated_token_is_malformed() {
        let codec = codec();
        let token = codec
            .issue(Claims::new(), Some("alice"), chrono::Duration::minutes(5))
            .unwrap();
        let doubled = format!("{token}.{token}");
        assert_eq!(codec.parse_claims(&doubled), Err(TokenError::Malformed));
    }

    #[test]
    fn unsigned_alg_none_token_is_rejected() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"alice","exp":9999999999}"#);
        let forged = format!("{header}.{payload}.sig");
        assert!(codec().parse_claims(&forged).is_err());
    }

    #[test]
    fn missing_exp_counts_as_expired() {
        assert!(codec().is_expired(&Claims::new()));
    }

    #[test]
    fn decode_unverified_ignores_signature() {
        let token = TokenCodec::new(OTHER_SECRET, 0)
            .unwrap()
            .issue(Claims::new().with("userId", 9), Some("bob"), chrono::Duration::minutes(5))
            .unwrap();
        let claims = TokenCodec::decode_unverified(&token).unwrap();
        assert_eq!(claims.subject().as_deref(), Some("bob"));
        assert_eq!(claims.get_text("userId").as_deref(), Some("9"));
        assert_eq!(TokenCodec::decode_unverified("nope"), Err(TokenError::Malformed));
    }
}
