// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token issuance for authenticated identities.
//!
//! ## Token Kinds
//!
//! | Kind | Subject | Marker | Default lifetime |
//! |------|---------|--------|------------------|
//! | Access | username | `authorities` (+ profile claims) | 30 min |
//! | Refresh | username | `tokenType=refresh`, `jti` | 7 days |
//! | Service | none | `type=service` | 60 s |

use std::sync::Arc;

use uuid::Uuid;

use super::claims::{self, Claims, Identity, Profile};
use super::codec::{CodecError, TokenCodec, TokenError};
use crate::config::TokenSettings;

/// Builds access, refresh and service tokens over a shared [`TokenCodec`].
#[derive(Clone)]
pub struct TokenIssuer {
    codec: Arc<TokenCodec>,
    access_validity: chrono::Duration,
    refresh_validity: chrono::Duration,
    service_validity: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(settings: &TokenSettings) -> Result<Self, CodecError> {
        let codec = TokenCodec::new(&settings.secret, settings.leeway_secs)?;
        Ok(Self::with_codec(Arc::new(codec), settings))
    }

    pub fn with_codec(codec: Arc<TokenCodec>, settings: &TokenSettings) -> Self {
        Self {
            codec,
            access_validity: settings.access_validity,
            refresh_validity: settings.refresh_validity,
            service_validity: settings.service_validity,
        }
    }

    pub fn codec(&self) -> &Arc<TokenCodec> {
        &self.codec
    }

    /// Access token lifetime in whole seconds (the `expiresIn` of a token pair).
    pub fn access_validity_secs(&self) -> i64 {
        self.access_validity.num_seconds()
    }

    /// Lifetime of refresh tokens, also used as the stored-record TTL.
    pub fn refresh_validity(&self) -> chrono::Duration {
        self.refresh_validity
    }

    /// Issue an access token. Profile claims are only added when `profile` is given.
    pub fn issue_access_token(
        &self,
        identity: &Identity,
        profile: Option<&Profile>,
    ) -> Result<String, CodecError> {
        let mut claims = Claims::new().with(claims::AUTHORITIES, identity.joined_authorities());

        if let Some(profile) = profile {
            claims.insert(claims::USER_ID, profile.user_id.to_string());
            if let Some(name) = &profile.name {
                claims.insert(claims::NAME, name.as_str());
            }
            if let Some(email) = &profile.email {
                claims.insert(claims::EMAIL, email.as_str());
            }
        }

        self.codec
            .issue(claims, Some(identity.subject()), self.access_validity)
    }

    pub fn issue_refresh_token(&self, identity: &Identity) -> Result<String, CodecError> {
        let claims = Claims::new()
            .with(claims::TOKEN_TYPE, claims::REFRESH_TOKEN_TYPE)
            .with(claims::TOKEN_ID, Uuid::new_v4().to_string());
        self.codec
            .issue(claims, Some(identity.subject()), self.refresh_validity)
    }

    /// Short-lived token identifying this service rather than a user.
    pub fn issue_service_token(&self) -> Result<String, CodecError> {
        let claims = Claims::new().with(claims::TYPE, claims::SERVICE_TYPE);
        self.codec.issue(claims, None, self.service_validity)
    }

    /// Signature and expiry check. Every failure collapses to `false`.
    pub fn verify(&self, token: &str) -> bool {
        self.codec.decode(token).is_ok()
    }

    /// True iff the token decodes (signature and expiry) and is marked `type=service`.
    pub fn is_service_token(&self, token: &str) -> bool {
        self.codec
            .decode(token)
            .map(|claims| claims.is_service_token())
            .unwrap_or(false)
    }

    /// Fully verified claims, with the failure cause.
    pub fn claims(&self, token: &str) -> Result<Claims, TokenError> {
        self.codec.decode(token)
    }

    /// Signature-checked claims of a refresh token, ignoring its embedded expiry.
    ///
    /// The stored record's TTL decides whether a refresh token is still live.
    /// Tokens without the refresh marker are reported as malformed.
    pub fn parse_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.codec.parse_claims(token)?;
        if !claims.is_refresh_token() {
            return Err(TokenError::Malformed);
        }
        Ok(claims)
    }
}
