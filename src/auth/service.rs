// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Orchestrator
//!
//! Coordinates the login, refresh and logout flows.
//!
//! ## Failure Policy
//!
//! | Collaborator | Failure during login | Failure during refresh |
//! |--------------|----------------------|------------------------|
//! | Credential verifier | `AuthenticationFailure` / `UpstreamUnavailable` | not called |
//! | Member lookup (enrichment) | baseline token issued | baseline token issued |
//! | Refresh store | login aborted | refresh fails |
//!
//! Every store and lookup call is bounded by a timeout; a timeout counts as a
//! failure of that call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::claims::{Identity, Profile};
use super::codec::TokenError;
use super::credentials::{CredentialError, CredentialVerifier};
use super::error::AuthError;
use super::issuer::TokenIssuer;
use super::roles::Role;
use crate::providers::{UserLookup, UserRecord};
use crate::storage::{RefreshTokenStore, StoreResult};

pub const BEARER_TOKEN_TYPE: &str = "Bearer";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

// Client-facing 503 messages. Backend detail stays in the logs.
const STORE_UNAVAILABLE: &str = "refresh store unavailable";
const DIRECTORY_UNAVAILABLE: &str = "member directory unavailable";

/// Access/refresh pair handed back to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct AuthService {
    issuer: TokenIssuer,
    verifier: Arc<dyn CredentialVerifier>,
    lookup: Arc<dyn UserLookup>,
    store: Arc<dyn RefreshTokenStore>,
    store_timeout: Duration,
    lookup_timeout: Duration,
}

impl AuthService {
    pub fn new(
        issuer: TokenIssuer,
        verifier: Arc<dyn CredentialVerifier>,
        lookup: Arc<dyn UserLookup>,
        store: Arc<dyn RefreshTokenStore>,
    ) -> Self {
        Self {
            issuer,
            verifier,
            lookup,
            store,
            store_timeout: DEFAULT_TIMEOUT,
            lookup_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, store_timeout: Duration, lookup_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self.lookup_timeout = lookup_timeout;
        self
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn store(&self) -> &Arc<dyn RefreshTokenStore> {
        &self.store
    }

    /// Authenticate credentials and issue a persisted token pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, AuthError> {
        tracing::info!(username = %username, "Login attempt");

        let identity = match tokio::time::timeout(
            self.lookup_timeout,
            self.verifier.authenticate(username, password),
        )
        .await
        {
            Ok(Ok(identity)) => identity,
            Ok(Err(CredentialError::InvalidCredentials)) => {
                tracing::warn!(username = %username, "Login failed: invalid credentials");
                return Err(AuthError::AuthenticationFailure);
            }
            Ok(Err(CredentialError::Unavailable(msg))) => {
                tracing::error!(username = %username, error = %msg, "Login failed: credential backend unavailable");
                return Err(AuthError::UpstreamUnavailable(DIRECTORY_UNAVAILABLE.to_string()));
            }
            Err(_) => {
                tracing::error!(username = %username, "Login failed: credential check timed out");
                return Err(AuthError::UpstreamUnavailable(DIRECTORY_UNAVAILABLE.to_string()));
            }
        };

        let profile = self.lookup_member(identity.subject()).await.map(|r| r.profile());
        let pair = self.issue_pair(&identity, profile.as_ref())?;

        self.bounded(
            "save",
            self.store.save(
                identity.subject(),
                &pair.refresh_token,
                self.issuer.refresh_validity(),
            ),
        )
        .await?;

        tracing::info!(username = %username, enriched = profile.is_some(), "Login succeeded");
        Ok(pair)
    }

    /// Rotate a refresh token into a new pair.
    ///
    /// The presented token must be validly signed and byte-identical to the
    /// stored record. The stored record's TTL decides expiry.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.issuer.parse_refresh(refresh_token).map_err(|e| {
            tracing::warn!(error = %e, "Refresh rejected: invalid token");
            AuthError::TokenInvalid(e)
        })?;
        let username = claims
            .subject()
            .ok_or(AuthError::TokenInvalid(TokenError::Malformed))?;

        let record = self
            .bounded("find", self.store.find_record(&username))
            .await?
            .ok_or_else(|| {
                tracing::warn!(username = %username, "Refresh rejected: no stored token");
                AuthError::NoStoredToken
            })?;

        if record.is_expired() {
            tracing::warn!(username = %username, "Refresh rejected: stored token expired");
            if let Err(e) = self.bounded("delete", self.store.delete(&username)).await {
                tracing::warn!(username = %username, error = %e, "Could not delete expired refresh token");
            }
            return Err(AuthError::TokenExpiredStored);
        }

        if record.token != refresh_token {
            tracing::warn!(username = %username, "Refresh rejected: token does not match stored token");
            return Err(AuthError::TokenMismatch);
        }

        let member = self.lookup_member(&username).await;
        let role = member
            .as_ref()
            .and_then(|r| r.role.as_deref())
            .and_then(Role::parse)
            .unwrap_or_default();
        let identity = Identity::new(username.clone(), vec![role]);
        let profile = member.map(|r| r.profile());

        let pair = self.issue_pair(&identity, profile.as_ref())?;
        self.bounded(
            "save",
            self.store
                .save(&username, &pair.refresh_token, self.issuer.refresh_validity()),
        )
        .await?;

        tracing::info!(username = %username, "Refresh token rotated");
        Ok(pair)
    }

    /// Drop the stored refresh token for the token's subject.
    ///
    /// Never fails: invalid tokens and store errors are logged and ignored.
    pub async fn logout(&self, refresh_token: &str) {
        let username = match self.issuer.parse_refresh(refresh_token) {
            Ok(claims) => claims.subject(),
            Err(e) => {
                tracing::debug!(error = %e, "Logout with invalid refresh token");
                return;
            }
        };
        let Some(username) = username else {
            return;
        };

        match self.bounded("delete", self.store.delete(&username)).await {
            Ok(()) => tracing::info!(username = %username, "Logged out"),
            Err(e) => tracing::warn!(username = %username, error = %e, "Logout could not delete refresh token"),
        }
    }

    /// Best-effort member lookup. Any failure yields `None`.
    async fn lookup_member(&self, username: &str) -> Option<UserRecord> {
        match tokio::time::timeout(self.lookup_timeout, self.lookup.get_by_username(username)).await
        {
            Ok(Ok(record)) => Some(record),
            Ok(Err(e)) => {
                tracing::warn!(username = %username, error = %e, "Member lookup failed, issuing baseline token");
                None
            }
            Err(_) => {
                tracing::warn!(username = %username, "Member lookup timed out, issuing baseline token");
                None
            }
        }
    }

    fn issue_pair(&self, identity: &Identity, profile: Option<&Profile>) -> Result<TokenPair, AuthError> {
        let access_token = self
            .issuer
            .issue_access_token(identity, profile)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        let refresh_token = self
            .issuer
            .issue_refresh_token(identity)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: BEARER_TOKEN_TYPE.to_string(),
            expires_in: self.issuer.access_validity_secs(),
        })
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = StoreResult<T>>,
    ) -> Result<T, AuthError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::error!(operation, error = %e, "Refresh store call failed");
                Err(AuthError::UpstreamUnavailable(STORE_UNAVAILABLE.to_string()))
            }
            Err(_) => {
                tracing::error!(
                    operation,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "Refresh store call timed out"
                );
                Err(AuthError::UpstreamUnavailable(STORE_UNAVAILABLE.to_string()))
            }
        }
    }
}
