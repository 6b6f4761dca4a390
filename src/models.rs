// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the auth service. Field names are
//! camelCase on the wire.
//!
//! ## Model Categories
//!
//! - **Credentials**: login, refresh and logout requests
//! - **Tokens**: the access/refresh pair returned to clients
//! - **Introspection**: token verification for internal callers

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::TokenPair;
use crate::error::ApiError;

/// Credentials for `POST /api/auth/login`.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.username.trim().is_empty() {
            return Err(ApiError::invalid_request("username must not be blank"));
        }
        if self.password.is_empty() {
            return Err(ApiError::invalid_request("password must not be blank"));
        }
        Ok(())
    }
}

/// Body of `POST /api/auth/refresh` and `POST /api/auth/logout`.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

impl RefreshTokenRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.refresh_token.trim().is_empty() {
            return Err(ApiError::invalid_request("refreshToken must not be blank"));
        }
        Ok(())
    }
}

/// Access/refresh token pair.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `Bearer`.
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: pair.token_type,
            expires_in: pair.expires_in,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Token submitted for introspection.
#[derive(Deserialize, ToSchema)]
pub struct VerifyRequest {
    pub token: String,
}

/// Introspection result. `subject` and `authorities` are empty for invalid tokens.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub authorities: Vec<String>,
}
