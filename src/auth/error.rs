// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::codec::TokenError;

/// Authentication error type.
///
/// Covers the login / refresh / logout flows, the gateway filter, and the
/// extractors. Every variant maps to a stable `error_code` and HTTP status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Credentials were rejected
    AuthenticationFailure,
    /// Token is malformed, badly signed, or expired
    TokenInvalid(TokenError),
    /// No refresh token is stored for the subject
    NoStoredToken,
    /// Presented refresh token is not the one currently stored
    TokenMismatch,
    /// Stored refresh record is past its TTL (and has been deleted)
    TokenExpiredStored,
    /// No authorization header present
    MissingAuthHeader,
    /// Invalid authorization header format
    InvalidAuthHeader,
    /// Token verified but a required claim is absent
    MissingClaim(&'static str),
    /// Insufficient permissions
    InsufficientPermissions,
    /// Refresh store or member directory unreachable
    UpstreamUnavailable(String),
    /// Internal error
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::AuthenticationFailure => "authentication_failed",
            AuthError::TokenInvalid(TokenError::Malformed) => "malformed_token",
            AuthError::TokenInvalid(TokenError::BadSignature) => "invalid_signature",
            AuthError::TokenInvalid(TokenError::Expired) => "token_expired",
            AuthError::NoStoredToken => "no_stored_token",
            AuthError::TokenMismatch => "token_mismatch",
            AuthError::TokenExpiredStored => "stored_token_expired",
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MissingClaim(_) => "missing_claim",
            AuthError::InsufficientPermissions => "insufficient_permissions",
            AuthError::UpstreamUnavailable(_) => "upstream_unavailable",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::AuthenticationFailure
            | AuthError::TokenInvalid(_)
            | AuthError::NoStoredToken
            | AuthError::TokenMismatch
            | AuthError::TokenExpiredStored
            | AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader => StatusCode::UNAUTHORIZED,
            AuthError::MissingClaim(_) | AuthError::InsufficientPermissions => {
                StatusCode::FORBIDDEN
            }
            AuthError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::AuthenticationFailure => write!(f, "Invalid username or password"),
            AuthError::TokenInvalid(reason) => write!(f, "Invalid token: {reason}"),
            AuthError::NoStoredToken => write!(f, "No stored refresh token"),
            AuthError::TokenMismatch => write!(f, "Refresh token does not match the stored token"),
            AuthError::TokenExpiredStored => write!(f, "Refresh token has expired"),
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::MissingClaim(claim) => write!(f, "Token is missing the '{claim}' claim"),
            AuthError::InsufficientPermissions => {
                write!(f, "Insufficient permissions for this operation")
            }
            AuthError::UpstreamUnavailable(msg) => write!(f, "Upstream unavailable: {msg}"),
            AuthError::InternalError(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        AuthError::TokenInvalid(err)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
