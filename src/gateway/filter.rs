// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Gateway Verification Filter
//!
//! Every request entering the edge passes through [`gateway_middleware`],
//! which reaches exactly one terminal outcome:
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | path has a `.` or `..` segment | 400 |
//! | path matches a public prefix | forwarded unchanged |
//! | no `Authorization` header | 401 |
//! | header is not `Bearer ` | 401 |
//! | structure, signature or expiry check fails | 401 |
//! | no `userId` claim | 403 |
//! | otherwise | forwarded with `X-Auth-*` identity headers |
//!
//! Client-supplied `X-Auth-*` headers are removed on every path so that only
//! the gateway can set them.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::claims::{self, Claims};
use crate::auth::identity::{BEARER_PREFIX, ROLES_HEADER, USERNAME_HEADER, USER_ID_HEADER};
use crate::auth::roles::{join_authorities, Role};
use crate::auth::{AuthError, TokenCodec, TokenError};
use crate::config::GatewaySettings;

const TRUSTED_HEADER_PREFIX: &str = "x-auth-";

/// How tokens with the wrong number of segments are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentPolicy {
    /// Anything but three segments is malformed.
    Strict,
    /// Keep the first three segments of a longer token (doubled tokens).
    LegacyTruncate,
}

#[derive(Debug, Clone)]
pub struct GatewayPolicy {
    public_prefixes: Vec<String>,
    segments: SegmentPolicy,
    forward_authorization: bool,
}

impl GatewayPolicy {
    pub fn new(
        public_prefixes: Vec<String>,
        segments: SegmentPolicy,
        forward_authorization: bool,
    ) -> Self {
        Self {
            public_prefixes,
            segments,
            forward_authorization,
        }
    }

    pub fn from_settings(settings: &GatewaySettings) -> Self {
        let segments = if settings.legacy_token_truncation {
            SegmentPolicy::LegacyTruncate
        } else {
            SegmentPolicy::Strict
        };
        Self::new(
            settings.public_paths.clone(),
            segments,
            settings.forward_authorization,
        )
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    pub fn forwards_authorization(&self) -> bool {
        self.forward_authorization
    }

    /// Apply the segment policy to a raw token.
    pub fn normalize<'a>(&self, token: &'a str) -> &'a str {
        match self.segments {
            SegmentPolicy::Strict => token,
            SegmentPolicy::LegacyTruncate => match token.match_indices('.').nth(2) {
                Some((third_dot, _)) => &token[..third_dot],
                None => token,
            },
        }
    }
}

/// Identity the gateway vouches for downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedIdentity {
    pub user_id: String,
    pub username: Option<String>,
    /// Comma-joined `ROLE_` authorities.
    pub roles: String,
}

impl ForwardedIdentity {
    fn from_claims(claims: &Claims) -> Result<Self, AuthError> {
        let user_id = claims
            .get_text(claims::USER_ID)
            .ok_or(AuthError::MissingClaim(claims::USER_ID))?;

        let mut roles = claims.roles();
        if roles.is_empty() {
            roles.push(Role::user());
        }

        Ok(Self {
            user_id,
            username: claims.subject(),
            roles: join_authorities(&roles),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayDecision {
    Public,
    Authenticated(ForwardedIdentity),
}

/// Verification half of the gateway: decides, never forwards.
#[derive(Clone)]
pub struct GatewayFilter {
    policy: GatewayPolicy,
    codec: Arc<TokenCodec>,
}

impl GatewayFilter {
    pub fn new(policy: GatewayPolicy, codec: Arc<TokenCodec>) -> Self {
        Self { policy, codec }
    }

    pub fn policy(&self) -> &GatewayPolicy {
        &self.policy
    }

    pub fn check(
        &self,
        path: &str,
        authorization: Option<&HeaderValue>,
    ) -> Result<GatewayDecision, AuthError> {
        if self.policy.is_public(path) {
            return Ok(GatewayDecision::Public);
        }

        let header = authorization.ok_or(AuthError::MissingAuthHeader)?;
        let token = header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
            .ok_or(AuthError::InvalidAuthHeader)?
            .trim();

        let claims = self.codec.decode(self.policy.normalize(token))?;
        ForwardedIdentity::from_claims(&claims).map(GatewayDecision::Authenticated)
    }
}

/// Rejection body: the usual error JSON plus the request path and status.
#[derive(Debug)]
pub struct GatewayRejection {
    status: StatusCode,
    message: String,
    code: &'static str,
    path: String,
}

impl GatewayRejection {
    pub fn auth(error: AuthError, path: String) -> Self {
        Self {
            status: error.status_code(),
            message: error.to_string(),
            code: error.error_code(),
            path,
        }
    }

    pub fn dot_segments(path: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Path must not contain dot segments".to_string(),
            code: "invalid_path",
            path,
        }
    }
}

#[derive(Serialize)]
struct RejectionBody<'a> {
    error: &'a str,
    error_code: &'static str,
    path: &'a str,
    status: u16,
}

impl IntoResponse for GatewayRejection {
    fn into_response(self) -> Response {
        let body = RejectionBody {
            error: &self.message,
            error_code: self.code,
            path: &self.path,
            status: self.status.as_u16(),
        };
        (self.status, Json(body)).into_response()
    }
}

/// True when any segment is `.` or `..`, literally or percent-encoded.
///
/// Upstream URL building resolves such segments, which would let a path
/// under a public prefix reach a protected one. Backslashes count as
/// separators because URL parsing treats them that way for http(s).
pub fn has_dot_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

fn strip_trusted_headers(headers: &mut HeaderMap) {
    let spoofed: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with(TRUSTED_HEADER_PREFIX))
        .cloned()
        .collect();
    for name in spoofed {
        headers.remove(&name);
    }
}

fn inject_identity(headers: &mut HeaderMap, identity: &ForwardedIdentity) -> Result<(), AuthError> {
    let value = |text: &str| {
        HeaderValue::from_str(text).map_err(|_| AuthError::TokenInvalid(TokenError::Malformed))
    };

    headers.insert(USER_ID_HEADER, value(&identity.user_id)?);
    if let Some(username) = &identity.username {
        headers.insert(USERNAME_HEADER, value(username)?);
    }
    headers.insert(ROLES_HEADER, value(&identity.roles)?);
    Ok(())
}

/// axum middleware running [`GatewayFilter::check`] ahead of the proxy.
pub async fn gateway_middleware(
    State(filter): State<Arc<GatewayFilter>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if has_dot_segment(&path) {
        tracing::warn!(%path, "Gateway rejected path with dot segments");
        return GatewayRejection::dot_segments(path).into_response();
    }
    strip_trusted_headers(request.headers_mut());

    let outcome = filter
        .check(&path, request.headers().get(AUTHORIZATION))
        .and_then(|decision| {
            if let GatewayDecision::Authenticated(identity) = &decision {
                inject_identity(request.headers_mut(), identity)?;
            }
            Ok(decision)
        });

    match outcome {
        Ok(GatewayDecision::Public) => {
            tracing::debug!(%path, "Public path, forwarding unchanged");
        }
        Ok(GatewayDecision::Authenticated(identity)) => {
            if !filter.policy().forwards_authorization() {
                request.headers_mut().remove(AUTHORIZATION);
            }
            tracing::info!(
                %path,
                user_id = %identity.user_id,
                username = identity.username.as_deref().unwrap_or_default(),
                "Token verified, forwarding"
            );
        }
        Err(error) => {
            tracing::warn!(
                %path,
                error_code = error.error_code(),
                status = error.status_code().as_u16(),
                "Gateway rejected request"
            );
            return GatewayRejection::auth(error, path).into_response();
        }
    }

    next.run(request).await
}

/// `{"status":"UP"}` for load balancer probes.
pub async fn actuator_health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "UP" })))
}
