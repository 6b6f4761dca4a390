// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors over the request's identity context.
//!
//! Use the `Auth` extractor in handlers to require an identity:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(identity): Auth) -> impl IntoResponse {
//!     // identity is IdentityContext
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::claims::{self, Claims, IdentityContext};
use super::identity::bearer_token;
use super::AuthError;
use crate::state::AppState;

/// Extractor for requests with a resolved identity.
///
/// Reads the context placed by the identity middleware. When the middleware
/// is not installed the headers are resolved on the spot.
pub struct Auth(pub IdentityContext);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<IdentityContext>().cloned() {
            return Ok(Auth(context));
        }

        if let Some(context) = state.identity.resolve(&parts.headers) {
            return Ok(Auth(context));
        }

        if !parts.headers.contains_key(AUTHORIZATION) {
            return Err(AuthError::MissingAuthHeader);
        }
        let token = bearer_token(&parts.headers).ok_or(AuthError::InvalidAuthHeader)?;
        match state.issuer().claims(token) {
            Ok(_) => Err(AuthError::MissingClaim(claims::USER_ID)),
            Err(e) => Err(AuthError::TokenInvalid(e)),
        }
    }
}

/// Extractor that requires the `ADMIN` role.
pub struct AdminOnly(pub IdentityContext);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(context) = Auth::from_request_parts(parts, state).await?;

        if !context.is_admin() {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(context))
    }
}

/// Optional identity. Never rejects.
pub struct OptionalAuth(pub Option<IdentityContext>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match Auth::from_request_parts(parts, state).await {
            Ok(Auth(context)) => Ok(OptionalAuth(Some(context))),
            Err(_) => Ok(OptionalAuth(None)),
        }
    }
}

/// Extractor for service-to-service calls.
///
/// Requires a bearer service token (`type=service`) that verifies against the
/// shared secret. User tokens are refused with 403.
pub struct ServiceCaller(pub Claims);

impl FromRequestParts<AppState> for ServiceCaller {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Err(AuthError::MissingAuthHeader);
        }
        let token = bearer_token(&parts.headers).ok_or(AuthError::InvalidAuthHeader)?;
        let claims = state.issuer().claims(token)?;

        if !claims.is_service_token() {
            tracing::warn!("Non-service token presented to an internal endpoint");
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(ServiceCaller(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::test_state;
    use crate::auth::claims::Identity;
    use crate::auth::codec::TokenError;
    use crate::auth::identity::{ROLES_HEADER, USER_ID_HEADER};
    use crate::auth::roles::Role;
    use axum::http::Request;

    fn parts(headers: &[(&str, String)]) -> Parts {
        let mut builder = Request::builder().uri("/test");
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let (state, _store) = test_state();
        let mut parts = parts(&[]);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_rejects_non_bearer_header() {
        let (state, _store) = test_state();
        let mut parts = parts(&[("authorization", "Basic abc".to_string())]);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_reports_expired_token() {
        let (state, _store) = test_state();
        let expired = state
            .issuer()
            .codec()
            .issue(Claims::new().with("sub", "alice"), None, chrono::Duration::seconds(-5))
            .unwrap();
        let mut parts = parts(&[("authorization", format!("Bearer {expired}"))]);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::TokenInvalid(TokenError::Expired))));
    }

    #[tokio::test]
    async fn auth_extractor_succeeds_with_access_token() {
        let (state, _store) = test_state();
        let token = state
            .issuer()
            .issue_access_token(&Identity::new("alice", vec![Role::user()]), None)
            .unwrap();
        let mut parts = parts(&[("authorization", format!("Bearer {token}"))]);

        let Auth(context) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(context.user_id, "alice");
    }

    #[tokio::test]
    async fn auth_extractor_prefers_extensions() {
        let (state, _store) = test_state();
        let mut parts = parts(&[]);
        parts
            .extensions
            .insert(IdentityContext::new("from_middleware", vec![Role::admin()]));

        let Auth(context) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(context.user_id, "from_middleware");
    }

    #[tokio::test]
    async fn admin_only_rejects_non_admin() {
        let (state, _store) = test_state();
        let mut parts = parts(&[
            (USER_ID_HEADER, "7".to_string()),
            (ROLES_HEADER, "ROLE_USER".to_string()),
        ]);

        let result = AdminOnly::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
    }

    #[tokio::test]
    async fn optional_auth_returns_none_without_identity() {
        let (state, _store) = test_state();
        let mut parts = parts(&[]);

        let OptionalAuth(context) = OptionalAuth::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(context.is_none());
    }

    #[tokio::test]
    async fn service_caller_accepts_only_service_tokens() {
        let (state, _store) = test_state();
        let service = state.issuer().issue_service_token().unwrap();
        let user = state
            .issuer()
            .issue_access_token(&Identity::new("alice", Vec::new()), None)
            .unwrap();

        let mut ok = parts(&[("authorization", format!("Bearer {service}"))]);
        assert!(ServiceCaller::from_request_parts(&mut ok, &state).await.is_ok());

        let mut refused = parts(&[("authorization", format!("Bearer {user}"))]);
        assert!(matches!(
            ServiceCaller::from_request_parts(&mut refused, &state).await,
            Err(AuthError::InsufficientPermissions)
        ));
    }
}
