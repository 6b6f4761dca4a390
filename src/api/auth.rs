// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login, refresh and logout endpoints.

use axum::{extract::State, Json};

use crate::{
    auth::ServiceCaller,
    error::ApiError,
    models::{
        LoginRequest, MessageResponse, RefreshTokenRequest, TokenResponse, VerifyRequest,
        VerifyResponse,
    },
    state::AppState,
};

#[utoipa::path(
    get,
    path = "/api/auth/ping",
    tag = "Auth",
    responses((status = 200, description = "Service reachable", body = MessageResponse))
)]
pub async fn ping() -> Json<MessageResponse> {
    Json(MessageResponse::new("Auth service ping success"))
}

/// Exchange credentials for an access/refresh token pair.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login succeeded", body = TokenResponse),
        (status = 400, description = "Blank username or password"),
        (status = 401, description = "Invalid credentials"),
        (status = 503, description = "Refresh store or member directory unavailable")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    request.validate()?;
    let pair = state.auth.login(request.username.trim(), &request.password).await?;
    Ok(Json(pair.into()))
}

/// Rotate a refresh token into a new pair.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenResponse),
        (status = 400, description = "Blank refresh token"),
        (status = 401, description = "Invalid, mismatched, expired or unknown refresh token"),
        (status = 503, description = "Refresh store unavailable")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    request.validate()?;
    let pair = state.auth.refresh(request.refresh_token.trim()).await?;
    Ok(Json(pair.into()))
}

/// Forget the stored refresh token. Always acknowledged.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 400, description = "Blank refresh token")
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    request.validate()?;
    state.auth.logout(request.refresh_token.trim()).await;
    Ok(Json(MessageResponse::new("Logged out")))
}

/// Token introspection for other services.
#[utoipa::path(
    post,
    path = "/api/auth/internal/verify",
    tag = "Auth",
    security(("bearer" = [])),
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Verification result", body = VerifyResponse),
        (status = 401, description = "Missing or invalid service token"),
        (status = 403, description = "Caller is not a service")
    )
)]
pub async fn verify(
    _caller: ServiceCaller,
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Json<VerifyResponse> {
    let response = match state.issuer().claims(request.token.trim()) {
        Ok(claims) => VerifyResponse {
            valid: true,
            subject: claims.subject(),
            authorities: claims.roles().iter().map(|r| r.authority()).collect(),
        },
        Err(e) => {
            tracing::debug!(error = %e, "Introspected token is invalid");
            VerifyResponse {
                valid: false,
                subject: None,
                authorities: Vec::new(),
            }
        }
    };
    Json(response)
}

/// Baseline `testuser` token pair. Not persisted.
#[cfg(feature = "dev")]
#[utoipa::path(
    get,
    path = "/api/auth/test/token",
    tag = "Auth",
    responses((status = 200, description = "Test token pair", body = TokenResponse))
)]
pub async fn test_token(State(state): State<AppState>) -> Result<Json<TokenResponse>, ApiError> {
    use crate::auth::{AuthError, Identity, Role};

    let identity = Identity::new("testuser", vec![Role::user()]);
    let issuer = state.issuer();
    let issue_err = |e: crate::auth::codec::CodecError| ApiError::from(AuthError::InternalError(e.to_string()));

    Ok(Json(TokenResponse {
        access_token: issuer.issue_access_token(&identity, None).map_err(issue_err)?,
        refresh_token: issuer.issue_refresh_token(&identity).map_err(issue_err)?,
        token_type: crate::auth::service::BEARER_TOKEN_TYPE.to_string(),
        expires_in: issuer.access_validity_secs(),
    }))
}
