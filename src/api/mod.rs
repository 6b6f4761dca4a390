// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::identity_middleware,
    models::{
        LoginRequest, MessageResponse, RefreshTokenRequest, TokenResponse, VerifyRequest,
        VerifyResponse,
    },
    state::AppState,
};

pub mod auth;
pub mod health;
pub mod users;

pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/ping", get(auth::ping))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/internal/verify", post(auth::verify));

    #[cfg(feature = "dev")]
    let auth_routes = auth_routes.route("/test/token", get(auth::test_token));

    let api_routes = Router::new()
        .nest("/api/auth", auth_routes)
        .route("/api/users/me", get(users::get_current_user))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .layer(middleware::from_fn_with_state(
            state.identity.clone(),
            identity_middleware,
        ))
        .with_state(state);

    with_http_layers(
        Router::new()
            .merge(api_routes)
            .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi())),
    )
}

/// CORS, request tracing and `x-request-id` handling shared by both binaries.
pub fn with_http_layers(router: Router) -> Router {
    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::ping,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::verify,
        users::get_current_user,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            LoginRequest,
            RefreshTokenRequest,
            TokenResponse,
            MessageResponse,
            VerifyRequest,
            VerifyResponse,
            users::UserMeResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token refresh and logout"),
        (name = "Users", description = "Caller identity"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    use crate::auth::credentials::tests::StaticLookup;
    use crate::auth::credentials::DirectoryCredentialVerifier;
    use crate::auth::{AuthService, IdentityResolver, TokenIssuer};
    use crate::config::TokenSettings;
    use crate::providers::UserLookup;
    use crate::storage::{MemoryRefreshStore, RefreshTokenStore};

    pub(crate) const SECRET: &str = "0123456789abcdef0123456789abcdef";

    /// State with one member, alice/correct, and an in-memory refresh store.
    pub(crate) fn test_state() -> (AppState, MemoryRefreshStore) {
        let issuer = TokenIssuer::new(&TokenSettings::with_secret(SECRET)).unwrap();
        let lookup: Arc<dyn UserLookup> =
            Arc::new(StaticLookup::with_user("alice", "correct", Some("USER")));
        let store = MemoryRefreshStore::new();
        let auth = AuthService::new(
            issuer.clone(),
            Arc::new(DirectoryCredentialVerifier::new(lookup.clone())),
            lookup,
            Arc::new(store.clone()),
        );
        let identity = IdentityResolver::verified(issuer.codec().clone());
        (AppState::new(auth, identity), store)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login(app: &Router) -> serde_json::Value {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/auth/login",
                serde_json::json!({"username": "alice", "password": "correct"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        json_body(response).await
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (state, _store) = test_state();
        let app = router(state);
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn login_returns_token_pair_and_persists_refresh_token() {
        let (state, store) = test_state();
        let app = router(state);

        let body = login(&app).await;
        assert_eq!(body["tokenType"], "Bearer");
        assert_eq!(body["expiresIn"], 1800);
        assert!(!body["accessToken"].as_str().unwrap().is_empty());
        assert_eq!(
            store.find("alice").await.unwrap().as_deref(),
            body["refreshToken"].as_str()
        );
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_401() {
        let (state, _store) = test_state();
        let response = router(state)
            .oneshot(post_json(
                "/api/auth/login",
                serde_json::json!({"username": "alice", "password": "nope"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error_code"], "authentication_failed");
    }

    #[tokio::test]
    async fn blank_username_is_400() {
        let (state, _store) = test_state();
        let response = router(state)
            .oneshot(post_json(
                "/api/auth/login",
                serde_json::json!({"username": " ", "password": "correct"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error_code"], "invalid_request");
    }

    #[tokio::test]
    async fn refresh_rotates_and_rejects_stale_token() {
        let (state, _store) = test_state();
        let app = router(state);
        let first = login(&app).await;

        let refreshed = app
            .clone()
            .oneshot(post_json(
                "/api/auth/refresh",
                serde_json::json!({"refreshToken": first["refreshToken"]}),
            ))
            .await
            .unwrap();
        assert_eq!(refreshed.status(), StatusCode::OK);

        let stale = app
            .oneshot(post_json(
                "/api/auth/refresh",
                serde_json::json!({"refreshToken": first["refreshToken"]}),
            ))
            .await
            .unwrap();
        assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(stale).await["error_code"], "token_mismatch");
    }

    #[tokio::test]
    async fn logout_twice_is_ok() {
        let (state, store) = test_state();
        let app = router(state);
        let tokens = login(&app).await;

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/api/auth/logout",
                    serde_json::json!({"refreshToken": tokens["refreshToken"]}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn me_reflects_bearer_identity() {
        let (state, _store) = test_state();
        let app = router(state);
        let tokens = login(&app).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/users/me")
                    .header(
                        "authorization",
                        format!("Bearer {}", tokens["accessToken"].as_str().unwrap()),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["userId"], "42");
        assert_eq!(body["authorities"][0], "ROLE_USER");
    }

    #[tokio::test]
    async fn me_accepts_gateway_headers_and_rejects_anonymous() {
        let (state, _store) = test_state();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/users/me")
                    .header("x-auth-userid", "12")
                    .header("x-auth-roles", "ROLE_ADMIN")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["roles"][0], "ADMIN");

        let anonymous = app
            .oneshot(Request::builder().uri("/api/users/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn internal_verify_requires_service_token() {
        let (state, _store) = test_state();
        let service_token = state.issuer().issue_service_token().unwrap();
        let app = router(state);
        let tokens = login(&app).await;

        let anonymous = app
            .clone()
            .oneshot(post_json(
                "/api/auth/internal/verify",
                serde_json::json!({"token": tokens["accessToken"]}),
            ))
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let mut request = post_json(
            "/api/auth/internal/verify",
            serde_json::json!({"token": tokens["accessToken"]}),
        );
        request.headers_mut().insert(
            "authorization",
            format!("Bearer {service_token}").parse().unwrap(),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["valid"], true);
        assert_eq!(body["subject"], "alice");
        assert_eq!(body["authorities"][0], "ROLE_USER");
    }

    #[tokio::test]
    async fn health_probes_report_store() {
        let (state, _store) = test_state();
        let app = router(state);

        let live = app
            .clone()
            .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(live.status(), StatusCode::OK);

        let ready = app
            .oneshot(Request::builder().uri("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ready.status(), StatusCode::OK);
        assert_eq!(json_body(ready).await["checks"]["refresh_store"], "ok");
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let (state, _store) = test_state();
        let response = router(state)
            .oneshot(Request::builder().uri("/api/auth/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }
}
