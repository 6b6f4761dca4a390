// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{Auth, IdentityContext, Role};

/// Response for GET /api/users/me
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserMeResponse {
    /// User identifier as resolved from the token or gateway headers
    pub user_id: String,
    /// Roles without the `ROLE_` prefix
    pub roles: Vec<Role>,
    /// Canonical authorities (`ROLE_<NAME>`)
    pub authorities: Vec<String>,
}

impl From<IdentityContext> for UserMeResponse {
    fn from(context: IdentityContext) -> Self {
        let authorities = context.authorities();
        Self {
            user_id: context.user_id,
            roles: context.roles,
            authorities,
        }
    }
}

/// Get the caller's identity.
///
/// Returns the identity the service identity filter rebuilt for this request.
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn get_current_user(Auth(context): Auth) -> Json<UserMeResponse> {
    Json(context.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_me_response_from_identity_context() {
        let context = IdentityContext::new("42", vec![Role::admin(), Role::user()]);
        let response = UserMeResponse::from(context);

        assert_eq!(response.user_id, "42");
        assert_eq!(response.authorities, vec!["ROLE_ADMIN", "ROLE_USER"]);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["userId"], "42");
        assert_eq!(json["roles"][0], "ADMIN");
    }
}
