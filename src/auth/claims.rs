// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and the identities built from them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::roles::Role;

pub const SUBJECT: &str = "sub";
pub const ISSUED_AT: &str = "iat";
pub const EXPIRES_AT: &str = "exp";
pub const TOKEN_ID: &str = "jti";
pub const AUTHORITIES: &str = "authorities";
pub const USER_ID: &str = "userId";
pub const NAME: &str = "name";
pub const EMAIL: &str = "email";
pub const TOKEN_TYPE: &str = "tokenType";
pub const REFRESH_TOKEN_TYPE: &str = "refresh";
pub const TYPE: &str = "type";
pub const SERVICE_TYPE: &str = "service";

/// Decoded token payload.
///
/// The payload is a flat JSON object; registered claims are read through the
/// typed accessors, anything else through [`Claims::get`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a claim, returning `self` for chaining.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Claim rendered as a non-empty string.
    ///
    /// Strings are returned as-is and numbers/booleans in their JSON text form;
    /// `null`, arrays and objects yield `None`.
    pub fn get_text(&self, name: &str) -> Option<String> {
        let text = match self.0.get(name)? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn subject(&self) -> Option<String> {
        self.get_text(SUBJECT)
    }

    /// Expiry as seconds since the Unix epoch.
    pub fn expires_at(&self) -> Option<i64> {
        self.0.get(EXPIRES_AT).and_then(Value::as_i64)
    }

    /// Issued-at as seconds since the Unix epoch.
    pub fn issued_at(&self) -> Option<i64> {
        self.0.get(ISSUED_AT).and_then(Value::as_i64)
    }

    pub fn is_refresh_token(&self) -> bool {
        self.get_text(TOKEN_TYPE).as_deref() == Some(REFRESH_TOKEN_TYPE)
    }

    pub fn is_service_token(&self) -> bool {
        self.get_text(TYPE).as_deref() == Some(SERVICE_TYPE)
    }

    /// Roles listed in the `authorities` claim.
    pub fn roles(&self) -> Vec<Role> {
        self.get_text(AUTHORITIES)
            .map(|raw| Role::parse_list(&raw))
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(map: Map<String, Value>) -> Self {
        Claims(map)
    }
}

/// An authenticated principal, as produced by a credential verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    subject: String,
    authorities: BTreeSet<Role>,
}

impl Identity {
    /// Identity with the given roles. An empty role set falls back to `USER`.
    pub fn new(subject: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        let mut authorities: BTreeSet<Role> = roles.into_iter().collect();
        if authorities.is_empty() {
            authorities.insert(Role::user());
        }
        Self {
            subject: subject.into(),
            authorities,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.authorities.iter()
    }

    /// Authorities in claim format (`ROLE_A,ROLE_B`).
    pub fn joined_authorities(&self) -> String {
        super::roles::join_authorities(&self.authorities)
    }
}

/// Profile data pulled from the member directory to enrich access tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub user_id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Request-scoped identity reconstructed inside a service.
///
/// Built by the service identity filter from either a bearer token or the
/// trusted headers the gateway injects; consumed by the extractors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct IdentityContext {
    /// User identifier as presented (numeric id or username).
    pub user_id: String,
    /// Roles without the `ROLE_` prefix.
    pub roles: Vec<Role>,
}

impl IdentityContext {
    pub fn new(user_id: impl Into<String>, roles: Vec<Role>) -> Self {
        let mut roles = roles;
        if roles.is_empty() {
            roles.push(Role::user());
        }
        roles.sort();
        roles.dedup();
        Self {
            user_id: user_id.into(),
            roles,
        }
    }

    /// User identifier parsed as a number, when it is one.
    pub fn numeric_user_id(&self) -> Option<i64> {
        self.user_id.parse().ok()
    }

    /// Canonical `ROLE_` authorities.
    pub fn authorities(&self) -> Vec<String> {
        self.roles.iter().map(Role::authority).collect()
    }

    pub fn has_role(&self, required: &Role) -> bool {
        self.roles.iter().any(|r| r.has_privilege(required))
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(Role::is_admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_text_renders_scalars() {
        let claims = Claims::new()
            .with(USER_ID, 42)
            .with(NAME, "Alice")
            .with("flag", true)
            .with("empty", "")
            .with("nested", json!({"a": 1}));

        assert_eq!(claims.get_text(USER_ID).as_deref(), Some("42"));
        assert_eq!(claims.get_text(NAME).as_deref(), Some("Alice"));
        assert_eq!(claims.get_text("flag").as_deref(), Some("true"));
        assert_eq!(claims.get_text("empty"), None);
        assert_eq!(claims.get_text("nested"), None);
        assert_eq!(claims.get_text("missing"), None);
    }

    #[test]
    fn token_markers() {
        let refresh = Claims::new().with(TOKEN_TYPE, REFRESH_TOKEN_TYPE);
        let service = Claims::new().with(TYPE, SERVICE_TYPE);
        assert!(refresh.is_refresh_token());
        assert!(!refresh.is_service_token());
        assert!(service.is_service_token());
        assert!(!service.is_refresh_token());
    }

    #[test]
    fn roles_come_from_authorities_claim() {
        let claims = Claims::new().with(AUTHORITIES, "ROLE_USER,ROLE_ADMIN");
        assert_eq!(claims.roles(), vec![Role::admin(), Role::user()]);
        assert!(Claims::new().roles().is_empty());
    }

    #[test]
    fn identity_defaults_to_user_role() {
        let identity = Identity::new("alice", Vec::new());
        assert_eq!(identity.joined_authorities(), "ROLE_USER");
    }

    #[test]
    fn identity_context_helpers() {
        let ctx = IdentityContext::new("17", vec![Role::admin()]);
        assert_eq!(ctx.numeric_user_id(), Some(17));
        assert_eq!(ctx.authorities(), vec!["ROLE_ADMIN".to_string()]);
        assert!(ctx.has_role(&Role::user()));
        assert!(ctx.is_admin());

        let by_name = IdentityContext::new("alice", Vec::new());
        assert_eq!(by_name.numeric_user_id(), None);
        assert_eq!(by_name.roles, vec![Role::user()]);
        assert!(!by_name.is_admin());
    }
}
