// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Service Identity Filter
//!
//! Runs once per inbound request inside each internal service and rebuilds
//! the caller's [`IdentityContext`] from, in order of precedence:
//!
//! 1. a decodable `Authorization: Bearer <token>`
//! 2. the trusted `X-Auth-UserId` / `X-Auth-Roles` headers injected by the gateway
//! 3. nothing: the request stays unauthenticated
//!
//! The filter never rejects a request. Handlers decide through the
//! extractors in [`super::extractor`].
//!
//! ## Claim Fallback Chains
//!
//! Identity fields are read through ordered lists of named extractors; the
//! first extractor that yields a value wins.
//!
//! | Field | Chain |
//! |-------|-------|
//! | user id | `userId`, `user_id`, `sub` |
//! | roles | `authorities`, `roles`, `role`, default `USER` |

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use super::claims::{self, Claims, IdentityContext};
use super::codec::{TokenCodec, TokenError};
use super::roles::Role;

/// Gateway-injected user identifier.
pub const USER_ID_HEADER: &str = "x-auth-userid";
/// Gateway-injected subject (username).
pub const USERNAME_HEADER: &str = "x-auth-username";
/// Gateway-injected comma-joined authorities.
pub const ROLES_HEADER: &str = "x-auth-roles";

pub(crate) const BEARER_PREFIX: &str = "Bearer ";

type ExtractFn<T> = Box<dyn Fn(&Claims) -> Option<T> + Send + Sync>;

/// One named step of an extractor chain.
pub struct NamedExtractor<T> {
    name: &'static str,
    extract: ExtractFn<T>,
}

impl<T> NamedExtractor<T> {
    pub fn new<F>(name: &'static str, extract: F) -> Self
    where
        F: Fn(&Claims) -> Option<T> + Send + Sync + 'static,
    {
        Self {
            name,
            extract: Box::new(extract),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Ordered extractors, evaluated first-match-wins.
pub struct ExtractorChain<T> {
    steps: Vec<NamedExtractor<T>>,
}

impl<T> Default for ExtractorChain<T> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<T> ExtractorChain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step to the end of the chain.
    pub fn then(mut self, step: NamedExtractor<T>) -> Self {
        self.steps.push(step);
        self
    }

    /// First value produced, with the name of the step that produced it.
    pub fn resolve(&self, claims: &Claims) -> Option<(&'static str, T)> {
        self.steps
            .iter()
            .find_map(|step| (step.extract)(claims).map(|value| (step.name, value)))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(NamedExtractor::name).collect()
    }
}

/// Claim rendered as text.
pub fn text_claim(name: &'static str) -> NamedExtractor<String> {
    NamedExtractor::new(name, move |claims: &Claims| claims.get_text(name))
}

/// Roles from a comma-joined string or a JSON array of strings.
pub fn roles_claim(name: &'static str) -> NamedExtractor<Vec<Role>> {
    NamedExtractor::new(name, move |claims: &Claims| {
        let roles = match claims.get(name)? {
            Value::String(raw) => Role::parse_list(raw),
            Value::Array(items) => {
                let mut roles: Vec<Role> = items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(Role::parse)
                    .collect();
                roles.sort();
                roles.dedup();
                roles
            }
            _ => Vec::new(),
        };
        (!roles.is_empty()).then_some(roles)
    })
}

pub fn default_user_id_chain() -> ExtractorChain<String> {
    ExtractorChain::new()
        .then(text_claim(claims::USER_ID))
        .then(text_claim("user_id"))
        .then(text_claim(claims::SUBJECT))
}

pub fn default_role_chain() -> ExtractorChain<Vec<Role>> {
    ExtractorChain::new()
        .then(roles_claim(claims::AUTHORITIES))
        .then(roles_claim("roles"))
        .then(roles_claim("role"))
        .then(NamedExtractor::new("default", |_: &Claims| Some(vec![Role::user()])))
}

/// How bearer tokens are decoded.
#[derive(Clone)]
pub enum DecodeMode {
    /// Signature and expiry are checked.
    Verified(Arc<TokenCodec>),
    /// Payload only. For services that sit strictly behind the gateway.
    Unverified,
}

/// Rebuilds identity contexts from request headers.
#[derive(Clone)]
pub struct IdentityResolver {
    mode: DecodeMode,
    user_id: Arc<ExtractorChain<String>>,
    roles: Arc<ExtractorChain<Vec<Role>>>,
}

impl IdentityResolver {
    pub fn new(mode: DecodeMode) -> Self {
        Self {
            mode,
            user_id: Arc::new(default_user_id_chain()),
            roles: Arc::new(default_role_chain()),
        }
    }

    pub fn verified(codec: Arc<TokenCodec>) -> Self {
        Self::new(DecodeMode::Verified(codec))
    }

    pub fn unverified() -> Self {
        Self::new(DecodeMode::Unverified)
    }

    pub fn with_user_id_chain(mut self, chain: ExtractorChain<String>) -> Self {
        self.user_id = Arc::new(chain);
        self
    }

    pub fn with_role_chain(mut self, chain: ExtractorChain<Vec<Role>>) -> Self {
        self.roles = Arc::new(chain);
        self
    }

    /// Resolve the identity of a request, or `None` when it is unauthenticated.
    pub fn resolve(&self, headers: &HeaderMap) -> Option<IdentityContext> {
        if let Some(token) = bearer_token(headers) {
            match self.decode(token) {
                Ok(claims) => return self.from_claims(&claims),
                Err(e) => {
                    tracing::debug!(error = %e, "Bearer token not decodable, checking trusted headers");
                }
            }
        }
        from_trusted_headers(headers)
    }

    /// Identity from decoded claims. `None` when no user id can be found.
    pub fn from_claims(&self, claims: &Claims) -> Option<IdentityContext> {
        let (id_source, user_id) = self.user_id.resolve(claims)?;
        let (role_source, roles) = self.roles.resolve(claims).unwrap_or(("default", Vec::new()));
        tracing::trace!(id_source, role_source, "Identity rebuilt from token claims");
        Some(IdentityContext::new(user_id, roles))
    }

    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        match &self.mode {
            DecodeMode::Verified(codec) => codec.decode(token),
            DecodeMode::Unverified => TokenCodec::decode_unverified(token),
        }
    }
}

/// Token following `Bearer `, if the header has that form.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX)?.trim();
    (!token.is_empty()).then_some(token)
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn from_trusted_headers(headers: &HeaderMap) -> Option<IdentityContext> {
    let user_id = header_text(headers, USER_ID_HEADER)?;
    let roles = header_text(headers, ROLES_HEADER)?;
    Some(IdentityContext::new(user_id, Role::parse_list(roles)))
}

/// Attach the resolved [`IdentityContext`] to the request extensions.
///
/// Never writes a response itself.
pub async fn identity_middleware(
    State(resolver): State<IdentityResolver>,
    mut request: Request,
    next: Next,
) -> Response {
    // A context must only ever come from this filter
    request.extensions_mut().remove::<IdentityContext>();
    if let Some(context) = resolver.resolve(request.headers()) {
        request.extensions_mut().insert(context);
    }
    next.run(request).await
}
