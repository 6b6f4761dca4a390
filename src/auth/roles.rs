// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles for authorization.
//!
//! Tokens carry authorities in their canonical `ROLE_<NAME>` form. Roles are
//! held without the prefix and the prefix is added back when an authority
//! string is needed.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Prefix carried by every granted authority.
pub const ROLE_PREFIX: &str = "ROLE_";

/// Role granted when a token or header names none.
pub const DEFAULT_ROLE: &str = "USER";

/// A single role name, upper-cased and without the `ROLE_` prefix.
///
/// ## Role Hierarchy
///
/// - `ADMIN` - implies every other role
/// - anything else - grants exactly itself
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Parse a role or authority string, stripping a leading `ROLE_`.
    ///
    /// Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Role> {
        let trimmed = raw.trim();
        let name = trimmed.strip_prefix(ROLE_PREFIX).unwrap_or(trimmed).trim();
        if name.is_empty() {
            return None;
        }
        Some(Role(name.to_ascii_uppercase()))
    }

    /// Parse a comma-joined authority list (`"ROLE_USER,ROLE_ADMIN"`).
    pub fn parse_list(raw: &str) -> Vec<Role> {
        let mut roles: Vec<Role> = raw.split(',').filter_map(Role::parse).collect();
        roles.sort();
        roles.dedup();
        roles
    }

    pub fn user() -> Role {
        Role(DEFAULT_ROLE.to_string())
    }

    pub fn admin() -> Role {
        Role("ADMIN".to_string())
    }

    /// Role name without prefix.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Canonical authority string (`ROLE_<NAME>`).
    pub fn authority(&self) -> String {
        format!("{ROLE_PREFIX}{}", self.0)
    }

    pub fn is_admin(&self) -> bool {
        self.0 == "ADMIN"
    }

    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(&self, required: &Role) -> bool {
        self.is_admin() || self == required
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::user()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Join roles into the comma-separated authority claim format.
pub fn join_authorities<'a>(roles: impl IntoIterator<Item = &'a Role>) -> String {
    roles
        .into_iter()
        .map(Role::authority)
        .collect::<Vec<_>>()
        .join(",")
}
