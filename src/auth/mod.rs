// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Token issuance, verification and identity propagation shared by the auth
//! service, the edge gateway and internal services.
//!
//! ## Auth Flow
//!
//! 1. Client logs in at the auth service and receives an access/refresh pair
//! 2. Client sends `Authorization: Bearer <access token>` to the gateway
//! 3. Gateway:
//!    - verifies structure, signature and expiry
//!    - injects `X-Auth-UserId` / `X-Auth-Username` / `X-Auth-Roles`
//! 4. Internal service:
//!    - rebuilds an [`IdentityContext`] from the bearer token or those headers
//!    - handlers authorize through the extractors
//!
//! ## Security
//!
//! - HS256 with a single shared secret (at least 32 bytes)
//! - One current refresh token per username, rotated on every refresh
//! - Gateway strips client-supplied `X-Auth-*` headers

pub mod claims;
pub mod codec;
pub mod credentials;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod issuer;
pub mod roles;
pub mod service;

pub use claims::{Claims, Identity, IdentityContext, Profile};
pub use codec::{TokenCodec, TokenError};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, OptionalAuth, ServiceCaller};
pub use identity::{identity_middleware, IdentityResolver};
pub use issuer::TokenIssuer;
pub use roles::Role;
pub use service::{AuthService, TokenPair};
