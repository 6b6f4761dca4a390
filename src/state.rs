// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::identity::IdentityResolver;
use crate::auth::issuer::TokenIssuer;
use crate::auth::service::AuthService;
use crate::storage::RefreshTokenStore;

/// Shared state of the auth service router.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub identity: IdentityResolver,
}

impl AppState {
    pub fn new(auth: AuthService, identity: IdentityResolver) -> Self {
        Self { auth, identity }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        self.auth.issuer()
    }

    pub fn store(&self) -> &Arc<dyn RefreshTokenStore> {
        self.auth.store()
    }
}
