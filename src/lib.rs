// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Edge Auth - distributed authentication core
//!
//! Issues, validates, refreshes and propagates identity tokens for a set of
//! services sitting behind one edge gateway.
//!
//! ## Modules
//!
//! - `api` - HTTP surface of the auth service (Axum)
//! - `auth` - token codec, issuer, orchestrator and service identity filter
//! - `gateway` - edge verification filter and prefix-routed proxy
//! - `providers` - member directory client used for login and enrichment
//! - `storage` - refresh token stores (Redis, redb, in-memory)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod models;
pub mod providers;
pub mod state;
pub mod storage;

/// Resolves once Ctrl-C is received.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
