// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Edge gateway: token verification in front of a prefix-routed proxy.

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use crate::api::with_http_layers;
use crate::auth::TokenCodec;
use crate::config::GatewaySettings;

pub mod filter;
pub mod proxy;

pub use filter::{GatewayDecision, GatewayFilter, GatewayPolicy, SegmentPolicy};
pub use proxy::RouteTable;

#[derive(Clone)]
pub struct GatewayState {
    pub filter: Arc<GatewayFilter>,
    pub routes: Arc<RouteTable>,
    pub client: reqwest::Client,
}

impl GatewayState {
    pub fn new(settings: &GatewaySettings, codec: Arc<TokenCodec>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            filter: Arc::new(GatewayFilter::new(GatewayPolicy::from_settings(settings), codec)),
            routes: Arc::new(RouteTable::new(settings.routes.clone())),
            client: proxy::build_client()?,
        })
    }
}

pub fn router(state: GatewayState) -> Router {
    let app = Router::new()
        .route("/actuator/health", get(filter::actuator_health))
        .fallback(proxy::forward)
        .layer(middleware::from_fn_with_state(
            state.filter.clone(),
            filter::gateway_middleware,
        ))
        .with_state(state);

    with_http_layers(app)
}
