// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::net::TcpListener;

use edge_auth::{
    auth::TokenCodec,
    config::Settings,
    gateway::{router, GatewayState},
    logging::init_tracing,
    shutdown_signal,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let settings = Settings::from_env()?;
    init_tracing(settings.log_format)?;

    let codec = Arc::new(TokenCodec::new(
        &settings.tokens.secret,
        settings.tokens.leeway_secs,
    )?);
    let gateway = &settings.gateway;
    let app = router(GatewayState::new(gateway, codec)?);

    for route in &gateway.routes {
        tracing::info!(prefix = %route.prefix, upstream = %route.upstream, "Route registered");
    }

    let listener = TcpListener::bind(gateway.bind_addr).await?;
    tracing::info!(
        addr = %gateway.bind_addr,
        strict_segments = !gateway.legacy_token_truncation,
        "Edge gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Edge gateway stopped");
    Ok(())
}
