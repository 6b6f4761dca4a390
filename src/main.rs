// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::net::TcpListener;

use edge_auth::{
    api::router,
    auth::{credentials::DirectoryCredentialVerifier, AuthService, IdentityResolver, TokenIssuer},
    config::{Settings, StoreKind},
    logging::init_tracing,
    providers::{HttpUserLookup, UserLookup},
    shutdown_signal,
    state::AppState,
    storage::{MemoryRefreshStore, RedbRefreshStore, RedisRefreshStore, RefreshTokenStore},
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let settings = Settings::from_env()?;
    init_tracing(settings.log_format)?;

    let issuer = TokenIssuer::new(&settings.tokens)?;

    let store: Arc<dyn RefreshTokenStore> = match settings.store_kind {
        StoreKind::Redis => {
            let store = RedisRefreshStore::connect(settings.redis_url.as_str()).await?;
            tracing::info!(url = %redacted(&settings.redis_url), "Connected to refresh token store");
            Arc::new(store)
        }
        StoreKind::Redb => {
            let path = settings.refresh_db_path();
            let store = RedbRefreshStore::open(&path)?;
            let purged = store.purge_expired().await?;
            tracing::warn!(
                path = %path.display(),
                purged,
                "Using single-instance redb refresh token store"
            );
            Arc::new(store)
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory refresh token store; tokens are lost on restart");
            Arc::new(MemoryRefreshStore::new())
        }
    };

    let lookup: Arc<dyn UserLookup> = Arc::new(HttpUserLookup::new(
        settings.member_service_url.clone(),
        issuer.clone(),
        settings.lookup_timeout,
    )?);
    let verifier = Arc::new(DirectoryCredentialVerifier::new(lookup.clone()));

    let auth = AuthService::new(issuer.clone(), verifier, lookup, store)
        .with_timeouts(settings.store_timeout, settings.lookup_timeout);

    let identity = if settings.verify_service_signatures {
        IdentityResolver::verified(issuer.codec().clone())
    } else {
        tracing::warn!("Service identity filter is not verifying token signatures");
        IdentityResolver::unverified()
    };

    let app = router(AppState::new(auth, identity));

    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!(
        addr = %settings.bind_addr,
        member_service = %settings.member_service_url,
        "Auth service listening (docs at /docs)"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Auth service stopped");
    Ok(())
}

/// Connection URL with any password masked, for logging.
fn redacted(url: &url::Url) -> url::Url {
    let mut shown = url.clone();
    if shown.password().is_some() {
        // Only fails for cannot-be-a-base URLs, which have no password.
        let _ = shown.set_password(Some("****"));
    }
    shown
}
