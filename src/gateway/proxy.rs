// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Prefix routing and request forwarding to internal services.

use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName},
    response::Response,
};
use url::Url;

use super::GatewayState;
use crate::config::RouteConfig;
use crate::error::ApiError;

/// Largest request body the gateway buffers before forwarding.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection-scoped headers that must not be relayed.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    header::HOST,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Routes ordered so the longest prefix is tried first.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteConfig>,
}

impl RouteTable {
    pub fn new(mut routes: Vec<RouteConfig>) -> Self {
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { routes }
    }

    /// Upstream URL for a request path, or `None` when no prefix matches.
    pub fn resolve(&self, path: &str, query: Option<&str>) -> Option<Url> {
        let route = self
            .routes
            .iter()
            .find(|r| path.starts_with(r.prefix.as_str()))?;

        let mut url = route.upstream.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base}{path}"));
        url.set_query(query);
        Some(url)
    }
}

pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(UPSTREAM_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

fn relayable(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in &HOP_BY_HOP {
        out.remove(name);
    }
    out.remove(header::CONTENT_LENGTH);
    out
}

/// Fallback handler: forwards whatever the filter let through.
pub async fn forward(
    State(state): State<GatewayState>,
    request: Request,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path();

    let target = state
        .routes
        .resolve(path, parts.uri.query())
        .ok_or_else(|| ApiError::no_route(path))?;

    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::invalid_request(format!("Unreadable request body: {e}")))?;

    let upstream = state
        .client
        .request(parts.method.clone(), target.clone())
        .headers(relayable(&parts.headers))
        .body(body)
        .send()
        .await
        .map_err(|e| {
            tracing::warn!(%path, upstream = %target, error = %e, "Upstream unreachable");
            ApiError::bad_gateway("Upstream service unavailable")
        })?;

    let status = upstream.status();
    let headers = relayable(upstream.headers());
    let bytes = upstream.bytes().await.map_err(|e| {
        tracing::warn!(%path, upstream = %target, error = %e, "Upstream response truncated");
        ApiError::bad_gateway("Upstream response could not be read")
    })?;

    tracing::debug!(%path, upstream = %target, status = status.as_u16(), "Forwarded");

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::new(vec![
            RouteConfig {
                prefix: "/api/".into(),
                upstream: Url::parse("http://members:10001").unwrap(),
            },
            RouteConfig {
                prefix: "/api/auth/".into(),
                upstream: Url::parse("http://auth:8080/base/").unwrap(),
            },
        ])
    }

    #[test]
    fn longest_prefix_wins() {
        let url = table().resolve("/api/auth/login", None).unwrap();
        assert_eq!(url.as_str(), "http://auth:8080/base/api/auth/login");

        let url = table().resolve("/api/members/3", Some("full=true")).unwrap();
        assert_eq!(url.as_str(), "http://members:10001/api/members/3?full=true");
    }

    #[test]
    fn unknown_prefix_has_no_route() {
        assert!(table().resolve("/metrics", None).is_none());
    }

    #[test]
    fn hop_by_hop_headers_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "edge".parse().unwrap());
        headers.insert(header::CONNECTION, "keep-alive".parse().unwrap());
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());

        let out = relayable(&headers);
        assert_eq!(out.len(), 1);
        assert!(out.contains_key(header::CONTENT_TYPE));
    }
}
