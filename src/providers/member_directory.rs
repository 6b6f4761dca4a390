// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Member directory client.
//!
//! The member service exposes member records to other services at
//! `GET /api/members/internal/username/{username}`. Calls are authenticated
//! with a freshly issued service token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::auth::claims::Profile;
use crate::auth::issuer::TokenIssuer;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("member not found")]
    NotFound,

    #[error("member service request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        LookupError::Transport(err.to_string())
    }
}

/// A member record as returned by the member service.
///
/// `password` holds the bcrypt hash and is only read by the credential
/// verifier.
#[derive(Clone, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl UserRecord {
    /// Profile claims for access token enrichment.
    pub fn profile(&self) -> Profile {
        Profile {
            user_id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Fetch a user record by username.
#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn get_by_username(&self, username: &str) -> Result<UserRecord, LookupError>;
}

/// [`UserLookup`] over the member service's internal HTTP API.
#[derive(Clone)]
pub struct HttpUserLookup {
    base_url: Url,
    issuer: TokenIssuer,
    client: reqwest::Client,
}

impl HttpUserLookup {
    pub fn new(base_url: Url, issuer: TokenIssuer, timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            issuer,
            client,
        })
    }

    fn member_url(&self, username: &str) -> Result<Url, LookupError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LookupError::Transport(format!("invalid member service URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "members", "internal", "username", username]);
        Ok(url)
    }
}

#[async_trait]
impl UserLookup for HttpUserLookup {
    async fn get_by_username(&self, username: &str) -> Result<UserRecord, LookupError> {
        let url = self.member_url(username)?;
        let service_token = self
            .issuer
            .issue_service_token()
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        tracing::debug!(username = %username, "Fetching member record");

        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {service_token}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(LookupError::NotFound),
            status if status.is_success() => Ok(response.json::<UserRecord>().await?),
            status => Err(LookupError::Transport(format!(
                "member service returned {status}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenSettings;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&TokenSettings::with_secret("0123456789abcdef0123456789abcdef")).unwrap()
    }

    fn lookup(base: &str) -> HttpUserLookup {
        HttpUserLookup::new(Url::parse(base).unwrap(), issuer(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn fetches_member_with_service_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/members/internal/username/alice"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 7,
                "username": "alice",
                "name": "Alice",
                "email": "alice@example.com",
                "age": 30,
                "role": "ADMIN",
                "password": "$2b$04$hash"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let record = lookup(&mock_server.uri()).get_by_username("alice").await.unwrap();
        assert_eq!(record.id, 7);
        assert_eq!(record.role.as_deref(), Some("ADMIN"));
        assert_eq!(record.profile().email.as_deref(), Some("alice@example.com"));
        assert!(!format!("{record:?}").contains("$2b$"));
    }

    #[tokio::test]
    async fn sent_token_is_a_service_token() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 1,
                "username": "bob"
            })))
            .mount(&mock_server)
            .await;

        lookup(&mock_server.uri()).get_by_username("bob").await.unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        let header = requests[0].headers.get("authorization").unwrap().to_str().unwrap();
        let token = header.strip_prefix("Bearer ").unwrap();
        assert!(issuer().is_service_token(token));
    }

    #[tokio::test]
    async fn missing_member_is_not_found() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/members/internal/username/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let result = lookup(&mock_server.uri()).get_by_username("ghost").await;
        assert_eq!(result.unwrap_err(), LookupError::NotFound);
    }

    #[tokio::test]
    async fn server_error_is_transport_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&mock_server)
            .await;

        let result = lookup(&mock_server.uri()).get_by_username("alice").await;
        assert!(matches!(result, Err(LookupError::Transport(_))));
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_failure() {
        let result = lookup("http://127.0.0.1:1").get_by_username("alice").await;
        assert!(matches!(result, Err(LookupError::Transport(_))));
    }

    #[test]
    fn username_is_path_encoded() {
        let url = lookup("http://members:10001/").member_url("a b/c").unwrap();
        assert_eq!(
            url.as_str(),
            "http://members:10001/api/members/internal/username/a%20b%2Fc"
        );
    }
}
