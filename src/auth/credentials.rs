// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential verification.

use std::sync::Arc;

use async_trait::async_trait;
use pwhash::bcrypt;

use super::claims::Identity;
use super::roles::Role;
use crate::providers::{LookupError, UserLookup};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("credential backend unavailable: {0}")]
    Unavailable(String),
}

/// Checks a username/password pair and yields the authenticated identity.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str)
        -> Result<Identity, CredentialError>;
}

/// Verifies passwords against the bcrypt hash held in the member directory.
///
/// The member's role becomes the identity's single authority.
pub struct DirectoryCredentialVerifier {
    lookup: Arc<dyn UserLookup>,
}

impl DirectoryCredentialVerifier {
    pub fn new(lookup: Arc<dyn UserLookup>) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl CredentialVerifier for DirectoryCredentialVerifier {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Identity, CredentialError> {
        let record = match self.lookup.get_by_username(username).await {
            Ok(record) => record,
            Err(LookupError::NotFound) => return Err(CredentialError::InvalidCredentials),
            Err(LookupError::Transport(msg)) => return Err(CredentialError::Unavailable(msg)),
        };

        let Some(hash) = record.password.clone() else {
            tracing::warn!(username = %username, "Member record has no password hash");
            return Err(CredentialError::InvalidCredentials);
        };

        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| CredentialError::Unavailable(e.to_string()))?;

        if !matches {
            return Err(CredentialError::InvalidCredentials);
        }

        let role = record
            .role
            .as_deref()
            .and_then(Role::parse)
            .unwrap_or_default();

        Ok(Identity::new(record.username, vec![role]))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::providers::UserRecord;
    use pwhash::bcrypt::{BcryptSetup, BcryptVariant};
    use std::collections::HashMap;

    /// Cheap bcrypt hash for tests.
    pub(crate) fn hash(password: &str) -> String {
        bcrypt::hash_with(
            BcryptSetup {
                cost: Some(4),
                variant: Some(BcryptVariant::V2b),
                ..Default::default()
            },
            password,
        )
        .unwrap()
    }

    /// Lookup backed by a fixed set of records.
    pub(crate) struct StaticLookup {
        pub records: HashMap<String, UserRecord>,
        pub fail: bool,
    }

    impl StaticLookup {
        pub(crate) fn with_user(username: &str, password: &str, role: Option<&str>) -> Self {
            let record = UserRecord {
                id: 42,
                username: username.to_string(),
                name: Some("Alice".to_string()),
                email: Some(format!("{username}@example.com")),
                role: role.map(str::to_string),
                password: Some(hash(password)),
            };
            Self {
                records: HashMap::from([(username.to_string(), record)]),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl UserLookup for StaticLookup {
        async fn get_by_username(&self, username: &str) -> Result<UserRecord, LookupError> {
            if self.fail {
                return Err(LookupError::Transport("connection refused".into()));
            }
            self.records
                .get(username)
                .cloned()
                .ok_or(LookupError::NotFound)
        }
    }

    fn verifier(lookup: StaticLookup) -> DirectoryCredentialVerifier {
        DirectoryCredentialVerifier::new(Arc::new(lookup))
    }

    #[tokio::test]
    async fn correct_password_yields_identity_with_role() {
        let verifier = verifier(StaticLookup::with_user("alice", "correct", Some("ADMIN")));
        let identity = verifier.authenticate("alice", "correct").await.unwrap();
        assert_eq!(identity.subject(), "alice");
        assert_eq!(identity.joined_authorities(), "ROLE_ADMIN");
    }

    #[tokio::test]
    async fn missing_role_defaults_to_user() {
        let verifier = verifier(StaticLookup::with_user("alice", "correct", None));
        let identity = verifier.authenticate("alice", "correct").await.unwrap();
        assert_eq!(identity.joined_authorities(), "ROLE_USER");
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_are_rejected() {
        let verifier = verifier(StaticLookup::with_user("alice", "correct", None));
        assert_eq!(
            verifier.authenticate("alice", "wrong").await,
            Err(CredentialError::InvalidCredentials)
        );
        assert_eq!(
            verifier.authenticate("mallory", "correct").await,
            Err(CredentialError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn directory_outage_is_unavailable() {
        let mut lookup = StaticLookup::with_user("alice", "correct", None);
        lookup.fail = true;
        let result = verifier(lookup).authenticate("alice", "correct").await;
        assert!(matches!(result, Err(CredentialError::Unavailable(_))));
    }
}
