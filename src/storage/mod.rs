// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Refresh Token Store
//!
//! Keyed persistent state: username → the single current refresh token.
//!
//! ## Semantics
//!
//! - `save` upserts; a new record replaces any prior one for the username
//! - every record carries its own expiry (`now + ttl` at save time)
//! - `find` only returns live tokens; an expired record is removed on read
//! - `find_record` returns the raw record, expired or not
//! - `delete` is idempotent
//!
//! Every lookup reads through to the backing store. Records are never cached
//! in process, so all auth service instances pointed at the same store agree
//! on which refresh token is current.
//!
//! ## Backends
//!
//! | Backend | Shared across instances | Expiry |
//! |---------|-------------------------|--------|
//! | [`RedisRefreshStore`] | yes | key TTL |
//! | [`RedbRefreshStore`] | no, single file lock | on read, plus a purge at startup |
//! | [`MemoryRefreshStore`] | no | on read |

pub mod memory;
pub mod redb_store;
pub mod redis_store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::MemoryRefreshStore;
pub use redb_store::RedbRefreshStore;
pub use redis_store::RedisRefreshStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("refresh store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A persisted refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub username: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn new(username: &str, token: &str, ttl: chrono::Duration) -> Self {
        Self {
            username: username.to_string(),
            token: token.to_string(),
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Backing store for the current refresh token of each username.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Upsert the current token for `username`, expiring after `ttl`.
    async fn save(&self, username: &str, token: &str, ttl: chrono::Duration) -> StoreResult<()>;

    /// The live token for `username`, if any.
    async fn find(&self, username: &str) -> StoreResult<Option<String>>;

    /// The stored record for `username`, including expired ones.
    async fn find_record(&self, username: &str) -> StoreResult<Option<RefreshTokenRecord>>;

    /// Remove the record for `username`. Missing records are not an error.
    async fn delete(&self, username: &str) -> StoreResult<()>;

    /// Remove every expired record, returning how many were dropped.
    async fn purge_expired(&self) -> StoreResult<usize>;

    /// Cheap reachability check for readiness probes.
    async fn ping(&self) -> StoreResult<()>;
}
