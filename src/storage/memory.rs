// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory refresh token store.
//!
//! Single-process only. Used for tests and for running one auth service
//! instance without a data directory (`REFRESH_STORE=memory`).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{RefreshTokenRecord, RefreshTokenStore, StoreResult};

#[derive(Clone, Default)]
pub struct MemoryRefreshStore {
    records: Arc<RwLock<HashMap<String, RefreshTokenRecord>>>,
}

impl MemoryRefreshStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, expired ones included.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshStore {
    async fn save(&self, username: &str, token: &str, ttl: chrono::Duration) -> StoreResult<()> {
        let record = RefreshTokenRecord::new(username, token, ttl);
        self.records
            .write()
            .await
            .insert(username.to_string(), record);
        Ok(())
    }

    async fn find(&self, username: &str) -> StoreResult<Option<String>> {
        let mut records = self.records.write().await;
        match records.get(username) {
            Some(record) if record.is_expired() => {
                records.remove(username);
                Ok(None)
            }
            Some(record) => Ok(Some(record.token.clone())),
            None => Ok(None),
        }
    }

    async fn find_record(&self, username: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        Ok(self.records.read().await.get(username).cloned())
    }

    async fn delete(&self, username: &str) -> StoreResult<()> {
        self.records.write().await.remove(username);
        Ok(())
    }

    async fn purge_expired(&self) -> StoreResult<usize> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired());
        Ok(before - records.len())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
