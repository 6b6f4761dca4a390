// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Refresh token store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `refresh_tokens`: username → serialized [`RefreshTokenRecord`] (JSON bytes)
//!
//! redb calls are blocking, so each operation runs on the blocking pool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::{RefreshTokenRecord, RefreshTokenStore, StoreResult};

const REFRESH_TOKENS: TableDefinition<&str, &[u8]> = TableDefinition::new("refresh_tokens");

/// Embedded refresh token database.
#[derive(Clone)]
pub struct RedbRefreshStore {
    db: Arc<Database>,
}

impl RedbRefreshStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(REFRESH_TOKENS)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    async fn blocking<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db)).await?
    }
}

fn put(db: &Database, record: &RefreshTokenRecord) -> StoreResult<()> {
    let json = serde_json::to_vec(record)?;
    let write_txn = db.begin_write()?;
    {
        let mut table = write_txn.open_table(REFRESH_TOKENS)?;
        table.insert(record.username.as_str(), json.as_slice())?;
    }
    write_txn.commit()?;
    Ok(())
}

fn get(db: &Database, username: &str) -> StoreResult<Option<RefreshTokenRecord>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(REFRESH_TOKENS)?;
    let record = match table.get(username)? {
        Some(value) => Some(serde_json::from_slice(value.value())?),
        None => None,
    };
    Ok(record)
}

/// Read the live record, removing it in the same transaction if it has expired.
fn take_live(db: &Database, username: &str) -> StoreResult<Option<RefreshTokenRecord>> {
    let write_txn = db.begin_write()?;
    let live = {
        let mut table = write_txn.open_table(REFRESH_TOKENS)?;
        let record: Option<RefreshTokenRecord> = match table.get(username)? {
            Some(value) => Some(serde_json::from_slice(value.value())?),
            None => None,
        };
        match record {
            Some(record) if record.is_expired() => {
                table.remove(username)?;
                tracing::debug!(username = %username, "Dropped expired refresh token on read");
                None
            }
            other => other,
        }
    };
    write_txn.commit()?;
    Ok(live)
}

fn remove(db: &Database, username: &str) -> StoreResult<()> {
    let write_txn = db.begin_write()?;
    {
        let mut table = write_txn.open_table(REFRESH_TOKENS)?;
        table.remove(username)?;
    }
    write_txn.commit()?;
    Ok(())
}

fn purge(db: &Database) -> StoreResult<usize> {
    let write_txn = db.begin_write()?;
    let mut removed = 0usize;
    {
        let mut table = write_txn.open_table(REFRESH_TOKENS)?;
        table.retain(|_, value| {
            let expired = serde_json::from_slice::<RefreshTokenRecord>(value)
                .map(|record| record.is_expired())
                .unwrap_or(false);
            if expired {
                removed += 1;
            }
            !expired
        })?;
    }
    write_txn.commit()?;
    Ok(removed)
}

fn probe(db: &Database) -> StoreResult<()> {
    let read_txn = db.begin_read()?;
    let _ = read_txn.open_table(REFRESH_TOKENS)?;
    Ok(())
}

#[async_trait]
impl RefreshTokenStore for RedbRefreshStore {
    async fn save(&self, username: &str, token: &str, ttl: chrono::Duration) -> StoreResult<()> {
        let record = RefreshTokenRecord::new(username, token, ttl);
        self.blocking(move |db| put(db, &record)).await
    }

    async fn find(&self, username: &str) -> StoreResult<Option<String>> {
        let username = username.to_string();
        let record = self.blocking(move |db| take_live(db, &username)).await?;
        Ok(record.map(|r| r.token))
    }

    async fn find_record(&self, username: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        let username = username.to_string();
        self.blocking(move |db| get(db, &username)).await
    }

    async fn delete(&self, username: &str) -> StoreResult<()> {
        let username = username.to_string();
        self.blocking(move |db| remove(db, &username)).await
    }

    async fn purge_expired(&self) -> StoreResult<usize> {
        self.blocking(purge).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.blocking(probe).await
    }
}
