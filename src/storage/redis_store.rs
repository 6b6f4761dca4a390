// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Redis-backed refresh token store, shared by every auth service instance.
//!
//! One key per username, `refresh_token:{username}`, holding the raw token.
//! Expiry is the key's own TTL, so nothing has to sweep old records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{RefreshTokenRecord, RefreshTokenStore, StoreResult};

const KEY_PREFIX: &str = "refresh_token:";

#[derive(Clone)]
pub struct RedisRefreshStore {
    conn: ConnectionManager,
}

impl RedisRefreshStore {
    /// Connect to `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

fn key(username: &str) -> String {
    format!("{KEY_PREFIX}{username}")
}

/// Milliseconds for `PSETEX`, or `None` when the record is already dead.
fn ttl_millis(ttl: chrono::Duration) -> Option<u64> {
    u64::try_from(ttl.num_milliseconds()).ok().filter(|ms| *ms > 0)
}

/// Absolute expiry from a `PTTL` reply. `-1` means the key never expires.
fn expiry_from_pttl(now: DateTime<Utc>, pttl: i64) -> DateTime<Utc> {
    if pttl < 0 {
        DateTime::<Utc>::MAX_UTC
    } else {
        now + chrono::Duration::milliseconds(pttl)
    }
}

#[async_trait]
impl RefreshTokenStore for RedisRefreshStore {
    async fn save(&self, username: &str, token: &str, ttl: chrono::Duration) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let key = key(username);
        match ttl_millis(ttl) {
            Some(ms) => conn.pset_ex::<_, _, ()>(&key, token, ms).await?,
            None => conn.del::<_, ()>(&key).await?,
        }
        Ok(())
    }

    async fn find(&self, username: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        let token: Option<String> = conn.get(key(username)).await?;
        Ok(token)
    }

    async fn find_record(&self, username: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        let mut conn = self.conn.clone();
        let key = key(username);
        let (token, pttl): (Option<String>, i64) = redis::pipe()
            .get(&key)
            .pttl(&key)
            .query_async(&mut conn)
            .await?;

        Ok(token.map(|token| RefreshTokenRecord {
            username: username.to_string(),
            token,
            expires_at: expiry_from_pttl(Utc::now(), pttl),
        }))
    }

    async fn delete(&self, username: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key(username)).await?;
        Ok(())
    }

    async fn purge_expired(&self) -> StoreResult<usize> {
        Ok(0)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
