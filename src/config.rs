// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values, and the
//! [`Settings`] value built from them at startup. Nothing reads the
//! environment after `Settings` has been constructed; every component gets
//! the values it needs passed in explicitly.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `JWT_SECRET` | Shared HMAC secret (>= 32 bytes) | Required |
//! | `JWT_ACCESS_TOKEN_VALIDITY_MS` | Access token lifetime | `1800000` |
//! | `JWT_REFRESH_TOKEN_VALIDITY_MS` | Refresh token lifetime / stored TTL | `604800000` |
//! | `JWT_SERVICE_TOKEN_VALIDITY_MS` | Service token lifetime | `60000` |
//! | `JWT_LEEWAY_SECS` | Clock skew tolerance for expiry checks | `0` |
//! | `HOST` | Auth service bind address | `0.0.0.0` |
//! | `PORT` | Auth service bind port | `8080` |
//! | `REFRESH_STORE` | `redis`, `redb` or `memory` | `redis` |
//! | `REDIS_URL` | Shared refresh token store | `redis://localhost:6379` |
//! | `DATA_DIR` | Directory holding the redb database | `./data` |
//! | `STORE_TIMEOUT_MS` | Bound on refresh store calls | `3000` |
//! | `MEMBER_SERVICE_URL` | Member service base URL | `http://localhost:10001` |
//! | `LOOKUP_TIMEOUT_MS` | Bound on member lookups | `3000` |
//! | `GATEWAY_HOST` | Gateway bind address | `0.0.0.0` |
//! | `GATEWAY_PORT` | Gateway bind port | `8000` |
//! | `GATEWAY_PUBLIC_PATHS` | Comma-separated public path prefixes | `/api/auth/,/api/public/,/actuator/` |
//! | `GATEWAY_ROUTES` | Comma-separated `prefix=upstream` pairs | `/api/auth/=http://localhost:8080` |
//! | `GATEWAY_FORWARD_AUTHORIZATION` | Keep `Authorization` downstream | `true` |
//! | `GATEWAY_LEGACY_TOKEN_TRUNCATION` | Truncate >3-segment tokens instead of rejecting | `false` |
//! | `SERVICE_IDENTITY_VERIFY_SIGNATURE` | Service filter verifies token signatures | `true` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const ACCESS_VALIDITY_ENV: &str = "JWT_ACCESS_TOKEN_VALIDITY_MS";
pub const REFRESH_VALIDITY_ENV: &str = "JWT_REFRESH_TOKEN_VALIDITY_MS";
pub const SERVICE_VALIDITY_ENV: &str = "JWT_SERVICE_TOKEN_VALIDITY_MS";
pub const LEEWAY_ENV: &str = "JWT_LEEWAY_SECS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the redb database directory.
///
/// The file `refresh_tokens.redb` is created inside this directory. redb
/// holds an exclusive lock on it, so only one auth service instance can use
/// a given directory.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const REFRESH_STORE_ENV: &str = "REFRESH_STORE";
pub const REDIS_URL_ENV: &str = "REDIS_URL";
pub const STORE_TIMEOUT_ENV: &str = "STORE_TIMEOUT_MS";
pub const MEMBER_SERVICE_URL_ENV: &str = "MEMBER_SERVICE_URL";
pub const LOOKUP_TIMEOUT_ENV: &str = "LOOKUP_TIMEOUT_MS";
pub const GATEWAY_HOST_ENV: &str = "GATEWAY_HOST";
pub const GATEWAY_PORT_ENV: &str = "GATEWAY_PORT";
pub const GATEWAY_PUBLIC_PATHS_ENV: &str = "GATEWAY_PUBLIC_PATHS";
pub const GATEWAY_ROUTES_ENV: &str = "GATEWAY_ROUTES";
pub const GATEWAY_FORWARD_AUTHORIZATION_ENV: &str = "GATEWAY_FORWARD_AUTHORIZATION";
pub const GATEWAY_LEGACY_TRUNCATION_ENV: &str = "GATEWAY_LEGACY_TOKEN_TRUNCATION";
pub const SERVICE_IDENTITY_VERIFY_ENV: &str = "SERVICE_IDENTITY_VERIFY_SIGNATURE";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_ACCESS_VALIDITY_MS: i64 = 1_800_000;
pub const DEFAULT_REFRESH_VALIDITY_MS: i64 = 604_800_000;
pub const DEFAULT_SERVICE_VALIDITY_MS: i64 = 60_000;
pub const DEFAULT_PUBLIC_PATHS: &str = "/api/auth/,/api/public/,/actuator/";
pub const DEFAULT_GATEWAY_ROUTES: &str = "/api/auth/=http://localhost:8080";
pub const DEFAULT_MEMBER_SERVICE_URL: &str = "http://localhost:10001";
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Minimum HMAC secret length, matching HS256's 256-bit key requirement.
pub const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Which backing store holds refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Shared by every instance. The only choice for more than one replica.
    Redis,
    /// Single instance, persisted to `DATA_DIR`.
    Redb,
    /// Single instance, lost on restart.
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// Token lifetimes and the shared signing secret.
#[derive(Clone)]
pub struct TokenSettings {
    pub secret: Vec<u8>,
    pub access_validity: chrono::Duration,
    pub refresh_validity: chrono::Duration,
    pub service_validity: chrono::Duration,
    pub leeway_secs: u64,
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &"<redacted>")
            .field("access_validity", &self.access_validity)
            .field("refresh_validity", &self.refresh_validity)
            .field("service_validity", &self.service_validity)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

impl TokenSettings {
    /// Default lifetimes around the given secret.
    pub fn with_secret(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            access_validity: chrono::Duration::milliseconds(DEFAULT_ACCESS_VALIDITY_MS),
            refresh_validity: chrono::Duration::milliseconds(DEFAULT_REFRESH_VALIDITY_MS),
            service_validity: chrono::Duration::milliseconds(DEFAULT_SERVICE_VALIDITY_MS),
            leeway_secs: 0,
        }
    }
}

/// One gateway route: requests whose path starts with `prefix` go to `upstream`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    pub prefix: String,
    pub upstream: Url,
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub bind_addr: SocketAddr,
    pub public_paths: Vec<String>,
    pub routes: Vec<RouteConfig>,
    pub forward_authorization: bool,
    pub legacy_token_truncation: bool,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub tokens: TokenSettings,
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub store_kind: StoreKind,
    pub redis_url: Url,
    pub store_timeout: Duration,
    pub member_service_url: Url,
    pub lookup_timeout: Duration,
    pub gateway: GatewaySettings,
    pub verify_service_signatures: bool,
    pub log_format: LogFormat,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);

        let secret = env.required(JWT_SECRET_ENV)?;
        if secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::Invalid {
                name: JWT_SECRET_ENV,
                reason: format!("must be at least {MIN_SECRET_BYTES} bytes"),
            });
        }

        let tokens = TokenSettings {
            secret: secret.into_bytes(),
            access_validity: env.millis(ACCESS_VALIDITY_ENV, DEFAULT_ACCESS_VALIDITY_MS)?,
            refresh_validity: env.millis(REFRESH_VALIDITY_ENV, DEFAULT_REFRESH_VALIDITY_MS)?,
            service_validity: env.millis(SERVICE_VALIDITY_ENV, DEFAULT_SERVICE_VALIDITY_MS)?,
            leeway_secs: env.parsed(LEEWAY_ENV, 0u64)?,
        };

        let bind_addr = env.socket_addr(HOST_ENV, PORT_ENV, 8080)?;

        let store_kind = match env.or_default(REFRESH_STORE_ENV, "redis").to_ascii_lowercase().as_str() {
            "redis" => StoreKind::Redis,
            "redb" => StoreKind::Redb,
            "memory" => StoreKind::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    name: REFRESH_STORE_ENV,
                    reason: format!("unknown store '{other}' (expected 'redis', 'redb' or 'memory')"),
                })
            }
        };

        let member_service_url = env.url(MEMBER_SERVICE_URL_ENV, DEFAULT_MEMBER_SERVICE_URL)?;

        let gateway = GatewaySettings {
            bind_addr: env.socket_addr(GATEWAY_HOST_ENV, GATEWAY_PORT_ENV, 8000)?,
            public_paths: split_list(&env.or_default(GATEWAY_PUBLIC_PATHS_ENV, DEFAULT_PUBLIC_PATHS)),
            routes: parse_routes(&env.or_default(GATEWAY_ROUTES_ENV, DEFAULT_GATEWAY_ROUTES))?,
            forward_authorization: env.flag(GATEWAY_FORWARD_AUTHORIZATION_ENV, true)?,
            legacy_token_truncation: env.flag(GATEWAY_LEGACY_TRUNCATION_ENV, false)?,
        };

        let log_format = match env.or_default(LOG_FORMAT_ENV, "pretty").to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            tokens,
            bind_addr,
            data_dir: PathBuf::from(env.or_default(DATA_DIR_ENV, "./data")),
            store_kind,
            redis_url: env.url(REDIS_URL_ENV, DEFAULT_REDIS_URL)?,
            store_timeout: Duration::from_millis(env.parsed(STORE_TIMEOUT_ENV, 3000u64)?),
            member_service_url,
            lookup_timeout: Duration::from_millis(env.parsed(LOOKUP_TIMEOUT_ENV, 3000u64)?),
            gateway,
            verify_service_signatures: env.flag(SERVICE_IDENTITY_VERIFY_ENV, true)?,
            log_format,
        })
    }

    /// Path of the redb refresh token database.
    pub fn refresh_db_path(&self) -> PathBuf {
        self.data_dir.join("refresh_tokens.redb")
    }
}

struct Env<'a, F>(&'a F);

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn or_default(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn millis(&self, name: &'static str, default: i64) -> Result<chrono::Duration, ConfigError> {
        let ms: i64 = self.parsed(name, default)?;
        if ms <= 0 {
            return Err(ConfigError::Invalid {
                name,
                reason: "must be a positive number of milliseconds".to_string(),
            });
        }
        Ok(chrono::Duration::milliseconds(ms))
    }

    fn flag(&self, name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(name).map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
            Some(v) => Err(ConfigError::Invalid {
                name,
                reason: format!("'{v}' is not a boolean"),
            }),
        }
    }

    fn url(&self, name: &'static str, default: &str) -> Result<Url, ConfigError> {
        let raw = self.or_default(name, default);
        Url::parse(&raw).map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        })
    }

    fn socket_addr(
        &self,
        host_var: &'static str,
        port_var: &'static str,
        default_port: u16,
    ) -> Result<SocketAddr, ConfigError> {
        let host = self.or_default(host_var, "0.0.0.0");
        let port: u16 = self.parsed(port_var, default_port)?;
        format!("{host}:{port}")
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: host_var,
                reason: e.to_string(),
            })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `prefix=upstream` pairs.
pub fn parse_routes(raw: &str) -> Result<Vec<RouteConfig>, ConfigError> {
    split_list(raw)
        .into_iter()
        .map(|pair| {
            let (prefix, upstream) = pair.split_once('=').ok_or_else(|| ConfigError::Invalid {
                name: GATEWAY_ROUTES_ENV,
                reason: format!("route '{pair}' is not of the form prefix=upstream"),
            })?;
            let upstream = Url::parse(upstream.trim()).map_err(|e| ConfigError::Invalid {
                name: GATEWAY_ROUTES_ENV,
                reason: format!("route '{pair}': {e}"),
            })?;
            Ok(RouteConfig {
                prefix: prefix.trim().to_string(),
                upstream,
            })
        })
        .collect()
}
