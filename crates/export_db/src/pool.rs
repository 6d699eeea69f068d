//! Connection pool construction.
//!
//! Mirrors the reference stack's pattern of a small, explicit `DbConfig`
//! feeding a concrete `sqlx` pool type rather than routing through
//! `sqlx::AnyPool`, so `FromRow`/text-cast queries stay straightforward.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use crate::error::{DbError, Result};

/// Database pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DbConfig {
    pub fn new(url: impl Into<String>, max_connections: u32) -> Self {
        Self {
            url: url.into(),
            max_connections,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Build a bounded `PgPool` from configuration. Each active pipeline holds
/// exactly one connection for its lifetime, so `max_connections` is also
/// the hard ceiling on concurrently-running exports.
pub async fn build_pool(config: &DbConfig) -> Result<PgPool> {
    if config.url.trim().is_empty() {
        return Err(DbError::InvalidUrl("database url must not be empty".into()));
    }

    info!(
        max_connections = config.max_connections,
        "connecting to export database"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.url)
        .await?;

    Ok(pool)
}
