//! Typed configuration surface, loaded from `EXPORT_*` environment
//! variables with `clap`-based CLI overrides for the binary entry point.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "export-server", about = "CSV export service")]
pub struct Args {
    /// TCP port the HTTP surface binds to.
    #[arg(long, env = "EXPORT_HTTP_PORT", default_value = "8080")]
    pub http_port: u16,

    /// PostgreSQL connection string.
    #[arg(long, env = "EXPORT_DATABASE_URL")]
    pub database_url: String,

    /// Maximum number of pooled database connections.
    #[arg(long, env = "EXPORT_DB_MAX_CONNECTIONS", default_value = "20")]
    pub db_max_connections: u32,

    /// Directory where completed artifact files are written.
    #[arg(long, env = "EXPORT_STORAGE_PATH", default_value = "./exports")]
    pub storage_path: PathBuf,

    /// Number of rows fetched per cursor batch.
    #[arg(long, env = "EXPORT_BATCH_SIZE", default_value = "1000")]
    pub batch_size: u32,

    /// Advisory cap on concurrently active jobs (not enforced; see
    /// `JobRegistry::soft_concurrency_cap`).
    #[arg(long, env = "EXPORT_MAX_CONCURRENT_JOBS", default_value = "5")]
    pub max_concurrent_jobs: usize,
}

/// The resolved, immutable configuration the rest of the service runs
/// against. Kept separate from [`Args`] so handlers never depend on
/// `clap` types.
#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub storage_path: PathBuf,
    pub batch_size: u32,
    pub max_concurrent_jobs: usize,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            http_port: args.http_port,
            database_url: args.database_url,
            db_max_connections: args.db_max_connections,
            storage_path: args.storage_path,
            batch_size: args.batch_size,
            max_concurrent_jobs: args.max_concurrent_jobs,
        }
    }
}
