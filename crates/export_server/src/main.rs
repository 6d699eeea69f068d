//! CSV Export Service (Rust)
//!
//! Asynchronous, memory-bounded CSV export over a `users` table: submit a
//! filtered export, poll its progress, download the finished artifact.
//!
//! Usage:
//!     export-server --http-port 8080 --database-url postgres://...

use clap::Parser;
use export_db::{build_pool, DbConfig};
use export_pipeline::{ExportPipeline, JobRegistry};
use export_server::config::{Args, Config};
use export_server::http::{router, AppState};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    export_logging::init();

    let config: Config = Args::parse().into();

    tracing::info!(port = config.http_port, "starting export service");

    let db_config = DbConfig::new(config.database_url.clone(), config.db_max_connections);
    let pool = build_pool(&db_config).await?;

    let registry = JobRegistry::new(config.max_concurrent_jobs);
    let pipeline = ExportPipeline::new(
        registry.clone(),
        pool,
        config.storage_path.clone(),
        config.batch_size,
    );

    let app = router(AppState { registry, pipeline });

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
