//! The HTTP surface: five endpoints that parse, validate, and delegate to
//! the job registry and the pipeline. No business logic lives here beyond
//! request parsing and response shaping.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use export_pipeline::{ExportPipeline, JobRegistry};
use export_protocol::filters::{parse_columns, parse_dialect_char};
use export_protocol::{ExportError, ExportId, ExportSpec, ExportStatusResponse, Filters, JobStatus, SubscriptionTier};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::download;
use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub registry: JobRegistry,
    pub pipeline: ExportPipeline,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/exports/csv", post(initiate))
        .route("/exports/:id/status", get(status))
        .route("/exports/:id/download", get(download_artifact))
        .route("/exports/:id", delete(cancel))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct InitiateQuery {
    country_code: Option<String>,
    subscription_tier: Option<String>,
    min_ltv: Option<String>,
    columns: Option<String>,
    delimiter: Option<String>,
    #[serde(rename = "quoteChar")]
    quote_char: Option<String>,
}

async fn initiate(
    State(state): State<AppState>,
    Query(query): Query<InitiateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut filters = Filters::default();
    if let Some(raw) = query.country_code {
        filters.country_code = Some(Filters::parse_country_code(&raw)?);
    }
    if let Some(raw) = query.subscription_tier {
        filters.subscription_tier = Some(SubscriptionTier::parse(&raw)?);
    }
    if let Some(raw) = query.min_ltv {
        filters.min_ltv = Some(Filters::parse_min_ltv(&raw)?);
    }

    let columns = parse_columns(query.columns.as_deref())?;
    let delimiter = match query.delimiter {
        Some(raw) => parse_dialect_char(&raw, "delimiter")?,
        None => ',',
    };
    let quote_char = match query.quote_char {
        Some(raw) => parse_dialect_char(&raw, "quoteChar")?,
        None => '"',
    };
    if delimiter == quote_char {
        return Err(ApiError(ExportError::Validation(
            "delimiter and quoteChar must differ".to_string(),
        )));
    }

    let spec = ExportSpec {
        filters,
        columns,
        delimiter,
        quote_char,
    };

    let active = state.registry.active_count().await;
    if active >= state.registry.soft_concurrency_cap() {
        info!(
            active,
            cap = state.registry.soft_concurrency_cap(),
            "soft concurrency cap exceeded on initiate; admitting job anyway"
        );
    }

    let id = state.registry.create(spec).await;

    let pipeline = state.pipeline.clone();
    tokio::spawn(async move { pipeline.run(id).await });

    let body = serde_json::json!({ "exportId": id.to_string(), "status": "pending" });
    Ok((StatusCode::ACCEPTED, Json(body)))
}

async fn status(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&raw_id)?;
    let job = state
        .registry
        .get(id)
        .await
        .ok_or_else(|| ApiError(ExportError::NotFound(raw_id.clone())))?;
    Ok(Json(ExportStatusResponse::from(&job)))
}

async fn download_artifact(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let id = parse_id(&raw_id)?;
    let job = state
        .registry
        .get(id)
        .await
        .ok_or_else(|| ApiError(ExportError::NotFound(raw_id.clone())))?;

    if job.status != JobStatus::Completed {
        return Err(ApiError(ExportError::state(
            job.status.as_str(),
            "export is not yet complete",
        )));
    }
    let path = job
        .file_path
        .ok_or_else(|| ApiError(ExportError::NotFound("artifact file missing".to_string())))?;

    let range_header = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());
    let accept_gzip = headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("gzip"))
        .unwrap_or(false);

    download::serve_file(&path, &id.to_string(), range_header, accept_gzip)
        .await
        .map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ApiError(ExportError::NotFound("artifact file missing".to_string()))
            } else {
                ApiError(ExportError::Io(err.to_string()))
            }
        })
}

async fn cancel(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&raw_id)?;
    let cancelled = state.registry.cancel_job(id).await?;
    if cancelled {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError(ExportError::Validation(
            "export is already in a terminal state".to_string(),
        )))
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

fn parse_id(raw: &str) -> Result<ExportId, ApiError> {
    ExportId::from_str(raw).map_err(|_| ApiError(ExportError::NotFound(raw.to_string())))
}
