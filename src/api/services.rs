use axum::{Json, extract::State, http::HeaderMap, response::IntoResponse};
use http_body_util::BodyExt;

use super::{models::CreateBatchRequest, state::AppState};
use crate::api::error::ApiError;
use crate::api::models::HealthResponse;
use crate::orchestrator::SubmitRequest;

/// Batch submission endpoint (POST /batch)
///
/// Accepts a JSON payload of URIs plus an optional freshness window and
/// webhook subscription, and resolves each URI against the ledger:
/// - a fresh or still-pending check is reused
/// - everything else gets a new check, scheduled onto the worker pool
///
/// Responds 201 Created with the full report when every member check was
/// already complete (the batch finished synchronously), otherwise 202
/// Accepted with a snapshot the client can poll via GET /batch/{id}.
pub async fn create_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;

    super::utils::parse_content_type(content_type)?;

    // Decompression is handled by RequestDecompressionLayer middleware.
    let body_bytes = read_body(body, state.config.server.api.max_payload_bytes).await?;

    let request: CreateBatchRequest = serde_json::from_slice(&body_bytes)?;

    if let Some(webhook_uri) = &request.webhook_uri {
        super::utils::validate_webhook_uri(webhook_uri)?;
    }

    let outcome = state
        .orchestrator
        .submit(SubmitRequest {
            uris: request.uris,
            checked_within_secs: request.checked_within,
            webhook_uri: request.webhook_uri,
        })
        .await?;

    let report = state
        .orchestrator
        .report(&outcome.batch)
        .map_err(|e| ApiError::Internal(format!("Failed to assemble batch report: {}", e)))?;

    let status = if outcome.completed {
        axum::http::StatusCode::CREATED
    } else {
        axum::http::StatusCode::ACCEPTED
    };

    Ok((status, Json(report)))
}

/// Reads request body and validates size
async fn read_body(body: axum::body::Body, max_size: usize) -> Result<Vec<u8>, ApiError> {
    let data = body
        .collect()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .to_bytes()
        .to_vec();

    super::utils::validate_body_size(&data, max_size)?;

    Ok(data)
}

/// Batch status endpoint (GET /batch/{batch_id})
///
/// Returns the current snapshot for a batch: per-link reports plus the
/// rollup status and completion counts.
pub async fn get_batch(
    State(state): State<AppState>,
    axum::extract::Path(batch_id): axum::extract::Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let batch = state
        .store
        .get_batch(&batch_id)
        .map_err(|e| ApiError::Internal(format!("Failed to get batch: {}", e)))?
        .ok_or_else(|| ApiError::NotFound(format!("batch {batch_id}")))?;

    let report = state
        .orchestrator
        .report(&batch)
        .map_err(|e| ApiError::Internal(format!("Failed to assemble batch report: {}", e)))?;

    Ok((axum::http::StatusCode::OK, Json(report)))
}

/// Health check endpoint (GET /health)
///
/// Verifies the ledger and the worker channels are reachable. Returns 503
/// Service Unavailable if either is unhealthy.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let ledger = match state.store.health_check() {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };
    let queue = if state.broker.health_check() {
        "healthy"
    } else {
        "unhealthy"
    };

    let all_healthy = ledger == "healthy" && queue == "healthy";
    let status_code = if all_healthy {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "unhealthy" }.to_string(),
        ledger: ledger.to_string(),
        queue: queue.to_string(),
        version: env!("CARGO_PKG_VERSION"),
    };

    (status_code, Json(response))
}
