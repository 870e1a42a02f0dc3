// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Metadata store reachability ("ok" or "unavailable").
    pub metadata_store: String,
    /// Bundle directory write/read/delete check ("ok" or "unavailable").
    pub blob_store: String,
}

/// Simple health check response for liveness checks.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

fn check_label(ok: bool) -> String {
    if ok { "ok" } else { "unavailable" }.to_string()
}

/// Health check endpoint handler.
///
/// Returns 200 if all checks pass, 503 if any check fails.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "Service is unhealthy", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let metadata_ok = match state.shares.metadata().ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Metadata store health check failed");
            false
        }
    };
    let blobs_ok = match state.shares.blobs().health_check().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Blob store health check failed");
            false
        }
    };
    let all_ok = metadata_ok && blobs_ok;

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            metadata_store: check_label(metadata_ok),
            blob_store: check_label(blobs_ok),
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness check handler.
///
/// Always returns 200 while the process runs. Dependencies are left to
/// readiness.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(state: State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    health(state).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn healthy_when_both_stores_respond() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = AppState::in_memory(Config::for_tests(dir.path())).unwrap();

        let (status, Json(body)) = health(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert_eq!(body.checks.metadata_store, "ok");
        assert_eq!(body.checks.blob_store, "ok");
    }

    #[tokio::test]
    async fn degraded_when_metadata_store_is_down() {
        let dir = tempfile::tempdir().unwrap();
        let (state, store) = AppState::in_memory(Config::for_tests(dir.path())).unwrap();
        store.set_available(false);

        let (status, Json(body)) = readiness(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "degraded");
        assert_eq!(body.checks.metadata_store, "unavailable");
        assert_eq!(body.checks.blob_store, "ok");
    }

    #[tokio::test]
    async fn liveness_ignores_dependencies() {
        let Json(body) = liveness().await;
        assert_eq!(body.status, "ok");
    }
}
