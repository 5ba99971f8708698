//! HTTP trigger for sync runs.
//!
//! Lets a scheduler or chat command start a sync without shell access to
//! the host. One run at a time per process: a second trigger while a run
//! is in progress is rejected rather than queued.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/sync` | Run a sync, returns the full report |
//!
//! `POST /sync` accepts an optional JSON body:
//!
//! ```json
//! { "dry_run": true }
//! ```
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "sync_in_progress", "message": "a sync is already running" } }
//! ```
//!
//! Error codes: `bad_request` (400), `access_denied` (403),
//! `sync_in_progress` (409), `internal` (500), `upstream_error` (502).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::is_access_error;
use crate::ingest::{run_sync, SyncContext};
use crate::models::SyncReport;
use crate::progress::NoProgress;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    ctx: SyncContext,
    /// Held for the duration of a run.
    running: Arc<Mutex<()>>,
    /// Cancelled on shutdown; stops threads that have not started yet.
    cancel: CancellationToken,
}

/// Build the router. `cancel` is shared by every run the router starts.
pub fn router(ctx: SyncContext, cancel: CancellationToken) -> Router {
    let state = AppState {
        ctx,
        running: Arc::new(Mutex::new(())),
        cancel,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sync", post(handle_sync))
        .layer(cors)
        .with_state(state)
}

/// Starts the trigger server on `[server].bind` and runs until Ctrl-C.
///
/// On shutdown the cancellation token fires, so a run in progress stops
/// starting new threads and returns its partial report.
pub async fn run_server(config: &Config, ctx: SyncContext) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let cancel = CancellationToken::new();
    let app = router(ctx, cancel.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("sync trigger listening on http://{}", bind_addr);
    println!("Sync trigger listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
            cancel.cancel();
        })
        .await?;

    Ok(())
}

// ============ Error Handling ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"access_denied"`).
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code: code.to_string(),
        message: message.into(),
    }
}

/// Access failures get 403; anything else a collaborator reported is a 502.
fn classify_sync_error(err: anyhow::Error) -> AppError {
    let message = format!("{:#}", err);
    if is_access_error(&err) {
        app_error(StatusCode::FORBIDDEN, "access_denied", message)
    } else {
        app_error(StatusCode::BAD_GATEWAY, "upstream_error", message)
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /sync ============

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SyncRequest {
    #[serde(default)]
    dry_run: bool,
}

/// Handler for `POST /sync`.
///
/// The run is spawned onto its own task so a client that disconnects does
/// not abort it halfway through.
async fn handle_sync(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SyncReport>, AppError> {
    let request: SyncRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SyncRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            app_error(
                StatusCode::BAD_REQUEST,
                "bad_request",
                format!("invalid request body: {}", e),
            )
        })?
    };

    let guard = state.running.clone().try_lock_owned().map_err(|_| {
        app_error(
            StatusCode::CONFLICT,
            "sync_in_progress",
            "a sync is already running",
        )
    })?;

    let mut ctx = state.ctx.clone();
    ctx.options.dry_run = request.dry_run;
    let cancel = state.cancel.clone();
    tracing::info!(dry_run = request.dry_run, "sync triggered over http");

    let handle = tokio::spawn(async move {
        let _guard = guard;
        run_sync(&ctx, &cancel, &NoProgress).await
    });

    match handle.await {
        Ok(Ok(report)) => Ok(Json(report)),
        Ok(Err(e)) => {
            tracing::error!("sync failed: {:#}", e);
            Err(classify_sync_error(e))
        }
        Err(e) => Err(app_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            format!("sync task failed: {}", e),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[test]
    fn test_access_errors_map_to_forbidden() {
        let err = anyhow::Error::new(ApiError::Forbidden {
            service: "notion",
            body: "no access".to_string(),
        })
        .context("Failed to list records");
        let mapped = classify_sync_error(err);
        assert_eq!(mapped.status, StatusCode::FORBIDDEN);
        assert_eq!(mapped.code, "access_denied");
    }

    #[test]
    fn test_other_errors_map_to_bad_gateway() {
        let mapped = classify_sync_error(anyhow::anyhow!("connection reset"));
        assert_eq!(mapped.status, StatusCode::BAD_GATEWAY);
        assert_eq!(mapped.code, "upstream_error");
        assert_eq!(mapped.message, "connection reset");
    }

    #[test]
    fn test_sync_request_defaults() {
        let req: SyncRequest = serde_json::from_str("{}").unwrap();
        assert!(!req.dry_run);
        assert!(serde_json::from_str::<SyncRequest>(r#"{"dryrun": true}"#).is_err());
    }
}
