//! Health handler.
//!
//! `GET /health` reports a status string, which external-dependency settings
//! are configured, and a live database ping. HTTP 200 when everything is in
//! place, HTTP 503 otherwise.

use crate::{config::EnvStatus, state::AppState};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde::Serialize;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let environment = state.env;

    let database = match state.catalog.repository().ping().await {
        Ok(()) => CheckStatus {
            ok: true,
            error: None,
        },
        Err(err) => CheckStatus {
            ok: false,
            error: Some(err.to_string()),
        },
    };

    let status = if !environment.all_set() {
        "missing_env_vars"
    } else if !database.ok {
        "degraded"
    } else {
        "healthy"
    };
    let healthy = status == "healthy";

    let body = HealthResponse {
        status: status.into(),
        message: "Image upload and catalog API".into(),
        timestamp: Utc::now().to_rfc3339(),
        environment,
        database,
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    message: String,
    timestamp: String,
    environment: EnvStatus,
    database: CheckStatus,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
