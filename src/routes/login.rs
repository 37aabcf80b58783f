//! Login endpoint
//!
//! Checks the shared secret and records the attempt with the client IP.
//! Always answers 200 with a success flag so the UI can show its own error.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::AnalyticsRepository;
use crate::error::Result;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    success: bool,
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let success = request.password == state.config().auth.password;

    let pool = state.db().await;
    let ip = addr.ip().to_string();
    if let Err(e) = AnalyticsRepository::new(&pool).log_login(&ip, success).await {
        tracing::warn!("Failed to record login attempt: {}", e);
    }

    if !success {
        tracing::info!(ip = %ip, "Failed login attempt");
    }

    Ok(Json(LoginResponse { success }))
}
