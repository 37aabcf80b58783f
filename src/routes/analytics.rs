//! Analytics endpoint

use axum::{extract::State, Json};

use crate::db::{AnalyticsRepository, AnalyticsSummary};
use crate::error::Result;
use crate::state::AppState;

/// GET /api/analytics
pub async fn summary(State(state): State<AppState>) -> Result<Json<AnalyticsSummary>> {
    let pool = state.db().await;
    let summary = AnalyticsRepository::new(&pool).summary().await?;
    Ok(Json(summary))
}
