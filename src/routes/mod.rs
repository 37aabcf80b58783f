//! Route modules for Drop Server

pub mod analytics;
pub mod backup;
pub mod files;
pub mod health;
pub mod login;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::auth;
use crate::state::AppState;

/// Everything mounted under /api. All routes except /api/login require the
/// shared secret.
pub fn api_router(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/upload", post(files::upload))
        .route("/files", get(files::list))
        .route("/download/:id", get(files::download))
        .route("/rename/:id", put(files::rename))
        .route("/meta/:id", put(files::update_meta))
        .route("/delete/:id", delete(files::delete))
        .route("/pin/:id", post(files::toggle_pin))
        .route("/analytics", get(analytics::summary))
        .route("/export", post(backup::export))
        .route("/restore", post(backup::restore))
        // Uploads and restore parts can be far larger than the default
        // body cap; chunked streaming bounds memory instead.
        .layer(DefaultBodyLimit::disable())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ));

    Router::new()
        .route("/login", post(login::login))
        .merge(protected)
}
