//! Shared-secret authentication
//!
//! Every /api route except /api/login requires the password, carried either
//! in the `auth-token` header or, for plain download links, in the `token`
//! query parameter.

use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

const TOKEN_HEADER: &str = "auth-token";

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Middleware rejecting requests without the shared secret
pub async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header_token = request
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let query_token = Query::<TokenQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|q| q.0.token);

    let supplied = header_token.or(query_token);
    match supplied {
        Some(token) if token == state.config().auth.password => Ok(next.run(request).await),
        _ => Err(AppError::Unauthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{middleware, routing::get, Router};
    use axum_test::TestServer;

    async fn server() -> TestServer {
        let mut config = Config::default();
        config.auth.password = "s3cret".to_string();
        let pool = crate::db::create_pool("sqlite::memory:").await.unwrap();
        let state = AppState::new(config, pool);

        let app = Router::new()
            .route("/api/ping", get(|| async { "pong" }))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_token,
            ))
            .with_state(state);
        TestServer::new(app).unwrap()
    }

    #[tokio::test]
    async fn header_token_is_accepted() {
        let server = server().await;
        let response = server
            .get("/api/ping")
            .add_header("auth-token".parse().unwrap(), "s3cret".parse().unwrap())
            .await;
        response.assert_status_ok();
    }

    #[tokio::test]
    async fn query_token_is_accepted() {
        let server = server().await;
        let response = server.get("/api/ping").add_query_param("token", "s3cret").await;
        response.assert_status_ok();
    }

    #[tokio::test]
    async fn wrong_or_missing_token_is_rejected() {
        let server = server().await;
        server
            .get("/api/ping")
            .add_query_param("token", "nope")
            .await
            .assert_status_unauthorized();
        server.get("/api/ping").await.assert_status_unauthorized();
    }
}
