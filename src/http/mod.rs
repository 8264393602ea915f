use axum::{
    Router,
    http::HeaderMap,
    response::IntoResponse,
    routing::{delete, get, post},
};
use log::info;
use pickem_server_domain::{
    ServiceError,
    game::ArcGameRepository,
    pick::ArcPickRepository,
    user::{ArcUserRepository, Role, User},
    week::ArcWeekRepository,
};

mod games;
mod leaderboard;
mod picks;
mod weeks;

#[derive(Clone)]
pub struct AppState {
    pub games: ArcGameRepository,
    pub picks: ArcPickRepository,
    pub weeks: ArcWeekRepository,
    pub users: ArcUserRepository,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .route("/games", get(games::get_games))
                .route("/leaderboard/week", get(leaderboard::weekly))
                .route("/leaderboard/season", get(leaderboard::season))
                .route("/picks", post(picks::create_picks))
                .route("/survivor", post(picks::create_survivor_pick))
                .route("/weeks", get(weeks::get_weeks))
                .route("/admin/games", post(games::upsert_game))
                .route("/admin/games/{id}", delete(games::delete_game))
                .route("/admin/results", post(games::submit_result))
                .route("/admin/weeks/{id}/activate", post(weeks::activate_week)),
        )
        .with_state(state)
}

pub async fn run(
    state: AppState,
    host: &str,
    port: u16,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) {
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}"))
        .await
        .expect("failed to bind HTTP listener");

    info!("API server listening on {host}:{port}");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal)
        .await
        .expect("HTTP server failed");

    info!("HTTP API shut down gracefully");
}

pub struct HttpServiceError(ServiceError);

impl IntoResponse for HttpServiceError {
    fn into_response(self) -> axum::http::Response<axum::body::Body> {
        let (status, msg) = match self.0 {
            ServiceError::NotFound(msg) => (axum::http::StatusCode::NOT_FOUND, msg),
            ServiceError::Unauthorized(msg) => (axum::http::StatusCode::UNAUTHORIZED, msg),
            ServiceError::BadRequest(msg) => (axum::http::StatusCode::BAD_REQUEST, msg),
            ServiceError::Conflict(msg) => (axum::http::StatusCode::CONFLICT, msg),
            ServiceError::Forbidden(msg) => (axum::http::StatusCode::FORBIDDEN, msg),
            ServiceError::Internal(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        let body = serde_json::json!({ "error": msg });
        (status, axum::Json(body)).into_response()
    }
}

impl From<ServiceError> for HttpServiceError {
    fn from(value: ServiceError) -> Self {
        HttpServiceError(value)
    }
}

/// Admin routes identify the caller by the `x-user-id` header; credential
/// checking happens upstream in the auth collaborator.
pub async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<User, ServiceError> {
    let id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| ServiceError::Unauthorized("missing or malformed x-user-id".to_string()))?;

    let user = state
        .users
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized(format!("unknown user {id}")))?;

    if user.role != Role::Admin {
        return ServiceError::forbidden(format!("user {id} is not an admin"));
    }
    Ok(user)
}
