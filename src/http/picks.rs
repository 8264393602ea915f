use axum::{Json, extract::State, http::StatusCode};
use pickem_server_domain::pick::{NewPick, NewSurvivorPick, SurvivorPick, validate_ranks};

use crate::http::{AppState, HttpServiceError};

#[derive(serde::Deserialize)]
pub struct JsonCreatePicksRequest {
    pub picks: Vec<NewPick>,
}

/// Submit picks for a week. Ranks must be positive and distinct per user
/// here; the store rejects the whole batch if any (user, game) pair already
/// exists or if a user's combined ranks for the week stop forming 1..=N.
pub async fn create_picks(
    State(state): State<AppState>,
    Json(request): Json<JsonCreatePicksRequest>,
) -> Result<StatusCode, HttpServiceError> {
    validate_ranks(&request.picks)?;
    state.picks.create_picks(&request.picks).await?;
    Ok(StatusCode::CREATED)
}

pub async fn create_survivor_pick(
    State(state): State<AppState>,
    Json(request): Json<NewSurvivorPick>,
) -> Result<(StatusCode, Json<SurvivorPick>), HttpServiceError> {
    let pick = state.picks.create_survivor_pick(&request).await?;
    Ok((StatusCode::CREATED, Json(pick)))
}
