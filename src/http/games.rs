use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use chrono::{DateTime, Utc};
use pickem_server_domain::{
    ServiceError,
    game::{Game, GameId, GameResult, NewGame, NewGameResult},
};

use crate::http::{AppState, HttpServiceError, require_admin};

#[derive(serde::Deserialize)]
pub struct WeekQuery {
    pub season: i32,
    pub week: i32,
}

#[derive(serde::Serialize)]
pub struct JsonGameResponse {
    #[serde(flatten)]
    pub game: Game,
    pub result: Option<GameResult>,
}

pub async fn get_games(
    State(state): State<AppState>,
    Query(query): Query<WeekQuery>,
) -> Result<Json<Vec<JsonGameResponse>>, HttpServiceError> {
    let games = state.games.get_games_by_week(query.season, query.week).await?;
    let ids: Vec<GameId> = games.iter().map(|g| g.id).collect();
    let mut results = state.games.get_results_for_games(&ids).await?;

    let response = games
        .into_iter()
        .map(|game| {
            let result = results.remove(&game.id);
            JsonGameResponse { game, result }
        })
        .collect();
    Ok(Json(response))
}

#[derive(serde::Deserialize)]
pub struct JsonUpsertGameRequest {
    pub season: i32,
    pub week: i32,
    pub favorite_team: String,
    pub underdog_team: String,
    pub spread: f64,
    pub start_time: DateTime<Utc>,
}

pub async fn upsert_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<JsonUpsertGameRequest>,
) -> Result<Json<Game>, HttpServiceError> {
    require_admin(&state, &headers).await?;

    let new_game = NewGame {
        season: request.season,
        week: request.week,
        favorite_team: request.favorite_team,
        underdog_team: request.underdog_team,
        spread: request.spread,
        start_time: request.start_time,
    };
    new_game.validate()?;

    let game = state.games.upsert_game_by_natural_key(&new_game).await?;
    Ok(Json(game))
}

pub async fn delete_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<GameId>,
) -> Result<Json<serde_json::Value>, HttpServiceError> {
    require_admin(&state, &headers).await?;
    state.games.delete_game(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

#[derive(serde::Deserialize)]
pub struct JsonSubmitResultRequest {
    pub game_id: GameId,
    pub favorite_score: i64,
    pub underdog_score: i64,
}

/// Admin entry or correction of a final score. The outcome is derived from
/// the game's current spread, never accepted from the caller.
pub async fn submit_result(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<JsonSubmitResultRequest>,
) -> Result<Json<GameResult>, HttpServiceError> {
    require_admin(&state, &headers).await?;

    if request.favorite_score < 0 || request.underdog_score < 0 {
        return Err(ServiceError::BadRequest("scores must be non-negative".to_string()).into());
    }

    let game = state
        .games
        .get_game_by_id(request.game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game {} not found", request.game_id)))?;

    let result = state
        .games
        .upsert_result_by_game_id(&NewGameResult::from_scores(
            game.id,
            request.favorite_score,
            request.underdog_score,
            game.spread,
        ))
        .await?;
    Ok(Json(result))
}
