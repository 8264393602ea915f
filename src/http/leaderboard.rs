use std::{cmp::Ordering, collections::HashMap};

use axum::{
    Json,
    extract::{Query, State},
};
use pickem_server_domain::{
    game::{Game, GameId, PlayerScore},
    scoring::score_week,
    user::UserId,
};

use crate::http::{AppState, HttpServiceError};

#[derive(serde::Deserialize)]
pub struct WeekQuery {
    pub season: i32,
    pub week: i32,
}

#[derive(serde::Deserialize)]
pub struct SeasonQuery {
    pub season: i32,
}

#[derive(serde::Serialize)]
pub struct JsonLeaderboardEntry {
    pub user_id: UserId,
    pub name: String,
    pub score: f64,
}

pub async fn weekly(
    State(state): State<AppState>,
    Query(query): Query<WeekQuery>,
) -> Result<Json<Vec<JsonLeaderboardEntry>>, HttpServiceError> {
    let games = state.games.get_games_by_week(query.season, query.week).await?;
    leaderboard_for(&state, games).await
}

pub async fn season(
    State(state): State<AppState>,
    Query(query): Query<SeasonQuery>,
) -> Result<Json<Vec<JsonLeaderboardEntry>>, HttpServiceError> {
    let games = state.games.get_games_by_season(query.season).await?;
    leaderboard_for(&state, games).await
}

/// Score the given games and attach display names. Users whose picks map
/// only to ungraded games simply do not appear; an entirely ungraded week
/// is an empty list.
async fn leaderboard_for(
    state: &AppState,
    games: Vec<Game>,
) -> Result<Json<Vec<JsonLeaderboardEntry>>, HttpServiceError> {
    let ids: Vec<GameId> = games.iter().map(|g| g.id).collect();
    let results = state.games.get_results_for_games(&ids).await?;
    let picks = state.picks.get_picks_for_games(&ids).await?;

    let mut scores: Vec<PlayerScore> = score_week(&games, &results, &picks);
    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });

    let user_ids: Vec<UserId> = scores.iter().map(|s| s.user_id).collect();
    let names: HashMap<UserId, String> = state
        .users
        .get_users_by_ids(&user_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();

    let entries = scores
        .into_iter()
        .map(|s| JsonLeaderboardEntry {
            user_id: s.user_id,
            name: names.get(&s.user_id).cloned().unwrap_or_default(),
            score: s.score,
        })
        .collect();
    Ok(Json(entries))
}
