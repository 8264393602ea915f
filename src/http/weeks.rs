use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use pickem_server_domain::week::{Week, WeekId};

use crate::http::{AppState, HttpServiceError, require_admin};

#[derive(serde::Deserialize)]
pub struct SeasonQuery {
    pub season: i32,
}

pub async fn get_weeks(
    State(state): State<AppState>,
    Query(query): Query<SeasonQuery>,
) -> Result<Json<Vec<Week>>, HttpServiceError> {
    let weeks = state.weeks.get_weeks(query.season).await?;
    Ok(Json(weeks))
}

pub async fn activate_week(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<WeekId>,
) -> Result<Json<serde_json::Value>, HttpServiceError> {
    require_admin(&state, &headers).await?;
    state.weeks.activate_week(id).await?;
    Ok(Json(serde_json::json!({ "active": id })))
}
