//! Turns raw feed events into store rows.
//!
//! The feed does not publish point spreads, so every ingested game carries
//! spread 0 and labels the home team as the favorite; the odds collaborator
//! fills in real spreads later. Outcomes recorded here are therefore
//! computed against spread 0 and are only overwritten by re-ingestion or an
//! admin-submitted result.

use pickem_espn::wire::{Competitor, Event, parse_event_date};
use pickem_server_domain::{
    ServiceError, ServiceResult,
    game::{ArcGameRepository, NewGame, NewGameResult},
};

#[derive(Debug, Clone, PartialEq)]
pub struct TransformedEvent {
    pub game: NewGame,
    /// (favorite_score, underdog_score) when both competitors carry a score.
    pub scores: Option<(i64, i64)>,
}

/// Map one event to a game plus optional scores. Events without competitions
/// yield `Ok(None)`; structural problems yield `BadRequest`.
pub fn transform_event(
    event: &Event,
    season: i32,
    week: i32,
) -> ServiceResult<Option<TransformedEvent>> {
    let Some(competition) = event.competitions.as_deref().and_then(|c| c.first()) else {
        return Ok(None);
    };

    let competitors = competition.competitors.as_deref().unwrap_or_default();
    if competitors.len() != 2 {
        return ServiceError::bad_request(format!(
            "invalid event {:?}: expected exactly two competitors, got {}",
            event.id,
            competitors.len()
        ));
    }

    let home = find_side(competitors, "home").ok_or_else(|| invalid(event, "no home competitor"))?;
    let away = find_side(competitors, "away").ok_or_else(|| invalid(event, "no away competitor"))?;
    let home_team = team_name(home).ok_or_else(|| invalid(event, "home team has no name"))?;
    let away_team = team_name(away).ok_or_else(|| invalid(event, "away team has no name"))?;

    let start_time = competition
        .date
        .as_deref()
        .and_then(parse_event_date)
        .or_else(|| event.date.as_deref().and_then(parse_event_date))
        .ok_or_else(|| {
            ServiceError::BadRequest(format!("event {:?} is missing a start time", event.id))
        })?;

    let scores = match (&home.score, &away.score) {
        (Some(home_score), Some(away_score)) => {
            Some((parse_score(home_score), parse_score(away_score)))
        }
        _ => None,
    };

    Ok(Some(TransformedEvent {
        game: NewGame {
            season,
            week,
            favorite_team: home_team,
            underdog_team: away_team,
            spread: 0.0,
            start_time,
        },
        scores,
    }))
}

/// Upsert the game, then (when scored) its result. The two writes are
/// independently transactional; a result failure after a successful game
/// write is reported to the caller and the next event proceeds.
pub async fn store_game_and_result(
    games: &ArcGameRepository,
    transformed: &TransformedEvent,
) -> ServiceResult<()> {
    let game = games.upsert_game_by_natural_key(&transformed.game).await?;
    if let Some((favorite_score, underdog_score)) = transformed.scores {
        let result = NewGameResult::from_scores(
            game.id,
            favorite_score,
            underdog_score,
            transformed.game.spread,
        );
        games.upsert_result_by_game_id(&result).await?;
    }
    Ok(())
}

fn find_side<'a>(competitors: &'a [Competitor], side: &str) -> Option<&'a Competitor> {
    competitors
        .iter()
        .find(|c| c.home_away.as_deref() == Some(side))
}

fn team_name(competitor: &Competitor) -> Option<String> {
    competitor.team.as_ref()?.display_name.clone()
}

fn invalid(event: &Event, reason: &str) -> ServiceError {
    ServiceError::BadRequest(format!("invalid event {:?}: {reason}", event.id))
}

/// The feed sends scores as strings; empty, non-numeric or negative values
/// count as 0.
fn parse_score(s: &str) -> i64 {
    s.trim().parse().unwrap_or(0).max(0)
}
