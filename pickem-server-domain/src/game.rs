use std::{collections::HashMap, str::FromStr, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ServiceError, ServiceResult, user::UserId};

pub type GameId = i64;

/// The atomic scoring unit: one matchup in one week of one season.
///
/// Natural key: (season, week, favorite_team, underdog_team). The spread is
/// the number of points the favorite is giving; spread 0 is a pick'em.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub season: i32,
    pub week: i32,
    pub favorite_team: String,
    pub underdog_team: String,
    pub spread: f64,
    pub start_time: DateTime<Utc>,
}

/// A game as it exists before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGame {
    pub season: i32,
    pub week: i32,
    pub favorite_team: String,
    pub underdog_team: String,
    pub spread: f64,
    pub start_time: DateTime<Utc>,
}

impl NewGame {
    pub fn validate(&self) -> ServiceResult<()> {
        if self.favorite_team == self.underdog_team {
            return ServiceError::bad_request("favorite and underdog must differ");
        }
        if self.spread < 0.0 {
            return ServiceError::bad_request("spread must be non-negative");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Favorite,
    Underdog,
    Push,
}

impl Outcome {
    /// Derive the outcome of a game from its final scores and the spread.
    ///
    /// margin = favorite_score - underdog_score - spread. Positive means the
    /// favorite covered, negative means the underdog covered, zero is a push.
    pub fn from_scores(favorite_score: i64, underdog_score: i64, spread: f64) -> Self {
        let margin = (favorite_score - underdog_score) as f64 - spread;
        if margin > 0.0 {
            Outcome::Favorite
        } else if margin < 0.0 {
            Outcome::Underdog
        } else {
            Outcome::Push
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Favorite => "favorite",
            Outcome::Underdog => "underdog",
            Outcome::Push => "push",
        }
    }
}

impl FromStr for Outcome {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "favorite" => Ok(Outcome::Favorite),
            "underdog" => Ok(Outcome::Underdog),
            "push" => Ok(Outcome::Push),
            other => Err(ServiceError::Internal(format!("unknown outcome '{other}'"))),
        }
    }
}

/// Final score of a game. Exactly one per game; the outcome is always derived
/// from the scores and the spread, never stored independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub id: i64,
    pub game_id: GameId,
    pub favorite_score: i64,
    pub underdog_score: i64,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewGameResult {
    pub game_id: GameId,
    pub favorite_score: i64,
    pub underdog_score: i64,
    pub outcome: Outcome,
}

impl NewGameResult {
    /// The only way to build a result: scores in, outcome derived.
    pub fn from_scores(
        game_id: GameId,
        favorite_score: i64,
        underdog_score: i64,
        spread: f64,
    ) -> Self {
        Self {
            game_id,
            favorite_score,
            underdog_score,
            outcome: Outcome::from_scores(favorite_score, underdog_score, spread),
        }
    }
}

pub type ArcGameRepository = Arc<Box<dyn GameRepository + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait GameRepository {
    async fn get_game_by_id(&self, id: GameId) -> ServiceResult<Option<Game>>;
    async fn get_games_by_week(&self, season: i32, week: i32) -> ServiceResult<Vec<Game>>;
    async fn get_games_by_season(&self, season: i32) -> ServiceResult<Vec<Game>>;
    async fn week_has_games(&self, season: i32, week: i32) -> ServiceResult<bool>;

    /// Atomic lookup-by-natural-key-or-insert. When the row already exists,
    /// its spread and start time are updated and the original id is kept.
    async fn upsert_game_by_natural_key(&self, game: &NewGame) -> ServiceResult<Game>;

    /// Fails with `Conflict` while any pick references the game.
    async fn delete_game(&self, id: GameId) -> ServiceResult<()>;

    async fn upsert_result_by_game_id(&self, result: &NewGameResult) -> ServiceResult<GameResult>;
    async fn get_results_for_games(
        &self,
        game_ids: &[GameId],
    ) -> ServiceResult<HashMap<GameId, GameResult>>;
}

/// One user's weekly or season score, as produced by the scoring engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlayerScore {
    pub user_id: UserId,
    pub score: f64,
}
