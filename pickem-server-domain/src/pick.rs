use std::{
    collections::{HashMap, HashSet},
    str::FromStr,
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{ServiceError, ServiceResult, game::GameId, user::UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickSide {
    Favorite,
    Underdog,
}

impl PickSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickSide::Favorite => "favorite",
            PickSide::Underdog => "underdog",
        }
    }
}

impl FromStr for PickSide {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "favorite" => Ok(PickSide::Favorite),
            "underdog" => Ok(PickSide::Underdog),
            other => Err(ServiceError::Internal(format!("unknown pick side '{other}'"))),
        }
    }
}

/// One user's confidence pick on one game. The rank is the number of points
/// at stake; higher means more confident. quick_pick marks auto-assigned
/// picks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub id: i64,
    pub user_id: UserId,
    pub game_id: GameId,
    pub picked: PickSide,
    pub rank: i32,
    pub quick_pick: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewPick {
    pub user_id: UserId,
    pub game_id: GameId,
    pub picked: PickSide,
    pub rank: i32,
    pub quick_pick: bool,
}

/// Per-batch half of rank validation: each user's ranks in the batch must
/// be positive and distinct. The store completes the check against already
/// stored picks with [`validate_rank_prefix`].
pub fn validate_ranks(picks: &[NewPick]) -> ServiceResult<()> {
    let mut seen: HashMap<UserId, HashSet<i32>> = HashMap::new();
    for pick in picks {
        if pick.rank < 1 {
            return ServiceError::bad_request(format!("rank {} must be positive", pick.rank));
        }
        if !seen.entry(pick.user_id).or_default().insert(pick.rank) {
            return ServiceError::bad_request(format!(
                "duplicate rank {} for user {}",
                pick.rank, pick.user_id
            ));
        }
    }
    Ok(())
}

/// The ranks one user holds for one week, stored plus incoming, must form
/// exactly 1..=N. Violations are `Conflict`: the batch clashes with what the
/// store already holds.
pub fn validate_rank_prefix(ranks: &[i32]) -> ServiceResult<()> {
    let n = ranks.len();
    let mut seen = vec![false; n];
    for &rank in ranks {
        if rank < 1 || rank as usize > n {
            return ServiceError::conflict(format!("rank {rank} leaves a gap in 1..={n}"));
        }
        let slot = &mut seen[(rank - 1) as usize];
        if *slot {
            return ServiceError::conflict(format!("rank {rank} is already taken"));
        }
        *slot = true;
    }
    Ok(())
}

/// Survivor pool entry: one team per (user, week). The pool does not forbid
/// picking the same team in two different weeks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivorPick {
    pub id: i64,
    pub user_id: UserId,
    pub week: i32,
    pub team: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSurvivorPick {
    pub user_id: UserId,
    pub week: i32,
    pub team: String,
}

pub type ArcPickRepository = Arc<Box<dyn PickRepository + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait PickRepository {
    async fn get_picks_for_games(&self, game_ids: &[GameId]) -> ServiceResult<Vec<Pick>>;

    /// Transactional batch insert. Fails atomically with `Conflict` if any
    /// (user_id, game_id) pair already exists, or if the batch combined with
    /// the user's stored picks for the same week breaks the 1..=N rank rule.
    async fn create_picks(&self, picks: &[NewPick]) -> ServiceResult<()>;

    async fn get_survivor_picks_by_week(&self, week: i32) -> ServiceResult<Vec<SurvivorPick>>;

    /// Fails with `Conflict` when the user already has a pick for the week.
    async fn create_survivor_pick(&self, pick: &NewSurvivorPick) -> ServiceResult<SurvivorPick>;
}
