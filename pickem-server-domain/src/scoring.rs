//! The weekly scoring engine. Pure and deterministic: no store access, no
//! clock, no ordering guarantees on the output.

use std::collections::{HashMap, HashSet};

use crate::{
    game::{Game, GameId, GameResult, Outcome, PlayerScore},
    pick::{Pick, PickSide},
};

/// Score a set of picks against the graded games.
///
/// A correct side earns the pick's rank, a push earns half the rank
/// regardless of side, a wrong side earns nothing. Picks on games outside
/// `games`, or on games with no result yet, are ignored. Season scoring is
/// the same call with a season's worth of games.
///
/// The output is unordered; presentation ordering belongs to the caller.
pub fn score_week(
    games: &[Game],
    results: &HashMap<GameId, GameResult>,
    picks: &[Pick],
) -> Vec<PlayerScore> {
    let in_scope: HashSet<GameId> = games.iter().map(|g| g.id).collect();

    let mut totals: HashMap<i64, f64> = HashMap::new();
    for pick in picks {
        if !in_scope.contains(&pick.game_id) {
            continue;
        }
        let Some(result) = results.get(&pick.game_id) else {
            continue;
        };
        let credit = credit_for(pick, result.outcome);
        *totals.entry(pick.user_id).or_insert(0.0) += credit;
    }

    totals
        .into_iter()
        .map(|(user_id, score)| PlayerScore { user_id, score })
        .collect()
}

fn credit_for(pick: &Pick, outcome: Outcome) -> f64 {
    match (pick.picked, outcome) {
        (_, Outcome::Push) => f64::from(pick.rank) / 2.0,
        (PickSide::Favorite, Outcome::Favorite) => f64::from(pick.rank),
        (PickSide::Underdog, Outcome::Underdog) => f64::from(pick.rank),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::game::NewGameResult;

    fn game(id: GameId, spread: f64) -> Game {
        Game {
            id,
            season: 2025,
            week: 1,
            favorite_team: format!("Favorite {id}"),
            underdog_team: format!("Underdog {id}"),
            spread,
            start_time: Utc::now(),
        }
    }

    fn result(id: i64, game: &Game, favorite_score: i64, underdog_score: i64) -> GameResult {
        let new = NewGameResult::from_scores(game.id, favorite_score, underdog_score, game.spread);
        GameResult {
            id,
            game_id: new.game_id,
            favorite_score: new.favorite_score,
            underdog_score: new.underdog_score,
            outcome: new.outcome,
        }
    }

    fn pick(user_id: i64, game_id: GameId, picked: PickSide, rank: i32) -> Pick {
        Pick {
            id: user_id * 100 + game_id,
            user_id,
            game_id,
            picked,
            rank,
            quick_pick: false,
        }
    }

    fn score_of(scores: &[PlayerScore], user_id: i64) -> Option<f64> {
        scores.iter().find(|s| s.user_id == user_id).map(|s| s.score)
    }

    #[test]
    fn correct_side_earns_rank() {
        let g = game(1, 0.0);
        let results = HashMap::from([(1, result(1, &g, 24, 20))]);
        let picks = vec![
            pick(1, 1, PickSide::Favorite, 10),
            pick(2, 1, PickSide::Underdog, 10),
        ];
        let scores = score_week(&[g], &results, &picks);
        assert_eq!(score_of(&scores, 1), Some(10.0));
        assert_eq!(score_of(&scores, 2), Some(0.0));
    }

    #[test]
    fn push_earns_half_rank_on_both_sides() {
        // spread 3.0, favorite wins by exactly 3
        let g = game(1, 3.0);
        let results = HashMap::from([(1, result(1, &g, 20, 17))]);
        let picks = vec![
            pick(1, 1, PickSide::Favorite, 5),
            pick(2, 1, PickSide::Underdog, 5),
        ];
        let scores = score_week(&[g], &results, &picks);
        assert_eq!(score_of(&scores, 1), Some(2.5));
        assert_eq!(score_of(&scores, 2), Some(2.5));
    }

    #[test]
    fn underdog_cover_pays_underdog_pick_only() {
        // spread 7.0, favorite wins by 4: margin -3, underdog covers
        let g = game(1, 7.0);
        let results = HashMap::from([(1, result(1, &g, 21, 17))]);
        let picks = vec![
            pick(1, 1, PickSide::Underdog, 10),
            pick(2, 1, PickSide::Favorite, 10),
        ];
        let scores = score_week(&[g], &results, &picks);
        assert_eq!(score_of(&scores, 1), Some(10.0));
        assert_eq!(score_of(&scores, 2), Some(0.0));
    }

    #[test]
    fn ungraded_games_are_ignored() {
        let graded = game(1, 0.0);
        let ungraded = game(2, 0.0);
        let results = HashMap::from([(1, result(1, &graded, 24, 20))]);
        let picks = vec![
            pick(1, 1, PickSide::Favorite, 2),
            pick(1, 2, PickSide::Favorite, 1),
        ];
        let scores = score_week(&[graded, ungraded], &results, &picks);
        assert_eq!(score_of(&scores, 1), Some(2.0));
    }

    #[test]
    fn entirely_ungraded_week_yields_no_entries() {
        let g = game(1, 0.0);
        let picks = vec![pick(1, 1, PickSide::Favorite, 1)];
        let scores = score_week(&[g], &HashMap::new(), &picks);
        assert!(scores.is_empty());
    }

    #[test]
    fn picks_outside_the_game_set_are_ignored() {
        let g = game(1, 0.0);
        let other = game(99, 0.0);
        let results = HashMap::from([(1, result(1, &g, 24, 20)), (99, result(2, &other, 7, 3))]);
        let picks = vec![
            pick(1, 1, PickSide::Favorite, 1),
            pick(1, 99, PickSide::Favorite, 2),
        ];
        let scores = score_week(&[g], &results, &picks);
        assert_eq!(score_of(&scores, 1), Some(1.0));
    }

    #[test]
    fn scoring_is_invariant_under_input_reordering() {
        let g1 = game(1, 0.0);
        let g2 = game(2, 3.0);
        let results = HashMap::from([(1, result(1, &g1, 24, 20)), (2, result(2, &g2, 20, 17))]);
        let picks = vec![
            pick(1, 1, PickSide::Favorite, 2),
            pick(1, 2, PickSide::Underdog, 1),
            pick(2, 1, PickSide::Underdog, 1),
            pick(2, 2, PickSide::Favorite, 2),
        ];

        let forward = score_week(&[g1.clone(), g2.clone()], &results, &picks);
        let mut reversed_picks = picks.clone();
        reversed_picks.reverse();
        let backward = score_week(&[g2, g1], &results, &reversed_picks);

        for user in [1, 2] {
            assert_eq!(score_of(&forward, user), score_of(&backward, user));
        }
        assert_eq!(score_of(&forward, 1), Some(2.5));
        assert_eq!(score_of(&forward, 2), Some(1.0));
    }
}
