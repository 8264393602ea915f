use std::collections::HashMap;

use pickem_server_domain::{
    ServiceError, ServiceResult,
    game::GameId,
    pick::{NewPick, NewSurvivorPick, Pick, PickRepository, SurvivorPick, validate_rank_prefix},
    user::UserId,
};
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{internal, is_unique_violation};

pub struct SqlitePickRepository {
    pool: Pool<Sqlite>,
}

impl SqlitePickRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

fn row_to_pick(row: &SqliteRow) -> ServiceResult<Pick> {
    let picked: String = row.try_get("picked").map_err(internal)?;
    let quick_pick: i64 = row.try_get("quick_pick").map_err(internal)?;
    Ok(Pick {
        id: row.try_get("id").map_err(internal)?,
        user_id: row.try_get("user_id").map_err(internal)?,
        game_id: row.try_get("game_id").map_err(internal)?,
        picked: picked.parse()?,
        rank: row.try_get("rank").map_err(internal)?,
        quick_pick: quick_pick != 0,
    })
}

#[async_trait::async_trait]
impl PickRepository for SqlitePickRepository {
    async fn get_picks_for_games(&self, game_ids: &[GameId]) -> ServiceResult<Vec<Pick>> {
        if game_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = sqlx::QueryBuilder::<Sqlite>::new(
            "SELECT id, user_id, game_id, picked, \"rank\", quick_pick FROM picks WHERE game_id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in game_ids {
            separated.push_bind(id);
        }
        builder.push(")");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        rows.iter().map(row_to_pick).collect()
    }

    async fn create_picks(&self, picks: &[NewPick]) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        // group incoming ranks by the (user, season, week) their games fall in
        let mut groups: HashMap<(UserId, i32, i32), Vec<i32>> = HashMap::new();
        for pick in picks {
            let row = sqlx::query("SELECT season, week FROM games WHERE id = ?")
                .bind(pick.game_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(internal)?;
            let Some(row) = row else {
                return ServiceError::not_found(format!("game {} does not exist", pick.game_id));
            };
            let season: i32 = row.try_get("season").map_err(internal)?;
            let week: i32 = row.try_get("week").map_err(internal)?;
            groups
                .entry((pick.user_id, season, week))
                .or_default()
                .push(pick.rank);
        }

        // the user's stored ranks for the week plus the incoming ones must
        // still form exactly 1..=N
        for ((user_id, season, week), mut ranks) in groups {
            let rows = sqlx::query(
                "SELECT p.\"rank\" AS r FROM picks p
                 JOIN games g ON g.id = p.game_id
                 WHERE p.user_id = ? AND g.season = ? AND g.week = ?",
            )
            .bind(user_id)
            .bind(season)
            .bind(week)
            .fetch_all(&mut *tx)
            .await
            .map_err(internal)?;
            for row in &rows {
                ranks.push(row.try_get("r").map_err(internal)?);
            }
            validate_rank_prefix(&ranks)?;
        }

        for pick in picks {
            sqlx::query(
                "INSERT INTO picks (user_id, game_id, picked, \"rank\", quick_pick)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(pick.user_id)
            .bind(pick.game_id)
            .bind(pick.picked.as_str())
            .bind(pick.rank)
            .bind(if pick.quick_pick { 1 } else { 0 })
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // dropping the transaction rolls back earlier inserts
                if is_unique_violation(&e) {
                    ServiceError::Conflict(format!(
                        "user {} already has a pick on game {}",
                        pick.user_id, pick.game_id
                    ))
                } else {
                    internal(e)
                }
            })?;
        }

        tx.commit().await.map_err(internal)
    }

    async fn get_survivor_picks_by_week(&self, week: i32) -> ServiceResult<Vec<SurvivorPick>> {
        let rows = sqlx::query(
            "SELECT id, user_id, week, team FROM survivor_picks WHERE week = ? ORDER BY id",
        )
        .bind(week)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.iter()
            .map(|row| {
                Ok(SurvivorPick {
                    id: row.try_get("id").map_err(internal)?,
                    user_id: row.try_get("user_id").map_err(internal)?,
                    week: row.try_get("week").map_err(internal)?,
                    team: row.try_get("team").map_err(internal)?,
                })
            })
            .collect()
    }

    async fn create_survivor_pick(&self, pick: &NewSurvivorPick) -> ServiceResult<SurvivorPick> {
        let res = sqlx::query("INSERT INTO survivor_picks (user_id, week, team) VALUES (?, ?, ?)")
            .bind(pick.user_id)
            .bind(pick.week)
            .bind(&pick.team)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::Conflict(format!(
                        "user {} already has a survivor pick for week {}",
                        pick.user_id, pick.week
                    ))
                } else {
                    internal(e)
                }
            })?;

        Ok(SurvivorPick {
            id: res.last_insert_rowid(),
            user_id: pick.user_id,
            week: pick.week,
            team: pick.team.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pickem_server_domain::{
        game::{GameRepository, NewGame},
        pick::PickSide,
        user::{NewUser, Role, UserRepository},
    };

    use super::*;
    use crate::{games::SqliteGameRepository, test_pool, users::SqliteUserRepository};

    async fn seed_user_and_games(pool: &Pool<Sqlite>, count: i32) -> (i64, Vec<i64>) {
        let users = SqliteUserRepository::new(pool.clone());
        let games = SqliteGameRepository::new(pool.clone());

        let user = users
            .create_user(&NewUser {
                email: "picker@example.com".to_string(),
                name: "Picker".to_string(),
                password_hash: "x".to_string(),
                role: Role::User,
            })
            .await
            .unwrap();

        let mut game_ids = Vec::new();
        for i in 0..count {
            let game = games
                .upsert_game_by_natural_key(&NewGame {
                    season: 2025,
                    week: 1,
                    favorite_team: format!("Home {i}"),
                    underdog_team: format!("Away {i}"),
                    spread: 0.0,
                    start_time: Utc::now(),
                })
                .await
                .unwrap();
            game_ids.push(game.id);
        }
        (user.id, game_ids)
    }

    fn pick(user_id: i64, game_id: i64, rank: i32) -> NewPick {
        NewPick {
            user_id,
            game_id,
            picked: PickSide::Favorite,
            rank,
            quick_pick: false,
        }
    }

    #[tokio::test]
    async fn batch_insert_round_trips() {
        let pool = test_pool().await;
        let (user_id, game_ids) = seed_user_and_games(&pool, 2).await;
        let repo = SqlitePickRepository::new(pool);

        repo.create_picks(&[
            pick(user_id, game_ids[0], 2),
            pick(user_id, game_ids[1], 1),
        ])
        .await
        .unwrap();

        let mut picks = repo.get_picks_for_games(&game_ids).await.unwrap();
        picks.sort_by_key(|p| p.rank);
        assert_eq!(picks.len(), 2);
        assert_eq!(picks[0].rank, 1);
        assert_eq!(picks[1].rank, 2);
        assert!(!picks[0].quick_pick);
    }

    #[tokio::test]
    async fn colliding_batch_fails_atomically() {
        let pool = test_pool().await;
        let (user_id, game_ids) = seed_user_and_games(&pool, 2).await;
        let repo = SqlitePickRepository::new(pool);

        repo.create_picks(&[pick(user_id, game_ids[0], 1)]).await.unwrap();

        // second batch collides on game 0; game 1 must not be inserted either
        let err = repo
            .create_picks(&[pick(user_id, game_ids[1], 1), pick(user_id, game_ids[0], 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let picks = repo.get_picks_for_games(&game_ids).await.unwrap();
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].game_id, game_ids[0]);
    }

    #[tokio::test]
    async fn repeated_rank_across_requests_is_a_conflict() {
        let pool = test_pool().await;
        let (user_id, game_ids) = seed_user_and_games(&pool, 2).await;
        let repo = SqlitePickRepository::new(pool);

        repo.create_picks(&[pick(user_id, game_ids[0], 1)]).await.unwrap();

        // rank 1 for the same user and week is already taken
        let err = repo
            .create_picks(&[pick(user_id, game_ids[1], 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let picks = repo.get_picks_for_games(&game_ids).await.unwrap();
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].rank, 1);
    }

    #[tokio::test]
    async fn later_request_may_extend_the_rank_prefix() {
        let pool = test_pool().await;
        let (user_id, game_ids) = seed_user_and_games(&pool, 3).await;
        let repo = SqlitePickRepository::new(pool);

        repo.create_picks(&[pick(user_id, game_ids[0], 1)]).await.unwrap();
        repo.create_picks(&[
            pick(user_id, game_ids[1], 3),
            pick(user_id, game_ids[2], 2),
        ])
        .await
        .unwrap();

        // a second extension leaving a gap is rejected
        let err = repo
            .create_picks(&[pick(user_id, game_ids[0], 5)])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let mut ranks: Vec<i32> = repo
            .get_picks_for_games(&game_ids)
            .await
            .unwrap()
            .iter()
            .map(|p| p.rank)
            .collect();
        ranks.sort_unstable();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn picks_on_unknown_games_are_not_found() {
        let pool = test_pool().await;
        let (user_id, _) = seed_user_and_games(&pool, 0).await;
        let repo = SqlitePickRepository::new(pool);

        let err = repo.create_picks(&[pick(user_id, 9999, 1)]).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn survivor_pick_is_unique_per_user_week_only() {
        let pool = test_pool().await;
        let (user_id, _) = seed_user_and_games(&pool, 0).await;
        let repo = SqlitePickRepository::new(pool);

        repo.create_survivor_pick(&NewSurvivorPick {
            user_id,
            week: 1,
            team: "Philadelphia Eagles".to_string(),
        })
        .await
        .unwrap();

        let err = repo
            .create_survivor_pick(&NewSurvivorPick {
                user_id,
                week: 1,
                team: "Dallas Cowboys".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        // same team in a later week is allowed
        repo.create_survivor_pick(&NewSurvivorPick {
            user_id,
            week: 2,
            team: "Philadelphia Eagles".to_string(),
        })
        .await
        .unwrap();

        assert_eq!(repo.get_survivor_picks_by_week(1).await.unwrap().len(), 1);
        assert_eq!(repo.get_survivor_picks_by_week(2).await.unwrap().len(), 1);
    }
}
