use std::collections::HashMap;

use chrono::DateTime;
use pickem_server_domain::{
    ServiceError, ServiceResult,
    game::{Game, GameId, GameRepository, GameResult, NewGame, NewGameResult},
};
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{internal, is_unique_violation};

pub struct SqliteGameRepository {
    pool: Pool<Sqlite>,
}

impl SqliteGameRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

fn row_to_game(row: &SqliteRow) -> ServiceResult<Game> {
    let start: i64 = row.try_get("start_time").map_err(internal)?;
    Ok(Game {
        id: row.try_get("id").map_err(internal)?,
        season: row.try_get("season").map_err(internal)?,
        week: row.try_get("week").map_err(internal)?,
        favorite_team: row.try_get("favorite_team").map_err(internal)?,
        underdog_team: row.try_get("underdog_team").map_err(internal)?,
        spread: row.try_get("spread").map_err(internal)?,
        start_time: DateTime::from_timestamp(start, 0)
            .ok_or_else(|| ServiceError::Internal(format!("invalid start_time {start}")))?,
    })
}

fn row_to_result(row: &SqliteRow) -> ServiceResult<GameResult> {
    let outcome: String = row.try_get("outcome").map_err(internal)?;
    Ok(GameResult {
        id: row.try_get("id").map_err(internal)?,
        game_id: row.try_get("game_id").map_err(internal)?,
        favorite_score: row.try_get("favorite_score").map_err(internal)?,
        underdog_score: row.try_get("underdog_score").map_err(internal)?,
        outcome: outcome.parse()?,
    })
}

const GAME_COLUMNS: &str = "id, season, week, favorite_team, underdog_team, spread, start_time";

#[async_trait::async_trait]
impl GameRepository for SqliteGameRepository {
    async fn get_game_by_id(&self, id: GameId) -> ServiceResult<Option<Game>> {
        let row = sqlx::query(&format!("SELECT {GAME_COLUMNS} FROM games WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        row.as_ref().map(row_to_game).transpose()
    }

    async fn get_games_by_week(&self, season: i32, week: i32) -> ServiceResult<Vec<Game>> {
        let rows = sqlx::query(&format!(
            "SELECT {GAME_COLUMNS} FROM games WHERE season = ? AND week = ? ORDER BY start_time, id"
        ))
        .bind(season)
        .bind(week)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;
        rows.iter().map(row_to_game).collect()
    }

    async fn get_games_by_season(&self, season: i32) -> ServiceResult<Vec<Game>> {
        let rows = sqlx::query(&format!(
            "SELECT {GAME_COLUMNS} FROM games WHERE season = ? ORDER BY week, start_time, id"
        ))
        .bind(season)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;
        rows.iter().map(row_to_game).collect()
    }

    async fn week_has_games(&self, season: i32, week: i32) -> ServiceResult<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM games WHERE season = ? AND week = ?")
            .bind(season)
            .bind(week)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;
        let n: i64 = row.try_get("n").map_err(internal)?;
        Ok(n > 0)
    }

    async fn upsert_game_by_natural_key(&self, game: &NewGame) -> ServiceResult<Game> {
        game.validate()?;

        let mut tx = self.pool.begin().await.map_err(internal)?;

        let existing = sqlx::query(
            "SELECT id FROM games
             WHERE season = ? AND week = ? AND favorite_team = ? AND underdog_team = ?",
        )
        .bind(game.season)
        .bind(game.week)
        .bind(&game.favorite_team)
        .bind(&game.underdog_team)
        .fetch_optional(&mut *tx)
        .await
        .map_err(internal)?;

        let id = match existing {
            Some(row) => {
                let id: i64 = row.try_get("id").map_err(internal)?;
                sqlx::query("UPDATE games SET spread = ?, start_time = ? WHERE id = ?")
                    .bind(game.spread)
                    .bind(game.start_time.timestamp())
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(internal)?;
                id
            }
            None => {
                let res = sqlx::query(
                    "INSERT INTO games (season, week, favorite_team, underdog_team, spread, start_time)
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(game.season)
                .bind(game.week)
                .bind(&game.favorite_team)
                .bind(&game.underdog_team)
                .bind(game.spread)
                .bind(game.start_time.timestamp())
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
                res.last_insert_rowid()
            }
        };

        tx.commit().await.map_err(internal)?;

        Ok(Game {
            id,
            season: game.season,
            week: game.week,
            favorite_team: game.favorite_team.clone(),
            underdog_team: game.underdog_team.clone(),
            spread: game.spread,
            start_time: game.start_time,
        })
    }

    async fn delete_game(&self, id: GameId) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        let row = sqlx::query("SELECT COUNT(*) AS n FROM picks WHERE game_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(internal)?;
        let picks: i64 = row.try_get("n").map_err(internal)?;
        if picks > 0 {
            return ServiceError::conflict(format!("game {id} has {picks} pick(s) referencing it"));
        }

        sqlx::query("DELETE FROM results WHERE game_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;

        let res = sqlx::query("DELETE FROM games WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;
        if res.rows_affected() == 0 {
            return ServiceError::not_found(format!("game {id} does not exist"));
        }

        tx.commit().await.map_err(internal)
    }

    async fn upsert_result_by_game_id(&self, result: &NewGameResult) -> ServiceResult<GameResult> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        let existing = sqlx::query("SELECT id FROM results WHERE game_id = ?")
            .bind(result.game_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(internal)?;

        let id = match existing {
            Some(row) => {
                let id: i64 = row.try_get("id").map_err(internal)?;
                sqlx::query(
                    "UPDATE results SET favorite_score = ?, underdog_score = ?, outcome = ?
                     WHERE id = ?",
                )
                .bind(result.favorite_score)
                .bind(result.underdog_score)
                .bind(result.outcome.as_str())
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
                id
            }
            None => {
                let res = sqlx::query(
                    "INSERT INTO results (game_id, favorite_score, underdog_score, outcome)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(result.game_id)
                .bind(result.favorite_score)
                .bind(result.underdog_score)
                .bind(result.outcome.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        ServiceError::Conflict(format!(
                            "result for game {} already exists",
                            result.game_id
                        ))
                    } else {
                        internal(e)
                    }
                })?;
                res.last_insert_rowid()
            }
        };

        tx.commit().await.map_err(internal)?;

        Ok(GameResult {
            id,
            game_id: result.game_id,
            favorite_score: result.favorite_score,
            underdog_score: result.underdog_score,
            outcome: result.outcome,
        })
    }

    async fn get_results_for_games(
        &self,
        game_ids: &[GameId],
    ) -> ServiceResult<HashMap<GameId, GameResult>> {
        if game_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut builder = sqlx::QueryBuilder::<Sqlite>::new(
            "SELECT id, game_id, favorite_score, underdog_score, outcome FROM results WHERE game_id IN (",
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

        let mut results = HashMap::with_capacity(rows.len());
        for row in &rows {
            let result = row_to_result(row)?;
            results.insert(result.game_id, result);
        }
        Ok(results)
    }
}
