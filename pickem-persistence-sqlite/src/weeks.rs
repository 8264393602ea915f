use chrono::DateTime;
use pickem_server_domain::{
    ServiceError, ServiceResult,
    week::{NewWeek, Week, WeekId, WeekRepository},
};
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{internal, is_unique_violation};

pub struct SqliteWeekRepository {
    pool: Pool<Sqlite>,
}

impl SqliteWeekRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

fn row_to_week(row: &SqliteRow) -> ServiceResult<Week> {
    let start: i64 = row.try_get("week_start_time").map_err(internal)?;
    let end: i64 = row.try_get("week_end_time").map_err(internal)?;
    let is_active: i64 = row.try_get("is_active").map_err(internal)?;
    Ok(Week {
        id: row.try_get("id").map_err(internal)?,
        week_number: row.try_get("week_number").map_err(internal)?,
        season: row.try_get("season").map_err(internal)?,
        week_start_time: DateTime::from_timestamp(start, 0)
            .ok_or_else(|| ServiceError::Internal(format!("invalid week_start_time {start}")))?,
        week_end_time: DateTime::from_timestamp(end, 0)
            .ok_or_else(|| ServiceError::Internal(format!("invalid week_end_time {end}")))?,
        is_active: is_active != 0,
    })
}

const WEEK_COLUMNS: &str = "id, week_number, season, week_start_time, week_end_time, is_active";

#[async_trait::async_trait]
impl WeekRepository for SqliteWeekRepository {
    async fn get_weeks(&self, season: i32) -> ServiceResult<Vec<Week>> {
        let rows = sqlx::query(&format!(
            "SELECT {WEEK_COLUMNS} FROM weeks WHERE season = ? ORDER BY week_number"
        ))
        .bind(season)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;
        rows.iter().map(row_to_week).collect()
    }

    async fn get_active_week(&self) -> ServiceResult<Option<Week>> {
        let row = sqlx::query(&format!(
            "SELECT {WEEK_COLUMNS} FROM weeks WHERE is_active = 1"
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;
        row.as_ref().map(row_to_week).transpose()
    }

    async fn create_week(&self, week: &NewWeek) -> ServiceResult<Week> {
        let res = sqlx::query(
            "INSERT INTO weeks (week_number, season, week_start_time, week_end_time, is_active)
             VALUES (?, ?, ?, ?, 0)",
        )
        .bind(week.week_number)
        .bind(week.season)
        .bind(week.week_start_time.timestamp())
        .bind(week.week_end_time.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict(format!(
                    "week {} of season {} already exists",
                    week.week_number, week.season
                ))
            } else {
                internal(e)
            }
        })?;

        Ok(Week {
            id: res.last_insert_rowid(),
            week_number: week.week_number,
            season: week.season,
            week_start_time: week.week_start_time,
            week_end_time: week.week_end_time,
            is_active: false,
        })
    }

    async fn activate_week(&self, id: WeekId) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        sqlx::query("UPDATE weeks SET is_active = 0")
            .execute(&mut *tx)
            .await
            .map_err(internal)?;

        let res = sqlx::query("UPDATE weeks SET is_active = 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;
        if res.rows_affected() == 0 {
            // dropping the transaction keeps the previous active week
            return ServiceError::not_found(format!("week {id} does not exist"));
        }

        tx.commit().await.map_err(internal)
    }
}
