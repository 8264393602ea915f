use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ServiceResult;

/// NFL regular season length; weeks are numbered 1..=18.
pub const WEEKS_PER_SEASON: i32 = 18;

pub type WeekId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Week {
    pub id: WeekId,
    pub week_number: i32,
    pub season: i32,
    pub week_start_time: DateTime<Utc>,
    pub week_end_time: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewWeek {
    pub week_number: i32,
    pub season: i32,
    pub week_start_time: DateTime<Utc>,
    pub week_end_time: DateTime<Utc>,
}

pub type ArcWeekRepository = Arc<Box<dyn WeekRepository + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait WeekRepository {
    async fn get_weeks(&self, season: i32) -> ServiceResult<Vec<Week>>;
    async fn get_active_week(&self) -> ServiceResult<Option<Week>>;
    async fn create_week(&self, week: &NewWeek) -> ServiceResult<Week>;

    /// Transactional: deactivates every week, then activates the target.
    /// Fails with `NotFound` (and leaves the previous active week in place)
    /// when the id does not exist.
    async fn activate_week(&self, id: WeekId) -> ServiceResult<()>;
}
