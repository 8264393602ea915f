//! Scoreboard wire types: serde shapes for the external feed's responses.
//! Every field is optional; the feed omits freely and the core must never
//! panic on absence.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scoreboard {
    pub events: Option<Vec<Event>>,
    pub season: Option<Season>,
    pub week: Option<WeekInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Season {
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeekInfo {
    pub number: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    pub id: Option<String>,
    pub name: Option<String>,
    pub date: Option<String>,
    pub competitions: Option<Vec<Competition>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Competition {
    pub date: Option<String>,
    pub competitors: Option<Vec<Competitor>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Competitor {
    #[serde(rename = "homeAway")]
    pub home_away: Option<String>,
    pub team: Option<Team>,
    /// The feed sends scores as decimal strings.
    pub score: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Team {
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

/// Parse a feed timestamp. The feed emits either full RFC3339
/// (`2025-09-04T17:00:00Z`) or a seconds-truncated variant
/// (`2025-09-04T17:00Z`); try the first, fall back to the second.
pub fn parse_event_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|naive| naive.and_utc())
}
