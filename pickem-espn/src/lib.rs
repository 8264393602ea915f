pub mod cache;
pub mod client;
pub mod wire;

pub use cache::{CacheError, FileCache};
pub use client::{ApiError, REGULAR_SEASON, ScoreboardClient};
pub use wire::{Competition, Competitor, Event, Scoreboard, Team, parse_event_date};
