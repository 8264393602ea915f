use std::sync::Arc;

use crate::ServiceResult;

pub type ArcOddsService = Arc<Box<dyn OddsService + Send + Sync + 'static>>;

/// Collaborator that fills in real point spreads for a week's games. The
/// core only triggers refreshes; the wire format and provider are its own
/// concern.
#[async_trait::async_trait]
pub trait OddsService {
    async fn update_game_spreads(&self, season: i32, week: i32) -> ServiceResult<()>;
}
