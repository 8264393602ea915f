use pickem_server_domain::{ServiceResult, odds::OddsService};

/// Stand-in odds collaborator until a real provider is wired up: logs the
/// request and leaves spreads untouched.
pub struct NoopOddsService;

#[async_trait::async_trait]
impl OddsService for NoopOddsService {
    async fn update_game_spreads(&self, season: i32, week: i32) -> ServiceResult<()> {
        log::info!("odds refresh requested for season {season} week {week} (noop provider)");
        Ok(())
    }
}
