//! Background ingestion: polls the external scoreboard, backfills missing
//! weeks, and schedules the weekly spread refresh.

pub mod schedule;
pub mod transform;

use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use pickem_espn::{ApiError, FileCache, REGULAR_SEASON, ScoreboardClient};
use pickem_server_domain::{
    ServiceError, ServiceResult,
    game::ArcGameRepository,
    odds::ArcOddsService,
    week::WEEKS_PER_SEASON,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::EspnConfig;
use schedule::{current_week, next_spread_refresh};
use transform::{store_game_and_result, transform_event};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

pub type NowFn = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct SyncService {
    games: ArcGameRepository,
    client: ScoreboardClient,
    cache: FileCache,
    odds: ArcOddsService,
    config: EspnConfig,
    now_fn: NowFn,
}

impl SyncService {
    pub fn new(
        games: ArcGameRepository,
        client: ScoreboardClient,
        cache: FileCache,
        odds: ArcOddsService,
        config: EspnConfig,
    ) -> Self {
        Self {
            games,
            client,
            cache,
            odds,
            config,
            now_fn: Arc::new(Utc::now),
        }
    }

    /// Replace the clock, for deterministic week derivation in tests.
    pub fn with_now_fn(mut self, now_fn: NowFn) -> Self {
        self.now_fn = now_fn;
        self
    }

    /// Run the orchestrator until the token is cancelled. Spawns the
    /// backfill scan and the weekly spread refresh, performs one immediate
    /// sync, then settles into the tick loop.
    pub async fn start(self: Arc<Self>, token: CancellationToken, interval: Duration) {
        if !self.config.sync_enabled {
            log::info!("scoreboard sync is disabled");
            return;
        }

        tokio::spawn(self.clone().backfill(token.clone()));
        tokio::spawn(self.clone().spread_refresh_loop(token.clone()));

        if let Err(e) = self.sync_data().await {
            log::warn!("initial scoreboard sync failed: {e}");
        }
        self.spread_zero_check().await;

        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // the first tick fires immediately; already synced

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    log::info!("scoreboard sync loop stopped");
                    return;
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = token.cancelled() => {
                            log::info!("scoreboard sync loop stopped mid-sync");
                            return;
                        }
                        res = self.sync_data() => {
                            if let Err(e) = res {
                                log::warn!("scoreboard sync failed: {e}");
                            }
                        }
                    }
                }
            }
        }
    }

    /// One-shot scan over the whole season: any week without games gets
    /// synced. A failing week is logged and never aborts the scan.
    async fn backfill(self: Arc<Self>, token: CancellationToken) {
        let season = self.config.season_year;
        log::info!("starting backfill scan for season {season}");

        for week in 1..=WEEKS_PER_SEASON {
            if token.is_cancelled() {
                log::info!("backfill cancelled at week {week}");
                return;
            }
            match self.games.week_has_games(season, week).await {
                Ok(true) => {}
                Ok(false) => {
                    if let Err(e) = self.sync_week_data(season, week).await {
                        log::warn!("backfill of week {week} failed: {e}");
                    }
                }
                Err(e) => log::warn!("backfill could not inspect week {week}: {e}"),
            }
        }
        log::info!("backfill scan for season {season} finished");
    }

    /// Sync the week the calendar says we are in.
    async fn sync_data(&self) -> Result<(), SyncError> {
        let now = (self.now_fn)();
        let week = current_week(now, self.config.week1_date);
        if week == 0 {
            log::debug!("preseason, nothing to sync");
            return Ok(());
        }
        self.sync_week_data(self.config.season_year, week).await
    }

    /// Cache -> client -> cache write -> transform -> store for one week.
    async fn sync_week_data(&self, season: i32, week: i32) -> Result<(), SyncError> {
        let events = match self.cache.get(season, week) {
            Some(events) => {
                log::debug!("cache hit for season {season} week {week}");
                events
            }
            None => {
                let scoreboard = self.client.get_scoreboard(week, REGULAR_SEASON).await?;
                let events = scoreboard.events.unwrap_or_default();
                if let Err(e) = self.cache.set(season, week, &events) {
                    log::warn!("failed to cache events for week {week}: {e}");
                }
                events
            }
        };

        let mut seen_event_ids = HashSet::new();
        let mut seen_game_keys = HashSet::new();

        for event in &events {
            if let Some(id) = &event.id
                && !seen_event_ids.insert(id.clone())
            {
                log::warn!("duplicate event {id} in week {week} batch, skipping");
                continue;
            }

            match transform_event(event, season, week) {
                Ok(Some(transformed)) => {
                    let key = (
                        transformed.game.favorite_team.clone(),
                        transformed.game.underdog_team.clone(),
                    );
                    if !seen_game_keys.insert(key) {
                        log::warn!(
                            "duplicate game {} vs {} in week {week} batch, skipping",
                            transformed.game.favorite_team,
                            transformed.game.underdog_team
                        );
                        continue;
                    }
                    if let Err(e) = store_game_and_result(&self.games, &transformed).await {
                        log::warn!(
                            "failed to store {} vs {}: {e}",
                            transformed.game.favorite_team,
                            transformed.game.underdog_team
                        );
                    }
                }
                Ok(None) => {}
                Err(e) => log::warn!("skipping event {:?}: {e}", event.id),
            }
        }

        Ok(())
    }

    /// Sleep until Monday 23:00 in the configured timezone, then ask the
    /// odds collaborator to refresh spreads for the upcoming week. Loops
    /// until cancelled.
    async fn spread_refresh_loop(self: Arc<Self>, token: CancellationToken) {
        loop {
            let now = (self.now_fn)();
            let next = next_spread_refresh(now, &self.config.cron_timezone);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            log::info!("next spread refresh scheduled for {next}");

            tokio::select! {
                _ = token.cancelled() => {
                    log::info!("spread refresh loop stopped");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            let week = current_week((self.now_fn)(), self.config.week1_date);
            let upcoming = week + 1;
            if (1..=WEEKS_PER_SEASON).contains(&upcoming) {
                if let Err(e) = self
                    .odds
                    .update_game_spreads(self.config.season_year, upcoming)
                    .await
                {
                    log::warn!("spread refresh for week {upcoming} failed: {e}");
                }
            } else {
                log::debug!("no upcoming week to refresh (current week {week})");
            }
        }
    }

    /// Startup check: a week whose games all carry spread 0 never got its
    /// odds; request a refresh for the current and previous week.
    async fn spread_zero_check(&self) {
        let season = self.config.season_year;
        let current = current_week((self.now_fn)(), self.config.week1_date);

        for week in [current - 1, current] {
            if !(1..=WEEKS_PER_SEASON).contains(&week) {
                continue;
            }
            match self.all_spreads_zero(season, week).await {
                Ok(Some(true)) => {
                    log::info!("week {week} has only zero spreads, requesting odds refresh");
                    if let Err(e) = self.odds.update_game_spreads(season, week).await {
                        log::warn!("odds refresh for week {week} failed: {e}");
                    }
                }
                Ok(_) => {}
                Err(e) => log::warn!("spread-zero check for week {week} failed: {e}"),
            }
        }
    }

    /// `None` when the week has no games at all.
    async fn all_spreads_zero(&self, season: i32, week: i32) -> ServiceResult<Option<bool>> {
        let games = self.games.get_games_by_week(season, week).await?;
        if games.is_empty() {
            return Ok(None);
        }
        Ok(Some(games.iter().all(|g| g.spread == 0.0)))
    }
}
