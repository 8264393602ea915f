use std::sync::Arc;

use log::{LevelFilter, info};
use log4rs::{
    Config,
    append::console::{ConsoleAppender, Target},
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};
use pickem_persistence_sqlite::{
    create_db_pool, games::SqliteGameRepository, picks::SqlitePickRepository, run_migrations,
    users::SqliteUserRepository, weeks::SqliteWeekRepository,
};
use pickem_server_domain::{
    game::ArcGameRepository, odds::ArcOddsService, pick::ArcPickRepository,
    user::ArcUserRepository, week::ArcWeekRepository,
};
use tokio_util::sync::CancellationToken;

mod config;
mod http;
mod odds;
mod sync;

fn init_logger() {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} {l} - {m}\n",
        )))
        .build();

    let config = Config::builder()
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Info)))
                .build("stderr", Box::new(stderr)),
        )
        .build(Root::builder().appender("stderr").build(LevelFilter::Trace))
        .unwrap();

    let _handle = log4rs::init_config(config).expect("Failed to initialize logger");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received. Preparing graceful exit...");
}

#[tokio::main]
async fn main() {
    let app_config = match config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_logger();

    let pool = create_db_pool(&app_config.database_dsn)
        .await
        .expect("Failed to open database");
    run_migrations(&pool).await.expect("Failed to run migrations");

    let game_repo: ArcGameRepository = Arc::new(Box::new(SqliteGameRepository::new(pool.clone())));
    let pick_repo: ArcPickRepository = Arc::new(Box::new(SqlitePickRepository::new(pool.clone())));
    let week_repo: ArcWeekRepository = Arc::new(Box::new(SqliteWeekRepository::new(pool.clone())));
    let user_repo: ArcUserRepository = Arc::new(Box::new(SqliteUserRepository::new(pool)));
    let odds_service: ArcOddsService = Arc::new(Box::new(odds::NoopOddsService));

    let sync_service = Arc::new(sync::SyncService::new(
        game_repo.clone(),
        pickem_espn::ScoreboardClient::new(app_config.espn.base_url.clone()),
        pickem_espn::FileCache::new(
            app_config.espn.cache_dir.clone(),
            app_config.espn.cache_expiry_secs,
        ),
        odds_service,
        app_config.espn.clone(),
    ));

    info!("Starting application");

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let sync_interval = app_config.espn.sync_interval;
    let sync_task = tokio::spawn(sync_service.start(token.clone(), sync_interval));

    let state = http::AppState {
        games: game_repo,
        picks: pick_repo,
        weeks: week_repo,
        users: user_repo,
    };
    let http_task = tokio::spawn(async move {
        http::run(
            state,
            &app_config.server_host,
            app_config.server_port,
            token.cancelled_owned(),
        )
        .await;
    });

    let (r1, r2) = tokio::join!(http_task, sync_task);

    if let Err(e) = r1 {
        log::error!("HTTP API task failed: {}", e);
    }

    if let Err(e) = r2 {
        log::error!("Sync task failed: {}", e);
    }
}
