pub mod games;
pub mod picks;
pub mod users;
pub mod weeks;

use std::str::FromStr;

use pickem_server_domain::ServiceError;
use sqlx::{
    Pool, Sqlite,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

pub async fn create_db_pool(dsn: &str) -> Result<Pool<Sqlite>, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(dsn)?.create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

// Idempotent: every statement is CREATE ... IF NOT EXISTS, safe to run on
// every startup.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'user'
    )",
    "CREATE TABLE IF NOT EXISTS games (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        season INTEGER NOT NULL,
        week INTEGER NOT NULL,
        favorite_team TEXT NOT NULL,
        underdog_team TEXT NOT NULL,
        spread REAL NOT NULL DEFAULT 0,
        start_time INTEGER NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_games_natural_key
        ON games (season, week, favorite_team, underdog_team)",
    "CREATE TABLE IF NOT EXISTS results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        game_id INTEGER NOT NULL UNIQUE REFERENCES games (id),
        favorite_score INTEGER NOT NULL,
        underdog_score INTEGER NOT NULL,
        outcome TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS picks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users (id),
        game_id INTEGER NOT NULL REFERENCES games (id),
        picked TEXT NOT NULL,
        \"rank\" INTEGER NOT NULL,
        quick_pick INTEGER NOT NULL DEFAULT 0,
        UNIQUE (user_id, game_id)
    )",
    "CREATE TABLE IF NOT EXISTS survivor_picks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users (id),
        week INTEGER NOT NULL,
        team TEXT NOT NULL,
        UNIQUE (user_id, week)
    )",
    "CREATE TABLE IF NOT EXISTS weeks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        week_number INTEGER NOT NULL,
        season INTEGER NOT NULL,
        week_start_time INTEGER NOT NULL,
        week_end_time INTEGER NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 0,
        UNIQUE (season, week_number)
    )",
];

pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

pub(crate) fn internal(e: sqlx::Error) -> ServiceError {
    ServiceError::Internal(e.to_string())
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> Pool<Sqlite> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}
