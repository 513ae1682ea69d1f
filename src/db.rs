use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// File name of a collection's index inside its directory.
pub const INDEX_FILE: &str = "index.sqlite";

/// Open (creating if needed) the SQLite index inside `collection_dir`.
pub async fn connect(collection_dir: &Path) -> Result<SqlitePool> {
    std::fs::create_dir_all(collection_dir)?;
    let db_path = collection_dir.join(INDEX_FILE);

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
