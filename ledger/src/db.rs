//! SQLite-backed versioned key/value state.
//!
//! Every key lives in a namespace: [`WORLD_STATE`] for globally readable state, or the name of a
//! private collection. Each value carries a version that increases by one on every committed
//! write; the ledger host validates read versions against it at commit time.

use crate::errors::LedgerError;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Executor, Pool, Row, Sqlite, SqliteConnection};
use uuid::Uuid;

pub type Db = Pool<Sqlite>;

/// Namespace of the public world state.
pub const WORLD_STATE: &str = "~world";

pub async fn connect(db_url: &str, max_connections: u32) -> Result<Db, LedgerError> {
    let db = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await?;
    Ok(db)
}

pub async fn init_schema(db: &Db) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS state (
  ns TEXT NOT NULL,
  key TEXT NOT NULL,
  value BLOB NOT NULL,
  version INTEGER NOT NULL,
  PRIMARY KEY(ns, key)
);

CREATE TABLE IF NOT EXISTS chain_info (
  id INTEGER PRIMARY KEY CHECK (id = 0),
  height INTEGER NOT NULL
);

INSERT OR IGNORE INTO chain_info (id, height) VALUES (0, 0);

CREATE TABLE IF NOT EXISTS transactions (
  tx_id TEXT PRIMARY KEY,
  height INTEGER NOT NULL UNIQUE,
  function TEXT NOT NULL,
  creator_msp TEXT NOT NULL,
  creator_id TEXT NOT NULL,
  timestamp TEXT NOT NULL
);
"#,
    )
    .execute(db)
    .await?;

    Ok(())
}

/// Committed value and version of a key, if present.
pub async fn read_versioned<'e, E>(ex: E, ns: &str, key: &str) -> Result<Option<(Vec<u8>, i64)>, LedgerError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(r#"SELECT value, version FROM state WHERE ns = ? AND key = ?"#)
        .bind(ns)
        .bind(key)
        .fetch_optional(ex)
        .await?;

    Ok(row.map(|r| (r.get::<Vec<u8>, _>(0), r.get::<i64, _>(1))))
}

pub async fn current_version(conn: &mut SqliteConnection, ns: &str, key: &str) -> Result<Option<i64>, LedgerError> {
    let row = sqlx::query(r#"SELECT version FROM state WHERE ns = ? AND key = ?"#)
        .bind(ns)
        .bind(key)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|r| r.get::<i64, _>(0)))
}

/// Advance the chain by one block and return the new height.
///
/// Being the first statement of a commit, this also takes the database write lock, so commits
/// are strictly serialized in height order.
pub async fn bump_height(conn: &mut SqliteConnection) -> Result<u64, LedgerError> {
    let row = sqlx::query(r#"UPDATE chain_info SET height = height + 1 WHERE id = 0 RETURNING height"#)
        .fetch_one(conn)
        .await?;
    let height: i64 = row.get(0);
    Ok(height as u64)
}

pub async fn chain_height(db: &Db) -> Result<u64, LedgerError> {
    let row = sqlx::query(r#"SELECT height FROM chain_info WHERE id = 0"#)
        .fetch_one(db)
        .await?;
    let height: i64 = row.get(0);
    Ok(height as u64)
}

/// Create a key at version 1. An existing key is a conflict, never an overwrite.
pub async fn insert_value(conn: &mut SqliteConnection, ns: &str, key: &str, value: &[u8]) -> Result<(), LedgerError> {
    let res = sqlx::query(r#"INSERT INTO state (ns, key, value, version) VALUES (?, ?, ?, 1)"#)
        .bind(ns)
        .bind(key)
        .bind(value)
        .execute(conn)
        .await;

    match res {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(LedgerError::Conflict(format!("{ns}/{key}"))),
        Err(e) => Err(e.into()),
    }
}

/// Replace a key's value if it is still at `expected_version`.
pub async fn update_value(
    conn: &mut SqliteConnection,
    ns: &str,
    key: &str,
    value: &[u8],
    expected_version: i64,
) -> Result<(), LedgerError> {
    let res = sqlx::query(r#"UPDATE state SET value = ?, version = version + 1 WHERE ns = ? AND key = ? AND version = ?"#)
        .bind(value)
        .bind(ns)
        .bind(key)
        .bind(expected_version)
        .execute(conn)
        .await?;

    if res.rows_affected() != 1 {
        return Err(LedgerError::Conflict(format!("{ns}/{key}")));
    }
    Ok(())
}

pub async fn insert_transaction(
    conn: &mut SqliteConnection,
    tx_id: Uuid,
    height: u64,
    function: &str,
    creator_msp: &str,
    creator_id: &str,
    timestamp: DateTime<Utc>,
) -> Result<(), LedgerError> {
    sqlx::query(
        r#"INSERT INTO transactions (tx_id, height, function, creator_msp, creator_id, timestamp)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(tx_id.to_string())
    .bind(height as i64)
    .bind(function)
    .bind(creator_msp)
    .bind(creator_id)
    .bind(timestamp.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) async fn memory_db() -> Db {
    // A single connection: every pooled connection to `:memory:` would be its own database.
    let db = connect("sqlite::memory:", 1).await.unwrap();
    init_schema(&db).await.unwrap();
    db
}
