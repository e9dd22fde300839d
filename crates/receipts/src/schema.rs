//! Table layout of the receipt database

use mia_errors::{Error, ReceiptError};
use sqlx::{query, SqliteConnection};

const CREATE_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS paths (
        path_key INTEGER PRIMARY KEY AUTOINCREMENT,
        path VARCHAR NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS pkgs (
        pkg_key INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp INTEGER NOT NULL,
        owner INTEGER NOT NULL,
        pkgid VARCHAR NOT NULL,
        vers VARCHAR NOT NULL,
        ppath VARCHAR NOT NULL,
        pkgname VARCHAR NOT NULL,
        replaces INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS pkgs_paths (
        pkg_key INTEGER NOT NULL,
        path_key INTEGER NOT NULL,
        uid INTEGER,
        gid INTEGER,
        perms INTEGER
    )",
    "CREATE INDEX IF NOT EXISTS idx_pkgs_paths_path_key ON pkgs_paths (path_key)",
    "CREATE INDEX IF NOT EXISTS idx_pkgs_paths_pkg_key ON pkgs_paths (pkg_key)",
    "CREATE INDEX IF NOT EXISTS idx_pkgs_pkgid ON pkgs (pkgid)",
];

const DROP_TABLES: &[&str] = &[
    "DROP TABLE IF EXISTS pkgs_paths",
    "DROP TABLE IF EXISTS pkgs",
    "DROP TABLE IF EXISTS paths",
];

async fn apply(conn: &mut SqliteConnection, statements: &[&str]) -> Result<(), Error> {
    for statement in statements {
        query(statement).execute(&mut *conn).await.map_err(|e| {
            Error::from(ReceiptError::SchemaFailed {
                message: e.to_string(),
            })
        })?;
    }
    Ok(())
}

/// Create any missing tables
///
/// # Errors
///
/// Returns `ReceiptError::SchemaFailed` if a statement fails.
pub async fn create(conn: &mut SqliteConnection) -> Result<(), Error> {
    apply(conn, CREATE_TABLES).await
}

/// Drop and recreate every table
///
/// # Errors
///
/// Returns `ReceiptError::SchemaFailed` if a statement fails.
pub async fn reset(conn: &mut SqliteConnection) -> Result<(), Error> {
    apply(conn, DROP_TABLES).await?;
    apply(conn, CREATE_TABLES).await
}
