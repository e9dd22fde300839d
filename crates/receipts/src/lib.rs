#![warn(mismatched_lifetime_syntaxes)]
#![deny(clippy::pedantic, unsafe_code)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc
)]
#![allow(clippy::module_name_repetitions)]

//! Package receipt database for mia
//!
//! A `SQLite` mirror of the OS package registry mapping every registered
//! package to the filesystem paths it installed. Removal uses it to find the
//! paths owned *only* by the packages being removed.

pub mod db;
pub mod queries;
pub mod rebuild;
pub mod schema;

pub use db::{ReceiptDb, ReceiptDbOptions};
pub use rebuild::{installed_paths, ImportedPackage};

use mia_errors::{Error, ReceiptError};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;

/// Open (creating if needed) the receipt database file
///
/// The pool is small: the rebuild writer holds one connection for its
/// transaction and removals query one at a time.
pub async fn create_pool(db_path: &Path) -> Result<Pool<Sqlite>, Error> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .pragma("temp_store", "MEMORY")
        .busy_timeout(Duration::from_secs(30));

    SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await
        .map_err(|e| {
            ReceiptError::DatabaseError {
                message: format!("{}: {e}", db_path.display()),
            }
            .into()
        })
}
