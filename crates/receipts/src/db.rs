//! The receipt database handle

use futures::StreamExt;
use mia_errors::{Error, ReceiptError};
use mia_events::{AppEvent, EventEmitter, EventSender, FailureContext, ReceiptsEvent};
use mia_platform::PackageRegistry;
use sqlx::{Pool, Row, Sqlite};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::rebuild::{self, ImportedPackage};
use crate::{create_pool, queries, schema};

/// Where the database lives and what it is compared against
#[derive(Debug, Clone)]
pub struct ReceiptDbOptions {
    pub db_path: PathBuf,
    pub install_history: PathBuf,
    pub receipts_dir: PathBuf,
    /// Registry reads in flight during a rebuild
    pub import_concurrency: usize,
}

/// Package-to-path ownership records mirrored from the OS registry
pub struct ReceiptDb {
    pool: Pool<Sqlite>,
    options: ReceiptDbOptions,
    registry: Arc<dyn PackageRegistry>,
    tx: EventSender,
}

impl EventEmitter for ReceiptDb {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(&self.tx)
    }
}

impl ReceiptDb {
    /// Whether the database must be rebuilt before it can be trusted
    pub async fn needs_rebuild(options: &ReceiptDbOptions) -> bool {
        rebuild::is_stale(
            &options.db_path,
            &options.install_history,
            &options.receipts_dir,
        )
        .await
    }

    /// Open the database, rebuilding it first when stale or when `force` is set
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the rebuild fails.
    /// A cancelled rebuild removes the partial database and returns
    /// `ReceiptError::RebuildCancelled`.
    pub async fn open(
        options: ReceiptDbOptions,
        registry: Arc<dyn PackageRegistry>,
        tx: EventSender,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<Self, Error> {
        // Checked before the pool exists; connecting creates the file
        let stale = Self::needs_rebuild(&options).await;

        if let Some(parent) = options.db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }
        let pool = create_pool(&options.db_path).await?;
        let mut conn = pool.acquire().await?;
        schema::create(&mut conn).await?;
        drop(conn);

        let db = Self {
            pool,
            options,
            registry,
            tx,
        };
        if stale || force {
            db.rebuild(force, cancel).await?;
        }
        Ok(db)
    }

    /// Drop every table and re-import all packages known to the OS registry
    ///
    /// Registry reads run concurrently; all writes go through one writer task
    /// holding a single transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be listed or a write fails. On
    /// cancellation the database files are deleted and this handle must not
    /// be used again.
    pub async fn rebuild(&self, forced: bool, cancel: &CancellationToken) -> Result<usize, Error> {
        self.emit(AppEvent::Receipts(ReceiptsEvent::RebuildStarted { forced }));
        let start = Instant::now();

        match self.import_all(cancel).await {
            Ok(packages) => {
                self.checkpoint().await;
                self.emit(AppEvent::Receipts(ReceiptsEvent::RebuildCompleted {
                    packages,
                    duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                }));
                Ok(packages)
            }
            Err(err) => {
                let failure = match &err {
                    Error::Receipt(receipt) => FailureContext::from_error(receipt),
                    other => FailureContext::new(None::<String>, other.to_string(), None::<String>, false),
                };
                self.emit(AppEvent::Receipts(ReceiptsEvent::RebuildFailed { failure }));
                if matches!(err, Error::Receipt(ReceiptError::RebuildCancelled)) {
                    self.pool.close().await;
                    rebuild::remove_database_files(&self.options.db_path).await?;
                }
                Err(err)
            }
        }
    }

    async fn import_all(&self, cancel: &CancellationToken) -> Result<usize, Error> {
        let package_ids = self.registry.list_packages().await.map_err(|e| {
            Error::from(ReceiptError::RegistryQueryFailed {
                package: "*".to_string(),
                message: e.to_string(),
            })
        })?;

        let concurrency = self.options.import_concurrency.max(1);
        let (sender, receiver) = mpsc::channel::<ImportedPackage>(concurrency * 2);
        let writer = tokio::spawn(rebuild::write_receipts(self.pool.clone(), receiver));

        let imports =
            rebuild::import_stream(Arc::clone(&self.registry), package_ids, concurrency);
        tokio::pin!(imports);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    drop(sender);
                    writer.abort();
                    let _ = writer.await;
                    return Err(ReceiptError::RebuildCancelled.into());
                }
                next = imports.next() => {
                    let Some(package) = next else { break };
                    self.emit(AppEvent::Receipts(ReceiptsEvent::PackageImported {
                        package_id: package.info.package_id.clone(),
                        paths: package.files.len(),
                    }));
                    if sender.send(package).await.is_err() {
                        // Writer stopped early; its error is reported below
                        break;
                    }
                }
            }
        }
        drop(sender);

        writer.await.map_err(|e| {
            Error::from(ReceiptError::RebuildFailed {
                message: e.to_string(),
            })
        })?
    }

    /// Keys for the named packages; every name must be known
    ///
    /// # Errors
    ///
    /// Returns `UninstallError::PackageNotInDatabase` when any name is
    /// unknown, or a database error.
    pub async fn package_keys(&self, names: &[String]) -> Result<Vec<i64>, Error> {
        queries::package_keys(&self.pool, names).await
    }

    /// Paths owned by the given packages and by nothing else
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn paths_owned_only_by(&self, keys: &[i64]) -> Result<Vec<String>, Error> {
        queries::paths_owned_only_by(&self.pool, keys).await
    }

    /// Delete package rows; returns the identifiers that were removed
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn forget(&self, keys: &[i64]) -> Result<Vec<String>, Error> {
        let identifiers = queries::delete_packages(&self.pool, keys).await?;
        self.emit(AppEvent::Receipts(ReceiptsEvent::PackagesForgotten {
            packages: identifiers.clone(),
        }));
        Ok(identifiers)
    }

    /// Delete path rows that no package references
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn prune_orphaned_paths(&self) -> Result<u64, Error> {
        let paths = queries::prune_orphaned_paths(&self.pool).await?;
        self.emit(AppEvent::Receipts(ReceiptsEvent::OrphansPruned { paths }));
        Ok(paths)
    }

    /// Forget the packages here and, unless suppressed, in the OS registry,
    /// then prune orphaned paths once
    ///
    /// Registry failures are reported as warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if a database write fails.
    pub async fn remove_receipts(
        &self,
        keys: &[i64],
        suppress_registry_forget: bool,
    ) -> Result<(), Error> {
        let identifiers = self.forget(keys).await?;
        if !suppress_registry_forget {
            for identifier in &identifiers {
                if let Err(e) = self.registry.forget(identifier).await {
                    self.emit_warning_with_context(
                        format!("could not forget {identifier} in the package registry"),
                        e.to_string(),
                    );
                }
            }
        }
        self.prune_orphaned_paths().await?;
        self.checkpoint().await;
        Ok(())
    }

    /// Fold the WAL into the main file
    ///
    /// Staleness is judged by the main file's mtime, which only moves when
    /// pages are checkpointed into it.
    async fn checkpoint(&self) {
        match sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .fetch_one(&self.pool)
            .await
        {
            Ok(row) => {
                let busy: i64 = row.try_get(0).unwrap_or_default();
                if busy != 0 {
                    warn!(
                        db = %self.options.db_path.display(),
                        "WAL checkpoint did not complete"
                    );
                }
            }
            Err(e) => warn!(
                db = %self.options.db_path.display(),
                error = %e,
                "WAL checkpoint failed"
            ),
        }
    }

    /// Number of package rows
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn package_count(&self) -> Result<i64, Error> {
        queries::package_count(&self.pool).await
    }

    /// Number of path rows
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn path_count(&self) -> Result<i64, Error> {
        queries::path_count(&self.pool).await
    }
}
