//! Scan history persistence. A single SQLite connection lives on a
//! dedicated worker thread; async callers hand it closures over an mpsc
//! channel and await the reply on a oneshot, so the connection never crosses
//! threads and the caller never blocks the runtime.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection};
use tokio::sync::oneshot;

mod migrations;

use crate::models::ScanRecord;
use migrations::run_migrations;

/// History keeps only the most recent entries.
pub const HISTORY_CAP: usize = 50;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("langdu-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(
                            Err(anyhow::Error::new(err).context("failed to open SQLite database")),
                        );
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Scan history database initialized at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    /// Insert a scan, then prune history down to the newest [`HISTORY_CAP`].
    pub async fn insert_scan(&self, scan: &ScanRecord) -> Result<()> {
        let record = scan.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO scans (id, captured_at, image_data_url, text)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id,
                    record.captured_at.to_rfc3339(),
                    record.image_data_url,
                    record.text,
                ],
            )
            .with_context(|| "failed to insert scan")?;

            conn.execute(
                "DELETE FROM scans WHERE id NOT IN (
                     SELECT id FROM scans ORDER BY captured_at DESC LIMIT ?1
                 )",
                params![HISTORY_CAP as i64],
            )
            .with_context(|| "failed to prune scan history")?;

            Ok(())
        })
        .await
    }

    /// All retained scans, newest first.
    pub async fn list_scans(&self) -> Result<Vec<ScanRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, captured_at, image_data_url, text
                 FROM scans
                 ORDER BY captured_at DESC",
            )?;

            let mut rows = stmt.query([])?;
            let mut scans = Vec::new();
            while let Some(row) = rows.next()? {
                scans.push(ScanRecord {
                    id: row.get(0)?,
                    captured_at: parse_datetime(&row.get::<_, String>(1)?)?,
                    image_data_url: row.get(2)?,
                    text: row.get(3)?,
                });
            }

            Ok(scans)
        })
        .await
    }

    /// Delete one scan by id. Returns whether a row was removed.
    pub async fn delete_scan(&self, scan_id: &str) -> Result<bool> {
        let scan_id = scan_id.to_string();
        self.execute(move |conn| {
            let deleted = conn
                .execute("DELETE FROM scans WHERE id = ?1", params![scan_id])
                .with_context(|| "failed to delete scan")?;
            Ok(deleted > 0)
        })
        .await
    }

    pub async fn clear_scans(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute("DELETE FROM scans", [])
                .with_context(|| "failed to clear scan history")?;
            Ok(())
        })
        .await
    }
}
