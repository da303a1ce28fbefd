//! Handle to the SQLite event store.
//!
//! The connection is opened and migrated on the calling thread, then handed to
//! a single worker thread that runs jobs in submission order. Handles are cheap
//! clones of the job sender. When the last one goes away the job channel
//! disconnects and the worker finishes on its own; nothing ever waits for it,
//! so dropping a handle inside an async task never stalls the runtime.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread,
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

#[derive(Clone)]
pub struct Database {
    jobs: mpsc::Sender<Job>,
    path: Arc<PathBuf>,
}

impl Database {
    pub fn new(path: PathBuf) -> Result<Self> {
        let conn = open_store(&path)?;
        let (jobs, pending) = mpsc::channel::<Job>();

        thread::Builder::new()
            .name("daytrace-db".into())
            .spawn(move || run_jobs(conn, pending))
            .context("could not start the event store worker")?;

        log_info!("Event store ready at {}", path.display());
        Ok(Self {
            jobs,
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `task` against the connection on the worker thread.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, outcome) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            // caller gave up waiting; the result is simply discarded
            let _ = reply.send(task(conn));
        });

        self.jobs
            .send(job)
            .map_err(|_| anyhow!("event store worker for {} has stopped", self.path.display()))?;

        outcome
            .await
            .map_err(|_| anyhow!("event store worker stopped before answering"))?
    }
}

fn open_store(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("could not create store directory {}", dir.display()))?;
    }

    let mut conn = Connection::open(path)
        .with_context(|| format!("could not open event store {}", path.display()))?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("could not set busy timeout")?;

    // WAL is best effort; some filesystems refuse it
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        log_warn!("event store stays in rollback journal mode: {err}");
    }

    run_migrations(&mut conn)
        .with_context(|| format!("could not migrate event store {}", path.display()))?;
    Ok(conn)
}

fn run_jobs(mut conn: Connection, pending: mpsc::Receiver<Job>) {
    for job in pending {
        job(&mut conn);
    }
    log_debug!("event store worker exiting: no handles left");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_creates_directories_and_runs_queries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("events.db");
        let db = Database::new(path.clone()).unwrap();
        assert_eq!(db.path(), path.as_path());

        let tables: i64 = db
            .execute(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                     AND name IN ('activity_events', 'projects')",
                    [],
                    |row| row.get(0),
                )?)
            })
            .await
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[tokio::test]
    async fn job_errors_reach_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("events.db")).unwrap();
        let result: Result<()> = db
            .execute(|conn| {
                conn.execute("SELECT * FROM missing_table", [])?;
                Ok(())
            })
            .await;
        assert!(result.is_err());

        // the worker survives a failed job
        let one: i64 = db
            .execute(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(one, 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn last_handle_can_be_dropped_inside_a_task() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");
        let db = Database::new(path.clone()).unwrap();
        db.add_project("Kept").await.unwrap();

        // on a single-threaded runtime a blocking drop would hang this await
        let dropped = tokio::spawn(async move { drop(db) });
        tokio::time::timeout(Duration::from_secs(5), dropped)
            .await
            .expect("dropping the handle blocked the runtime")
            .unwrap();

        let reopened = Database::new(path).unwrap();
        assert_eq!(reopened.list_projects().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unopenable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be opened as a database file
        assert!(Database::new(dir.path().to_path_buf()).is_err());
    }
}
