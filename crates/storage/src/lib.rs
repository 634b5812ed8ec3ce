use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
use std::{fs, path::Path, str::FromStr, time::Duration};

use shared::domain::{Attendance, AttendeeId, GigId};

mod attendances;
pub mod memory;

pub use attendances::SqliteUnitOfWork;
pub use memory::{InMemoryStore, InMemoryUnitOfWork};

/// Lookup and mutation of attendance records inside one unit of work.
#[async_trait]
pub trait AttendanceRepository: Send {
    async fn get_attendance(
        &mut self,
        gig_id: GigId,
        attendee_id: &AttendeeId,
    ) -> Result<Option<Attendance>>;

    /// Every attendance of `attendee_id`, ordered by gig id.
    async fn list_for_attendee(&mut self, attendee_id: &AttendeeId) -> Result<Vec<Attendance>>;

    /// Returns `false` when the (gig, attendee) pair is already stored.
    async fn add(&mut self, attendance: &Attendance) -> Result<bool>;

    /// Returns `false` when there was nothing to remove.
    async fn remove(&mut self, attendance: &Attendance) -> Result<bool>;
}

/// Transactional boundary over the repositories.
///
/// Changes become visible to other units of work only after [`UnitOfWork::complete`].
/// Dropping a unit of work without completing it discards its changes.
#[async_trait]
pub trait UnitOfWork: Send {
    fn attendances(&mut self) -> &mut dyn AttendanceRepository;

    async fn complete(&mut self) -> Result<()>;
}

#[async_trait]
pub trait UnitOfWorkProvider: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;

    async fn health_check(&self) -> Result<()>;
}

/// Write lock wait before a unit of work gives up with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);

        // Shared-cache memory databases answer a contended `BEGIN IMMEDIATE`
        // with SQLITE_LOCKED, which the busy timeout does not cover.
        let max_connections = if is_memory_url(database_url) {
            1
        } else {
            create_database_dir(connect_options.get_filename())?;
            5
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl UnitOfWorkProvider for Storage {
    /// Units of work take the write lock up front, so a look-up followed by
    /// an insert cannot interleave with another unit of work.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .context("failed to open attendance transaction")?;
        Ok(Box::new(SqliteUnitOfWork::new(tx)))
    }

    async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn create_database_dir(db_file: &Path) -> Result<()> {
    match db_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
            .with_context(|| format!("cannot create database directory {}", dir.display())),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
