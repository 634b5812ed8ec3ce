use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, Sqlite, Transaction};

use shared::domain::{Attendance, AttendeeId, GigId};

use crate::{AttendanceRepository, UnitOfWork};

/// Unit of work backed by a single SQLite transaction.
pub struct SqliteUnitOfWork {
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteUnitOfWork {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self { tx: Some(tx) }
    }

    fn tx(&mut self) -> Result<&mut Transaction<'static, Sqlite>> {
        self.tx
            .as_mut()
            .context("attendance unit of work already completed")
    }
}

#[async_trait]
impl AttendanceRepository for SqliteUnitOfWork {
    async fn get_attendance(
        &mut self,
        gig_id: GigId,
        attendee_id: &AttendeeId,
    ) -> Result<Option<Attendance>> {
        let tx = self.tx()?;
        let row = sqlx::query(
            "SELECT gig_id, attendee_id FROM attendances WHERE gig_id = ? AND attendee_id = ?",
        )
        .bind(gig_id.0)
        .bind(attendee_id.as_str())
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map(|r| Attendance {
            gig_id: GigId(r.get::<i64, _>(0)),
            attendee_id: AttendeeId(r.get::<String, _>(1)),
        }))
    }

    async fn list_for_attendee(&mut self, attendee_id: &AttendeeId) -> Result<Vec<Attendance>> {
        let tx = self.tx()?;
        let rows = sqlx::query(
            "SELECT gig_id, attendee_id FROM attendances WHERE attendee_id = ? ORDER BY gig_id ASC",
        )
        .bind(attendee_id.as_str())
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| Attendance {
                gig_id: GigId(r.get::<i64, _>(0)),
                attendee_id: AttendeeId(r.get::<String, _>(1)),
            })
            .collect())
    }

    async fn add(&mut self, attendance: &Attendance) -> Result<bool> {
        let tx = self.tx()?;
        let result = sqlx::query(
            "INSERT INTO attendances (gig_id, attendee_id) VALUES (?, ?)
             ON CONFLICT(gig_id, attendee_id) DO NOTHING",
        )
        .bind(attendance.gig_id.0)
        .bind(attendance.attendee_id.as_str())
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove(&mut self, attendance: &Attendance) -> Result<bool> {
        let tx = self.tx()?;
        let result = sqlx::query("DELETE FROM attendances WHERE gig_id = ? AND attendee_id = ?")
            .bind(attendance.gig_id.0)
            .bind(attendance.attendee_id.as_str())
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    fn attendances(&mut self) -> &mut dyn AttendanceRepository {
        self
    }

    async fn complete(&mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .context("attendance unit of work already completed")?;
        tx.commit()
            .await
            .context("failed to commit attendance transaction")?;
        Ok(())
    }
}
