//! In-process attendance store.
//!
//! A unit of work holds the store lock from `begin` until it is dropped, so
//! look-up-then-act sequences never interleave. Changes are staged on a
//! working copy and published by `complete`.

use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use shared::domain::{Attendance, AttendeeId, GigId};

use crate::{AttendanceRepository, UnitOfWork, UnitOfWorkProvider};

#[derive(Clone, Default)]
pub struct InMemoryStore {
    records: Arc<Mutex<BTreeSet<Attendance>>>,
    commits: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attendances(attendances: impl IntoIterator<Item = Attendance>) -> Self {
        Self {
            records: Arc::new(Mutex::new(attendances.into_iter().collect())),
            commits: Arc::default(),
        }
    }

    /// Committed records, ordered by gig id then attendee.
    pub async fn snapshot(&self) -> Vec<Attendance> {
        self.records.lock().await.iter().cloned().collect()
    }

    /// Number of units of work that reached `complete`.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UnitOfWorkProvider for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = Arc::clone(&self.records).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryUnitOfWork {
            guard,
            working,
            commits: Arc::clone(&self.commits),
            completed: false,
        }))
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<BTreeSet<Attendance>>,
    working: BTreeSet<Attendance>,
    commits: Arc<AtomicUsize>,
    completed: bool,
}

impl InMemoryUnitOfWork {
    fn ensure_open(&self) -> Result<()> {
        if self.completed {
            bail!("attendance unit of work already completed");
        }
        Ok(())
    }
}

#[async_trait]
impl AttendanceRepository for InMemoryUnitOfWork {
    async fn get_attendance(
        &mut self,
        gig_id: GigId,
        attendee_id: &AttendeeId,
    ) -> Result<Option<Attendance>> {
        self.ensure_open()?;
        Ok(self
            .working
            .get(&Attendance::new(gig_id, attendee_id.clone()))
            .cloned())
    }

    async fn list_for_attendee(&mut self, attendee_id: &AttendeeId) -> Result<Vec<Attendance>> {
        self.ensure_open()?;
        Ok(self
            .working
            .iter()
            .filter(|a| &a.attendee_id == attendee_id)
            .cloned()
            .collect())
    }

    async fn add(&mut self, attendance: &Attendance) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.working.insert(attendance.clone()))
    }

    async fn remove(&mut self, attendance: &Attendance) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.working.remove(attendance))
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    fn attendances(&mut self) -> &mut dyn AttendanceRepository {
        self
    }

    async fn complete(&mut self) -> Result<()> {
        self.ensure_open()?;
        *self.guard = std::mem::take(&mut self.working);
        self.completed = true;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/memory_tests.rs"]
mod tests;
