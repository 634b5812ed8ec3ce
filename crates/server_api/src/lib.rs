use std::sync::Arc;

use shared::{
    domain::{Attendance, AttendeeId, GigId},
    error::{ApiError, ErrorCode},
    protocol::AttendanceDto,
};
use storage::UnitOfWorkProvider;
use thiserror::Error;
use tracing::{debug, info};

pub mod session;

#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn UnitOfWorkProvider>,
}

impl ApiContext {
    pub fn new(store: impl UnitOfWorkProvider + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("The attendance already exists.")]
    DuplicateAttendance,
    #[error("attendance not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl AttendanceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::DuplicateAttendance => ErrorCode::DuplicateAttendance,
            Self::NotFound => ErrorCode::NotFound,
            Self::Storage(_) => ErrorCode::Internal,
        }
    }
}

/// Storage causes stay in the logs; clients only see a fixed message.
impl From<AttendanceError> for ApiError {
    fn from(value: AttendanceError) -> Self {
        match value {
            AttendanceError::Storage(_) => ApiError::new(ErrorCode::Internal, "internal error"),
            other => ApiError::new(other.code(), other.to_string()),
        }
    }
}

/// Records that `attendee_id` attends the gig named in `dto`.
///
/// Fails with [`AttendanceError::DuplicateAttendance`] if the pair already
/// exists, in which case nothing is committed.
pub async fn attend(
    ctx: &ApiContext,
    attendee_id: &AttendeeId,
    dto: &AttendanceDto,
) -> Result<(), AttendanceError> {
    let gig_id = dto.gig_id;
    let mut uow = ctx.store.begin().await?;

    if uow
        .attendances()
        .get_attendance(gig_id, attendee_id)
        .await?
        .is_some()
    {
        debug!(%gig_id, %attendee_id, "attendance already exists");
        return Err(AttendanceError::DuplicateAttendance);
    }

    let attendance = Attendance::new(gig_id, attendee_id.clone());
    // The store may still see the pair if another request committed it first.
    if !uow.attendances().add(&attendance).await? {
        debug!(%gig_id, %attendee_id, "attendance inserted concurrently");
        return Err(AttendanceError::DuplicateAttendance);
    }
    uow.complete().await?;

    info!(%gig_id, %attendee_id, "attendance created");
    Ok(())
}

/// Removes the caller's attendance at `gig_id` and echoes the gig id back.
pub async fn delete_attendance(
    ctx: &ApiContext,
    attendee_id: &AttendeeId,
    gig_id: GigId,
) -> Result<GigId, AttendanceError> {
    let mut uow = ctx.store.begin().await?;

    let Some(attendance) = uow
        .attendances()
        .get_attendance(gig_id, attendee_id)
        .await?
    else {
        debug!(%gig_id, %attendee_id, "no attendance to delete");
        return Err(AttendanceError::NotFound);
    };

    uow.attendances().remove(&attendance).await?;
    uow.complete().await?;

    info!(%gig_id, %attendee_id, "attendance deleted");
    Ok(attendance.gig_id)
}

pub async fn list_attendances(
    ctx: &ApiContext,
    attendee_id: &AttendeeId,
) -> Result<Vec<Attendance>, AttendanceError> {
    let mut uow = ctx.store.begin().await?;
    let attendances = uow.attendances().list_for_attendee(attendee_id).await?;
    Ok(attendances)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
