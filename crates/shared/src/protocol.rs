use serde::{Deserialize, Serialize};

use crate::domain::GigId;

/// Body of an attend request. The attendee always comes from the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceDto {
    #[serde(rename = "gigId", alias = "GigId", alias = "gig_id")]
    pub gig_id: GigId,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
