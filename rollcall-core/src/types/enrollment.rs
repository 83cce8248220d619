use serde::{Deserialize, Serialize};

use super::{EnrollmentId, LearnerId, OfferingId};

/// Lifecycle states of an enrollment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentState {
    /// Seat held, waiting for the payment provider
    PendingPayment,
    /// Seat held and paid (or free)
    Confirmed,
    Cancelled,
    /// Offering finished with enough attendance
    Completed,
}

impl EnrollmentState {
    /// Active enrollments hold a seat.
    pub fn is_active(self) -> bool {
        matches!(self, EnrollmentState::PendingPayment | EnrollmentState::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EnrollmentState::Cancelled | EnrollmentState::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentState::PendingPayment => "pending_payment",
            EnrollmentState::Confirmed => "confirmed",
            EnrollmentState::Cancelled => "cancelled",
            EnrollmentState::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_payment" => Some(EnrollmentState::PendingPayment),
            "confirmed" => Some(EnrollmentState::Confirmed),
            "cancelled" => Some(EnrollmentState::Cancelled),
            "completed" => Some(EnrollmentState::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for EnrollmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A learner's claim on an offering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub learner_id: LearnerId,
    pub offering_id: OfferingId,
    pub state: EnrollmentState,
    pub created_at: u64,
    pub updated_at: u64,
    pub reminder_24h_sent: bool,
    pub reminder_1h_sent: bool,
}

impl Enrollment {
    pub fn new(
        id: EnrollmentId,
        learner_id: LearnerId,
        offering_id: OfferingId,
        state: EnrollmentState,
        now: u64,
    ) -> Self {
        Self {
            id,
            learner_id,
            offering_id,
            state,
            created_at: now,
            updated_at: now,
            reminder_24h_sent: false,
            reminder_1h_sent: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

/// Attendance tally used to decide completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendance {
    pub attended: u32,
    pub sessions: u32,
}

impl Attendance {
    pub fn new(attended: u32, sessions: u32) -> Self {
        Self { attended, sessions }
    }

    /// Percentage attended, rounded down. Zero when no sessions were held.
    pub fn percent(&self) -> u32 {
        if self.sessions == 0 {
            return 0;
        }
        (u64::from(self.attended.min(self.sessions)) * 100 / u64::from(self.sessions)) as u32
    }

    /// Exact comparison, avoids the rounding in `percent`.
    pub fn meets(&self, min_percent: u32) -> bool {
        if self.sessions == 0 {
            return min_percent == 0;
        }
        u64::from(self.attended.min(self.sessions)) * 100
            >= u64::from(min_percent) * u64::from(self.sessions)
    }
}
