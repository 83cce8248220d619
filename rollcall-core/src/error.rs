use thiserror::Error;

use crate::types::{EnrollmentState, OfferingId};

pub type Result<T> = std::result::Result<T, EnrollmentError>;

/// Failures raised by a storage backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt {table} row {id}: {detail}")]
    Corrupt {
        table: &'static str,
        id: String,
        detail: String,
    },
    #[error("no transaction in progress")]
    NoTransaction,
    #[error("transaction already in progress")]
    NestedTransaction,
}

/// Every way an enrollment operation can be refused. None of these leave partial writes behind.
#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error("offering {offering_id} is full ({capacity} seats)")]
    CapacityExceeded { offering_id: OfferingId, capacity: u32 },

    #[error("learner {learner_id} already holds an active enrollment on {offering_id}")]
    DuplicateEnrollment {
        learner_id: String,
        offering_id: OfferingId,
    },

    #[error("cannot {event} an enrollment that is {from}")]
    InvalidTransition {
        from: EnrollmentState,
        event: &'static str,
    },

    #[error("learner {learner_id} is already on the waitlist for {offering_id}")]
    AlreadyQueued {
        learner_id: String,
        offering_id: OfferingId,
    },

    #[error("offering {offering_id} still has {available} free seats, enroll directly")]
    SeatsAvailable { offering_id: OfferingId, available: u32 },

    #[error("schedule overlaps with {}", .conflicting.join(", "))]
    ScheduleConflict { conflicting: Vec<OfferingId> },

    #[error("offering {offering_id} is not open for enrollment: {reason}")]
    OfferingNotEnrollable {
        offering_id: OfferingId,
        reason: String,
    },

    #[error("cancellation deadline passed at {deadline}")]
    CancellationDeadlinePassed { deadline: u64 },

    #[error("payment of {received} does not match price {expected}")]
    PaymentMismatch { expected: u64, received: u64 },

    #[error("payment grace window still open for {remaining_ms} ms")]
    GraceWindowOpen { remaining_ms: u64 },

    #[error("offering {offering_id} has not finished yet")]
    OfferingNotFinished { offering_id: OfferingId },

    #[error("attendance {percent}% is below the required {required}%")]
    AttendanceBelowThreshold { percent: u32, required: u32 },

    #[error("invalid offering: {0}")]
    InvalidOffering(String),

    #[error("offering {offering_id} is locked: {reason}")]
    OfferingLocked {
        offering_id: OfferingId,
        reason: String,
    },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EnrollmentError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        EnrollmentError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Stable machine-readable code, used by the CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            EnrollmentError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            EnrollmentError::DuplicateEnrollment { .. } => "DUPLICATE_ENROLLMENT",
            EnrollmentError::InvalidTransition { .. } => "INVALID_TRANSITION",
            EnrollmentError::AlreadyQueued { .. } => "ALREADY_QUEUED",
            EnrollmentError::SeatsAvailable { .. } => "SEATS_AVAILABLE",
            EnrollmentError::ScheduleConflict { .. } => "SCHEDULE_CONFLICT",
            EnrollmentError::OfferingNotEnrollable { .. } => "OFFERING_NOT_ENROLLABLE",
            EnrollmentError::CancellationDeadlinePassed { .. } => "CANCELLATION_DEADLINE_PASSED",
            EnrollmentError::PaymentMismatch { .. } => "PAYMENT_MISMATCH",
            EnrollmentError::GraceWindowOpen { .. } => "GRACE_WINDOW_OPEN",
            EnrollmentError::OfferingNotFinished { .. } => "OFFERING_NOT_FINISHED",
            EnrollmentError::AttendanceBelowThreshold { .. } => "ATTENDANCE_BELOW_THRESHOLD",
            EnrollmentError::InvalidOffering(_) => "INVALID_OFFERING",
            EnrollmentError::OfferingLocked { .. } => "OFFERING_LOCKED",
            EnrollmentError::NotFound { .. } => "NOT_FOUND",
            EnrollmentError::Store(_) => "STORE_ERROR",
        }
    }
}
