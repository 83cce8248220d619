use serde::Serialize;

use rollcall_core::client::{PaymentOutcome, SweepReport};
use rollcall_core::error::EnrollmentError;
use rollcall_core::types::{OfferingStatus, WaitlistEntry};

// ─── Validation Constants ───────────────────────────────────────────────────

const VALID_STATUSES: &[&str] = &[
    "draft", "pending_approval", "published", "confirmed", "cancelled", "finished",
];

// ─── Validation Helpers ─────────────────────────────────────────────────────

pub fn parse_status(status: &str) -> Result<OfferingStatus, String> {
    OfferingStatus::parse(&status.to_lowercase()).ok_or_else(|| {
        format!(
            "Invalid status '{}'. Must be one of: {}",
            status,
            VALID_STATUSES.join(", ")
        )
    })
}

pub fn payment_outcome(declined: bool) -> PaymentOutcome {
    if declined {
        PaymentOutcome::Declined
    } else {
        PaymentOutcome::Approved
    }
}

pub fn validate_id(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", field));
    }
    Ok(())
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable failure code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
            code: Some("INVALID_REQUEST"),
        }
    }

    pub fn from_error(err: &EnrollmentError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            code: Some(err.code()),
        }
    }
}

#[derive(Serialize)]
pub struct SeatsResponse {
    pub offering_id: String,
    pub available_seats: u32,
}

#[derive(Serialize)]
pub struct ConflictsResponse {
    pub learner_id: String,
    pub offering_id: String,
    pub has_conflict: bool,
    pub conflicting: Vec<String>,
}

#[derive(Serialize)]
pub struct WaitlistJoinResponse {
    pub entry: WaitlistEntry,
    pub position: Option<usize>,
}

#[derive(Serialize)]
pub struct SweepResponse {
    pub expired_payments: SweepReport,
    pub reminders: SweepReport,
}
