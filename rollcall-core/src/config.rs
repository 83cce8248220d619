use serde::Deserialize;

use crate::types::{ConflictPolicy, HOUR_MS, MINUTE_MS, OfferingKind};

pub const DEFAULT_PAYMENT_GRACE_MS: u64 = 30 * MINUTE_MS;
pub const DEFAULT_CANCELLATION_NOTICE_MS: u64 = 24 * HOUR_MS;
pub const DEFAULT_MIN_ATTENDANCE_PERCENT: u32 = 80;
pub const DEFAULT_REMINDER_LEAD_MS: u64 = 24 * HOUR_MS;
pub const DEFAULT_FINAL_REMINDER_LEAD_MS: u64 = HOUR_MS;

/// Tunables for the enrollment rules. Every field falls back to its default when omitted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistrarConfig {
    /// How long a pending enrollment may wait for payment before the sweep cancels it
    pub payment_grace_ms: u64,
    /// Learners may cancel up to this long before the offering starts
    pub cancellation_notice_ms: u64,
    pub min_attendance_percent: u32,
    pub workshop_conflicts: ConflictPolicy,
    pub course_conflicts: ConflictPolicy,
    pub reminder_lead_ms: u64,
    pub final_reminder_lead_ms: u64,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            payment_grace_ms: DEFAULT_PAYMENT_GRACE_MS,
            cancellation_notice_ms: DEFAULT_CANCELLATION_NOTICE_MS,
            min_attendance_percent: DEFAULT_MIN_ATTENDANCE_PERCENT,
            workshop_conflicts: ConflictPolicy::Advisory,
            course_conflicts: ConflictPolicy::Blocking,
            reminder_lead_ms: DEFAULT_REMINDER_LEAD_MS,
            final_reminder_lead_ms: DEFAULT_FINAL_REMINDER_LEAD_MS,
        }
    }
}

impl RegistrarConfig {
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    pub fn conflict_policy(&self, kind: OfferingKind) -> ConflictPolicy {
        match kind {
            OfferingKind::Workshop => self.workshop_conflicts,
            OfferingKind::Course => self.course_conflicts,
        }
    }
}
