use serde::{Deserialize, Serialize};

use super::{OfferingId, OfferingKind, WeeklySlot};

/// Publication status of an offering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferingStatus {
    Draft,
    PendingApproval,
    Published,
    /// Minimum capacity reached, offering will run
    Confirmed,
    Cancelled,
    Finished,
}

impl OfferingStatus {
    /// Only published or confirmed offerings take new enrollments.
    pub fn accepts_enrollment(self) -> bool {
        matches!(self, OfferingStatus::Published | OfferingStatus::Confirmed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OfferingStatus::Draft => "draft",
            OfferingStatus::PendingApproval => "pending_approval",
            OfferingStatus::Published => "published",
            OfferingStatus::Confirmed => "confirmed",
            OfferingStatus::Cancelled => "cancelled",
            OfferingStatus::Finished => "finished",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(OfferingStatus::Draft),
            "pending_approval" => Some(OfferingStatus::PendingApproval),
            "published" => Some(OfferingStatus::Published),
            "confirmed" => Some(OfferingStatus::Confirmed),
            "cancelled" => Some(OfferingStatus::Cancelled),
            "finished" => Some(OfferingStatus::Finished),
            _ => None,
        }
    }
}

/// A scheduled instance of a course or workshop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
    pub id: OfferingId,
    pub title: String,
    pub kind: OfferingKind,
    pub status: OfferingStatus,
    /// Start of the calendar span (ms since epoch). For weekly courses this is the term start.
    pub starts_at: u64,
    /// Exclusive end of the calendar span
    pub ends_at: u64,
    /// Set for offerings that meet on the same weekday every week
    #[serde(default)]
    pub weekly: Option<WeeklySlot>,
    pub max_capacity: u32,
    #[serde(default)]
    pub min_capacity: u32,
    /// Price in minor currency units, zero means free
    #[serde(default)]
    pub price: u64,
}

impl Offering {
    /// A published one-off workshop with no minimum and no price.
    pub fn workshop(
        id: impl Into<String>,
        starts_at: u64,
        ends_at: u64,
        max_capacity: u32,
        price: u64,
    ) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            kind: OfferingKind::Workshop,
            status: OfferingStatus::Published,
            starts_at,
            ends_at,
            weekly: None,
            max_capacity,
            min_capacity: 0,
            price,
        }
    }

    /// A published weekly course running over the term `[term_start, term_end)`.
    pub fn course(
        id: impl Into<String>,
        term_start: u64,
        term_end: u64,
        slot: WeeklySlot,
        max_capacity: u32,
        price: u64,
    ) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            kind: OfferingKind::Course,
            status: OfferingStatus::Published,
            starts_at: term_start,
            ends_at: term_end,
            weekly: Some(slot),
            max_capacity,
            min_capacity: 0,
            price,
        }
    }

    pub fn is_free(&self) -> bool {
        self.price == 0
    }

    /// Checks the structural invariants, returning a description of the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("id is required".to_string());
        }
        if self.starts_at >= self.ends_at {
            return Err(format!(
                "starts_at ({}) must be before ends_at ({})",
                self.starts_at, self.ends_at
            ));
        }
        if let Some(slot) = &self.weekly {
            if !slot.is_valid() {
                return Err(format!(
                    "weekly slot {}..{} is not a valid window within one day",
                    slot.start_minute, slot.end_minute
                ));
            }
        }
        if self.max_capacity == 0 {
            return Err("max_capacity must be greater than 0".to_string());
        }
        if self.min_capacity > self.max_capacity {
            return Err(format!(
                "min_capacity ({}) exceeds max_capacity ({})",
                self.min_capacity, self.max_capacity
            ));
        }
        Ok(())
    }
}
