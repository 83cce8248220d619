use serde::{Deserialize, Serialize};

use super::{LearnerId, OfferingId, WaitlistEntryId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistState {
    /// Waiting for a seat
    Active,
    /// Told a seat is free, must still enroll
    Notified,
    /// Withdrawn or consumed
    Cancelled,
}

impl WaitlistState {
    pub fn as_str(self) -> &'static str {
        match self {
            WaitlistState::Active => "active",
            WaitlistState::Notified => "notified",
            WaitlistState::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(WaitlistState::Active),
            "notified" => Some(WaitlistState::Notified),
            "cancelled" => Some(WaitlistState::Cancelled),
            _ => None,
        }
    }
}

/// A learner queued for a full offering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: WaitlistEntryId,
    pub learner_id: LearnerId,
    pub offering_id: OfferingId,
    pub state: WaitlistState,
    /// FIFO key
    pub registered_at: u64,
    /// Insertion counter, breaks ties between equal `registered_at`
    pub sequence: u64,
}

impl WaitlistEntry {
    pub fn new(
        id: WaitlistEntryId,
        learner_id: LearnerId,
        offering_id: OfferingId,
        registered_at: u64,
        sequence: u64,
    ) -> Self {
        Self {
            id,
            learner_id,
            offering_id,
            state: WaitlistState::Active,
            registered_at,
            sequence,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state != WaitlistState::Cancelled
    }
}
