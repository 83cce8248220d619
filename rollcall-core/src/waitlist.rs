use crate::capacity::CapacityLedger;
use crate::error::EnrollmentError;
use crate::types::{Enrollment, Offering, WaitlistEntry, WaitlistState};

/// FIFO ordering over waitlist entries. Order comes from `(registered_at, sequence)`,
/// never from a stored position, so withdrawals don't reshuffle anyone.
pub struct WaitlistQueue;

impl WaitlistQueue {
    /// Guards for joining: the offering must be full, the learner not enrolled and not queued.
    pub fn check_join(
        offering: &Offering,
        learner_id: &str,
        enrollments: &[Enrollment],
        entries: &[WaitlistEntry],
    ) -> Result<(), EnrollmentError> {
        let available = CapacityLedger::available_seats(offering, enrollments);
        if available > 0 {
            return Err(EnrollmentError::SeatsAvailable {
                offering_id: offering.id.clone(),
                available,
            });
        }

        let queued = entries.iter().any(|e| {
            e.offering_id == offering.id
                && e.learner_id == learner_id
                && e.state == WaitlistState::Active
        });
        if queued {
            return Err(EnrollmentError::AlreadyQueued {
                learner_id: learner_id.to_string(),
                offering_id: offering.id.clone(),
            });
        }

        let enrolled = enrollments
            .iter()
            .any(|e| e.offering_id == offering.id && e.learner_id == learner_id && e.is_active());
        if enrolled {
            return Err(EnrollmentError::DuplicateEnrollment {
                learner_id: learner_id.to_string(),
                offering_id: offering.id.clone(),
            });
        }

        Ok(())
    }

    /// Active entries in promotion order. The sort is stable.
    pub fn ordered(entries: &[WaitlistEntry]) -> Vec<&WaitlistEntry> {
        let mut active: Vec<&WaitlistEntry> = entries
            .iter()
            .filter(|e| e.state == WaitlistState::Active)
            .collect();
        active.sort_by_key(|e| (e.registered_at, e.sequence));
        active
    }

    /// The entries to notify when `seats_freed` seats open up.
    pub fn select_for_promotion(entries: &[WaitlistEntry], seats_freed: u32) -> Vec<&WaitlistEntry> {
        Self::ordered(entries)
            .into_iter()
            .take(seats_freed as usize)
            .collect()
    }

    /// 1-based position of an active entry in the queue.
    pub fn position(entries: &[WaitlistEntry], entry_id: &str) -> Option<usize> {
        Self::ordered(entries)
            .iter()
            .position(|e| e.id == entry_id)
            .map(|i| i + 1)
    }
}
