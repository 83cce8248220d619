use serde::Serialize;

use crate::error::EnrollmentError;
use crate::types::{Enrollment, EnrollmentState, Offering};

/// Seat usage summary for one offering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferingStats {
    pub offering_id: String,
    pub total_enrollments: usize,
    pub confirmed: usize,
    pub pending_payment: usize,
    pub cancelled: usize,
    pub completed: usize,
    pub waitlisted: usize,
    pub available_seats: u32,
    /// Confirmed seats over maximum capacity, one decimal
    pub occupancy_percent: f64,
    pub meets_minimum: bool,
    pub short_of_minimum: u32,
}

/// Derives seat availability from enrollment states. There is no stored counter to drift.
pub struct CapacityLedger;

impl CapacityLedger {
    /// Enrollments currently holding a seat on `offering`.
    pub fn occupied(offering: &Offering, enrollments: &[Enrollment]) -> u32 {
        enrollments
            .iter()
            .filter(|e| e.offering_id == offering.id && e.is_active())
            .count() as u32
    }

    pub fn available_seats(offering: &Offering, enrollments: &[Enrollment]) -> u32 {
        offering
            .max_capacity
            .saturating_sub(Self::occupied(offering, enrollments))
    }

    pub fn is_full(offering: &Offering, enrollments: &[Enrollment]) -> bool {
        Self::available_seats(offering, enrollments) == 0
    }

    /// Succeeds when one more seat can be taken. The caller takes it by inserting the enrollment
    /// inside the same transaction that produced `enrollments`.
    pub fn reserve(offering: &Offering, enrollments: &[Enrollment]) -> Result<(), EnrollmentError> {
        if Self::is_full(offering, enrollments) {
            return Err(EnrollmentError::CapacityExceeded {
                offering_id: offering.id.clone(),
                capacity: offering.max_capacity,
            });
        }
        Ok(())
    }

    pub fn stats(offering: &Offering, enrollments: &[Enrollment], waitlisted: usize) -> OfferingStats {
        let own: Vec<&Enrollment> = enrollments
            .iter()
            .filter(|e| e.offering_id == offering.id)
            .collect();
        let count = |state: EnrollmentState| own.iter().filter(|e| e.state == state).count();

        let confirmed = count(EnrollmentState::Confirmed);
        let occupancy = confirmed as f64 / f64::from(offering.max_capacity.max(1)) * 100.0;

        OfferingStats {
            offering_id: offering.id.clone(),
            total_enrollments: own.len(),
            confirmed,
            pending_payment: count(EnrollmentState::PendingPayment),
            cancelled: count(EnrollmentState::Cancelled),
            completed: count(EnrollmentState::Completed),
            waitlisted,
            available_seats: Self::available_seats(offering, enrollments),
            occupancy_percent: (occupancy * 10.0).round() / 10.0,
            meets_minimum: confirmed as u32 >= offering.min_capacity,
            short_of_minimum: offering.min_capacity.saturating_sub(confirmed as u32),
        }
    }
}
