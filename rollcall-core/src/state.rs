use serde::{Deserialize, Serialize};

use crate::capacity::CapacityLedger;
use crate::config::RegistrarConfig;
use crate::conflict::{ConflictChecker, ConflictResult};
use crate::error::EnrollmentError;
use crate::types::{
    Attendance, ConflictPolicy, Enrollment, EnrollmentState, Offering, OfferingId, OfferingStatus,
};

/// Something that happened to an existing enrollment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum EnrollmentEvent {
    /// The payment provider approved a charge
    PaymentApproved { amount: u64 },
    /// The charge was declined or never arrived
    PaymentLapsed,
    /// The learner withdrew
    LearnerCancelled,
    /// The offering ended and attendance was tallied
    Completed { attendance: Attendance },
}

impl EnrollmentEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EnrollmentEvent::PaymentApproved { .. } => "approve payment for",
            EnrollmentEvent::PaymentLapsed => "expire",
            EnrollmentEvent::LearnerCancelled => "cancel",
            EnrollmentEvent::Completed { .. } => "complete",
        }
    }
}

/// Result of applying an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed {
        from: EnrollmentState,
        to: EnrollmentState,
    },
    /// Event was a repeat of one already applied
    Unchanged,
}

/// Everything admission needs to see, read inside the enrolling transaction.
#[derive(Debug, Clone)]
pub struct AdmissionSnapshot<'a> {
    pub offering: &'a Offering,
    /// All enrollments on `offering`, any state
    pub offering_enrollments: &'a [Enrollment],
    /// Offerings the learner currently holds an active enrollment on
    pub learner_commitments: &'a [Offering],
}

/// A granted admission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub state: EnrollmentState,
    /// Overlapping offerings that did not block the admission
    pub warnings: Vec<OfferingId>,
}

/// The enrollment lifecycle as pure functions over records. Persisting the result and
/// running side effects is the caller's job.
pub struct EnrollmentMachine;

impl EnrollmentMachine {
    /// Priced offerings start out waiting for payment.
    pub fn initial_state(offering: &Offering) -> EnrollmentState {
        if offering.is_free() {
            EnrollmentState::Confirmed
        } else {
            EnrollmentState::PendingPayment
        }
    }

    pub fn check_enrollable(offering: &Offering, now: u64) -> Result<(), EnrollmentError> {
        if !offering.status.accepts_enrollment() {
            return Err(EnrollmentError::OfferingNotEnrollable {
                offering_id: offering.id.clone(),
                reason: format!("status is {}", offering.status.as_str()),
            });
        }
        if now >= offering.starts_at {
            return Err(EnrollmentError::OfferingNotEnrollable {
                offering_id: offering.id.clone(),
                reason: "offering has already started".to_string(),
            });
        }
        Ok(())
    }

    /// Runs every creation guard in order: enrollable, not a duplicate, schedule, capacity.
    pub fn admit(
        learner_id: &str,
        snapshot: &AdmissionSnapshot<'_>,
        config: &RegistrarConfig,
        now: u64,
    ) -> Result<Admission, EnrollmentError> {
        let offering = snapshot.offering;
        Self::check_enrollable(offering, now)?;

        let duplicate = snapshot
            .offering_enrollments
            .iter()
            .any(|e| e.learner_id == learner_id && e.offering_id == offering.id && e.is_active());
        if duplicate {
            return Err(EnrollmentError::DuplicateEnrollment {
                learner_id: learner_id.to_string(),
                offering_id: offering.id.clone(),
            });
        }

        let mut warnings = Vec::new();
        if let ConflictResult::Conflict { conflicting } =
            ConflictChecker::check(offering, snapshot.learner_commitments)
        {
            match config.conflict_policy(offering.kind) {
                ConflictPolicy::Blocking => {
                    return Err(EnrollmentError::ScheduleConflict { conflicting });
                }
                ConflictPolicy::Advisory => warnings = conflicting,
            }
        }

        CapacityLedger::reserve(offering, snapshot.offering_enrollments)?;

        Ok(Admission {
            state: Self::initial_state(offering),
            warnings,
        })
    }

    /// Last instant a learner may still cancel.
    pub fn cancellation_deadline(offering: &Offering, config: &RegistrarConfig) -> u64 {
        offering.starts_at.saturating_sub(config.cancellation_notice_ms)
    }

    /// Milliseconds left to pay. `None` unless the enrollment is pending payment.
    pub fn grace_remaining(enrollment: &Enrollment, config: &RegistrarConfig, now: u64) -> Option<u64> {
        if enrollment.state != EnrollmentState::PendingPayment {
            return None;
        }
        let elapsed = now.saturating_sub(enrollment.created_at);
        Some(config.payment_grace_ms.saturating_sub(elapsed))
    }

    /// Grace window fully elapsed (strictly longer than the configured window).
    pub fn grace_expired(enrollment: &Enrollment, config: &RegistrarConfig, now: u64) -> bool {
        enrollment.state == EnrollmentState::PendingPayment
            && now.saturating_sub(enrollment.created_at) > config.payment_grace_ms
    }

    pub fn transition(
        enrollment: &Enrollment,
        offering: &Offering,
        event: EnrollmentEvent,
        config: &RegistrarConfig,
        now: u64,
    ) -> Result<Transition, EnrollmentError> {
        use EnrollmentState::*;

        let from = enrollment.state;
        let invalid = || EnrollmentError::InvalidTransition {
            from,
            event: event.name(),
        };
        let changed = |to| Ok(Transition::Changed { from, to });

        match (from, event) {
            (PendingPayment, EnrollmentEvent::PaymentApproved { amount }) => {
                if amount != offering.price {
                    return Err(EnrollmentError::PaymentMismatch {
                        expected: offering.price,
                        received: amount,
                    });
                }
                changed(Confirmed)
            }
            // Providers redeliver callbacks
            (Confirmed, EnrollmentEvent::PaymentApproved { .. }) => Ok(Transition::Unchanged),

            (PendingPayment, EnrollmentEvent::PaymentLapsed) => {
                if !Self::grace_expired(enrollment, config, now) {
                    let remaining = Self::grace_remaining(enrollment, config, now).unwrap_or(0);
                    return Err(EnrollmentError::GraceWindowOpen {
                        remaining_ms: remaining,
                    });
                }
                changed(Cancelled)
            }

            (PendingPayment | Confirmed, EnrollmentEvent::LearnerCancelled) => {
                let deadline = Self::cancellation_deadline(offering, config);
                if now > deadline {
                    return Err(EnrollmentError::CancellationDeadlinePassed { deadline });
                }
                changed(Cancelled)
            }

            // Cancelling twice is a no-op
            (Cancelled, EnrollmentEvent::LearnerCancelled | EnrollmentEvent::PaymentLapsed) => {
                Ok(Transition::Unchanged)
            }

            (Confirmed, EnrollmentEvent::Completed { attendance }) => {
                let finished = offering.status == OfferingStatus::Finished
                    || now >= offering.ends_at;
                if !finished {
                    return Err(EnrollmentError::OfferingNotFinished {
                        offering_id: offering.id.clone(),
                    });
                }
                if !attendance.meets(config.min_attendance_percent) {
                    return Err(EnrollmentError::AttendanceBelowThreshold {
                        percent: attendance.percent(),
                        required: config.min_attendance_percent,
                    });
                }
                changed(Completed)
            }

            _ => Err(invalid()),
        }
    }
}
