//! High-level registrar that wraps the pure rules + pluggable storage and notifications.
//! Every operation runs in exactly one store transaction; notifications go out after commit.

use crate::capacity::{CapacityLedger, OfferingStats};
use crate::config::RegistrarConfig;
use crate::conflict::ConflictChecker;
use crate::error::{EnrollmentError, Result};
use crate::infrastructure::EnrollmentStore;
use crate::infrastructure_in_memory::InMemoryEnrollmentStore;
use crate::notify::{LogNotifier, Notification, Notifier};
use crate::state::{AdmissionSnapshot, EnrollmentEvent, EnrollmentMachine, Transition};
use crate::types::*;
use crate::waitlist::WaitlistQueue;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A created enrollment plus any advisory schedule conflicts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollOutcome {
    pub enrollment: Enrollment,
    pub warnings: Vec<OfferingId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Approved,
    Declined,
}

/// Callback payload from the payment collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReport {
    pub enrollment_id: EnrollmentId,
    pub outcome: PaymentOutcome,
    pub amount: u64,
}

/// Tally of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub processed: usize,
    pub failed: usize,
}

/// Working set of one transaction
struct Tx<'a> {
    store: &'a mut (dyn EnrollmentStore + Send),
    config: &'a RegistrarConfig,
    outbox: Vec<Notification>,
}

impl Tx<'_> {
    fn offering(&self, offering_id: &str) -> Result<Offering> {
        self.store
            .get_offering(offering_id)?
            .ok_or_else(|| EnrollmentError::not_found("offering", offering_id))
    }

    fn enrollment(&self, enrollment_id: &str) -> Result<Enrollment> {
        self.store
            .get_enrollment(enrollment_id)?
            .ok_or_else(|| EnrollmentError::not_found("enrollment", enrollment_id))
    }

    fn waitlist_entry(&self, entry_id: &str) -> Result<WaitlistEntry> {
        self.store
            .get_waitlist_entry(entry_id)?
            .ok_or_else(|| EnrollmentError::not_found("waitlist entry", entry_id))
    }

    /// Offerings the learner holds an active seat on.
    fn commitments(&self, learner_id: &str) -> Result<Vec<Offering>> {
        let mut held = Vec::new();
        for enrollment in self.store.enrollments_for_learner(learner_id)? {
            if enrollment.is_active() {
                held.push(self.offering(&enrollment.offering_id)?);
            }
        }
        Ok(held)
    }

    fn apply(
        &mut self,
        mut enrollment: Enrollment,
        offering: &Offering,
        event: EnrollmentEvent,
        now: u64,
    ) -> Result<(Enrollment, Transition)> {
        let transition = EnrollmentMachine::transition(&enrollment, offering, event, self.config, now)?;
        if let Transition::Changed { from, to } = transition {
            enrollment.state = to;
            enrollment.updated_at = now;
            self.store.update_enrollment(&enrollment)?;
            tracing::info!(
                enrollment_id = %enrollment.id,
                offering_id = %enrollment.offering_id,
                from = from.as_str(),
                to = to.as_str(),
                "Enrollment transitioned"
            );
        }
        Ok((enrollment, transition))
    }

    /// Marks up to `seats` active entries notified, oldest first.
    fn promote(&mut self, offering_id: &str, seats: u32) -> Result<Vec<WaitlistEntry>> {
        if seats == 0 {
            return Ok(Vec::new());
        }
        let entries = self.store.waitlist_for_offering(offering_id)?;
        let selected: Vec<WaitlistEntry> = WaitlistQueue::select_for_promotion(&entries, seats)
            .into_iter()
            .cloned()
            .collect();

        let mut promoted = Vec::with_capacity(selected.len());
        for mut entry in selected {
            entry.state = WaitlistState::Notified;
            self.store.update_waitlist_entry(&entry)?;
            tracing::info!(
                entry_id = %entry.id,
                learner_id = %entry.learner_id,
                offering_id = %offering_id,
                "Waitlist entry promoted"
            );
            self.outbox.push(Notification::WaitlistSeatAvailable {
                entry: entry.clone(),
            });
            promoted.push(entry);
        }
        Ok(promoted)
    }

    /// Seat released: tell the learner and offer the seat to the queue.
    fn released(&mut self, enrollment: &Enrollment) -> Result<()> {
        self.outbox.push(Notification::EnrollmentCancelled {
            enrollment: enrollment.clone(),
        });
        self.promote(&enrollment.offering_id, 1)?;
        Ok(())
    }
}

/// The main entry point for enrollment operations.
pub struct Registrar {
    store: Box<dyn EnrollmentStore + Send>,
    notifier: Box<dyn Notifier + Send>,
    config: RegistrarConfig,
}

impl Registrar {
    /// Create a Registrar with an empty in-memory store.
    pub fn new() -> Self {
        Self::with_store(Box::new(InMemoryEnrollmentStore::new()))
    }

    /// Create a Registrar backed by SQLite at the given path.
    #[cfg(feature = "sqlite")]
    pub fn with_sqlite(path: &str) -> std::result::Result<Self, crate::error::StoreError> {
        let store = crate::infrastructure_sqlite::SqliteEnrollmentStore::open(path)?;
        Ok(Self::with_store(Box::new(store)))
    }

    pub fn with_store(store: Box<dyn EnrollmentStore + Send>) -> Self {
        Self {
            store,
            notifier: Box::new(LogNotifier),
            config: RegistrarConfig::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + Send + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn with_config(mut self, config: RegistrarConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RegistrarConfig {
        &self.config
    }

    fn atomically<T>(&mut self, op: impl FnOnce(&mut Tx<'_>) -> Result<T>) -> Result<T> {
        self.store.begin()?;

        let mut tx = Tx {
            store: self.store.as_mut(),
            config: &self.config,
            outbox: Vec::new(),
        };
        let result = op(&mut tx);
        let outbox = std::mem::take(&mut tx.outbox);

        let committed = result.and_then(|value| {
            self.store.commit()?;
            Ok(value)
        });

        match committed {
            Ok(value) => {
                self.dispatch(outbox);
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.store.rollback() {
                    tracing::warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    fn dispatch(&self, outbox: Vec<Notification>) {
        for notification in &outbox {
            if let Err(e) = self.notifier.notify(notification) {
                tracing::warn!(
                    kind = notification.kind(),
                    learner_id = %notification.learner_id(),
                    error = %e,
                    "Notification dispatch failed"
                );
            }
        }
    }

    // ─── Offerings ──────────────────────────────────────────────────────────

    /// Add a new offering, or replace one nobody holds a seat on yet.
    pub fn add_offering(&mut self, offering: Offering) -> Result<Offering> {
        offering.validate().map_err(EnrollmentError::InvalidOffering)?;

        self.atomically(|tx| {
            let active = tx
                .store
                .enrollments_for_offering(&offering.id)?
                .iter()
                .any(|e| e.is_active());
            if active {
                return Err(EnrollmentError::OfferingLocked {
                    offering_id: offering.id.clone(),
                    reason: "learners already hold seats".to_string(),
                });
            }
            tx.store.put_offering(&offering)?;
            tracing::info!(offering_id = %offering.id, capacity = offering.max_capacity, "Offering stored");
            Ok(offering)
        })
    }

    /// Change the maximum capacity. Growing always works and offers the new seats to the
    /// waitlist; shrinking is refused once anyone is confirmed.
    pub fn set_capacity(&mut self, offering_id: &str, max_capacity: u32) -> Result<Offering> {
        self.atomically(|tx| {
            let mut offering = tx.offering(offering_id)?;
            let enrollments = tx.store.enrollments_for_offering(offering_id)?;
            let old = offering.max_capacity;

            if max_capacity < old {
                if enrollments.iter().any(|e| e.state == EnrollmentState::Confirmed) {
                    return Err(EnrollmentError::OfferingLocked {
                        offering_id: offering.id.clone(),
                        reason: "capacity cannot shrink once learners are confirmed".to_string(),
                    });
                }
                let occupied = CapacityLedger::occupied(&offering, &enrollments);
                if max_capacity < occupied {
                    return Err(EnrollmentError::OfferingLocked {
                        offering_id: offering.id.clone(),
                        reason: format!("{} seats are taken", occupied),
                    });
                }
            }

            offering.max_capacity = max_capacity;
            offering.validate().map_err(EnrollmentError::InvalidOffering)?;
            tx.store.put_offering(&offering)?;
            tracing::info!(offering_id = %offering.id, from = old, to = max_capacity, "Capacity changed");

            if max_capacity > old {
                tx.promote(offering_id, max_capacity - old)?;
            }
            Ok(offering)
        })
    }

    pub fn set_status(&mut self, offering_id: &str, status: OfferingStatus) -> Result<Offering> {
        self.atomically(|tx| {
            let mut offering = tx.offering(offering_id)?;
            offering.status = status;
            tx.store.put_offering(&offering)?;
            tracing::info!(offering_id = %offering.id, status = status.as_str(), "Offering status changed");
            Ok(offering)
        })
    }

    pub fn offering(&self, offering_id: &str) -> Result<Offering> {
        self.store
            .get_offering(offering_id)?
            .ok_or_else(|| EnrollmentError::not_found("offering", offering_id))
    }

    pub fn available_seats(&self, offering_id: &str) -> Result<u32> {
        let offering = self.offering(offering_id)?;
        let enrollments = self.store.enrollments_for_offering(offering_id)?;
        Ok(CapacityLedger::available_seats(&offering, &enrollments))
    }

    pub fn stats(&self, offering_id: &str) -> Result<OfferingStats> {
        let offering = self.offering(offering_id)?;
        let enrollments = self.store.enrollments_for_offering(offering_id)?;
        let waitlisted = self
            .store
            .waitlist_for_offering(offering_id)?
            .iter()
            .filter(|e| e.state == WaitlistState::Active)
            .count();
        Ok(CapacityLedger::stats(&offering, &enrollments, waitlisted))
    }

    // ─── Conflicts ──────────────────────────────────────────────────────────

    /// Offerings the learner holds that overlap `offering_id`.
    pub fn conflicts(&self, learner_id: &str, offering_id: &str) -> Result<Vec<OfferingId>> {
        let candidate = self.offering(offering_id)?;
        let mut held = Vec::new();
        for enrollment in self.store.enrollments_for_learner(learner_id)? {
            if enrollment.is_active() {
                held.push(self.offering(&enrollment.offering_id)?);
            }
        }
        Ok(ConflictChecker::conflicts(&candidate, &held))
    }

    pub fn has_conflict(&self, learner_id: &str, offering_id: &str) -> Result<bool> {
        Ok(!self.conflicts(learner_id, offering_id)?.is_empty())
    }

    // ─── Enrollments ────────────────────────────────────────────────────────

    pub fn enrollment(&self, enrollment_id: &str) -> Result<Enrollment> {
        self.store
            .get_enrollment(enrollment_id)?
            .ok_or_else(|| EnrollmentError::not_found("enrollment", enrollment_id))
    }

    pub fn enrollments_for_learner(&self, learner_id: &str) -> Result<Vec<Enrollment>> {
        Ok(self.store.enrollments_for_learner(learner_id)?)
    }

    /// Admit a learner. The seat count, duplicate check and insert share one transaction.
    pub fn enroll(&mut self, learner_id: &str, offering_id: &str, now: u64) -> Result<EnrollOutcome> {
        self.atomically(|tx| {
            let offering = tx.offering(offering_id)?;
            let offering_enrollments = tx.store.enrollments_for_offering(offering_id)?;
            let commitments = tx.commitments(learner_id)?;

            let admission = EnrollmentMachine::admit(
                learner_id,
                &AdmissionSnapshot {
                    offering: &offering,
                    offering_enrollments: &offering_enrollments,
                    learner_commitments: &commitments,
                },
                tx.config,
                now,
            )?;

            let enrollment = Enrollment::new(
                format!("enr_{}", nanoid::nanoid!()),
                learner_id.to_string(),
                offering_id.to_string(),
                admission.state,
                now,
            );
            tx.store.insert_enrollment(&enrollment)?;

            // A queued learner who got in no longer needs their entry
            for mut entry in tx.store.waitlist_for_offering(offering_id)? {
                if entry.learner_id == learner_id && entry.is_open() {
                    entry.state = WaitlistState::Cancelled;
                    tx.store.update_waitlist_entry(&entry)?;
                }
            }

            if enrollment.state == EnrollmentState::Confirmed {
                tx.outbox.push(Notification::EnrollmentConfirmed {
                    enrollment: enrollment.clone(),
                });
            }
            if !admission.warnings.is_empty() {
                tracing::warn!(
                    learner_id = %learner_id,
                    offering_id = %offering_id,
                    conflicts = %admission.warnings.join(","),
                    "Enrolled despite schedule overlap"
                );
            }
            tracing::info!(
                enrollment_id = %enrollment.id,
                learner_id = %learner_id,
                offering_id = %offering_id,
                state = enrollment.state.as_str(),
                "Enrollment created"
            );

            Ok(EnrollOutcome {
                enrollment,
                warnings: admission.warnings,
            })
        })
    }

    /// Learner-initiated cancellation. Cancelling an already-cancelled enrollment is a no-op.
    pub fn cancel(&mut self, enrollment_id: &str, now: u64) -> Result<Enrollment> {
        self.atomically(|tx| {
            let enrollment = tx.enrollment(enrollment_id)?;
            let offering = tx.offering(&enrollment.offering_id)?;
            let (enrollment, transition) =
                tx.apply(enrollment, &offering, EnrollmentEvent::LearnerCancelled, now)?;
            if let Transition::Changed { .. } = transition {
                tx.released(&enrollment)?;
            }
            Ok(enrollment)
        })
    }

    /// Payment callback. A decline inside the grace window leaves the enrollment pending so the
    /// learner can retry; after the window it cancels straight away.
    pub fn record_payment(&mut self, report: &PaymentReport, now: u64) -> Result<Enrollment> {
        self.atomically(|tx| {
            let enrollment = tx.enrollment(&report.enrollment_id)?;
            let offering = tx.offering(&enrollment.offering_id)?;

            match report.outcome {
                PaymentOutcome::Approved => {
                    let (enrollment, transition) = tx.apply(
                        enrollment,
                        &offering,
                        EnrollmentEvent::PaymentApproved {
                            amount: report.amount,
                        },
                        now,
                    )?;
                    if let Transition::Changed { .. } = transition {
                        tx.outbox.push(Notification::EnrollmentConfirmed {
                            enrollment: enrollment.clone(),
                        });
                    }
                    Ok(enrollment)
                }
                PaymentOutcome::Declined => {
                    if enrollment.state == EnrollmentState::PendingPayment
                        && !EnrollmentMachine::grace_expired(&enrollment, tx.config, now)
                    {
                        tracing::info!(
                            enrollment_id = %enrollment.id,
                            "Payment declined, enrollment stays pending"
                        );
                        return Ok(enrollment);
                    }
                    let (enrollment, transition) =
                        tx.apply(enrollment, &offering, EnrollmentEvent::PaymentLapsed, now)?;
                    if let Transition::Changed { .. } = transition {
                        tx.released(&enrollment)?;
                    }
                    Ok(enrollment)
                }
            }
        })
    }

    /// Close out a confirmed enrollment after the offering finished.
    pub fn complete(&mut self, enrollment_id: &str, attendance: Attendance, now: u64) -> Result<Enrollment> {
        self.atomically(|tx| {
            let enrollment = tx.enrollment(enrollment_id)?;
            let offering = tx.offering(&enrollment.offering_id)?;
            let (enrollment, _) =
                tx.apply(enrollment, &offering, EnrollmentEvent::Completed { attendance }, now)?;
            Ok(enrollment)
        })
    }

    /// Milliseconds left to pay, `None` when the enrollment isn't waiting for payment.
    pub fn payment_time_remaining(&self, enrollment_id: &str, now: u64) -> Result<Option<u64>> {
        let enrollment = self.enrollment(enrollment_id)?;
        Ok(EnrollmentMachine::grace_remaining(&enrollment, &self.config, now))
    }

    // ─── Waitlist ───────────────────────────────────────────────────────────

    pub fn join_waitlist(&mut self, learner_id: &str, offering_id: &str, now: u64) -> Result<WaitlistEntry> {
        self.atomically(|tx| {
            let offering = tx.offering(offering_id)?;
            let enrollments = tx.store.enrollments_for_offering(offering_id)?;
            let entries = tx.store.waitlist_for_offering(offering_id)?;
            WaitlistQueue::check_join(&offering, learner_id, &enrollments, &entries)?;

            let entry = tx.store.insert_waitlist_entry(WaitlistEntry::new(
                format!("wl_{}", nanoid::nanoid!()),
                learner_id.to_string(),
                offering_id.to_string(),
                now,
                0,
            ))?;
            tracing::info!(
                entry_id = %entry.id,
                learner_id = %learner_id,
                offering_id = %offering_id,
                "Joined waitlist"
            );
            Ok(entry)
        })
    }

    /// Withdraw from the waitlist. Leaving twice is a no-op.
    pub fn leave_waitlist(&mut self, entry_id: &str) -> Result<WaitlistEntry> {
        self.atomically(|tx| {
            let mut entry = tx.waitlist_entry(entry_id)?;
            if entry.state != WaitlistState::Cancelled {
                entry.state = WaitlistState::Cancelled;
                tx.store.update_waitlist_entry(&entry)?;
                tracing::info!(entry_id = %entry.id, "Left waitlist");
            }
            Ok(entry)
        })
    }

    /// Notify up to `seats_freed` waiting learners, oldest registration first.
    pub fn promote(&mut self, offering_id: &str, seats_freed: u32) -> Result<Vec<WaitlistEntry>> {
        self.atomically(|tx| {
            tx.offering(offering_id)?;
            tx.promote(offering_id, seats_freed)
        })
    }

    pub fn waitlist(&self, offering_id: &str) -> Result<Vec<WaitlistEntry>> {
        Ok(self.store.waitlist_for_offering(offering_id)?)
    }

    pub fn waitlist_position(&self, entry_id: &str) -> Result<Option<usize>> {
        let entry = self
            .store
            .get_waitlist_entry(entry_id)?
            .ok_or_else(|| EnrollmentError::not_found("waitlist entry", entry_id))?;
        let entries = self.store.waitlist_for_offering(&entry.offering_id)?;
        Ok(WaitlistQueue::position(&entries, entry_id))
    }

    // ─── Sweeps ─────────────────────────────────────────────────────────────

    /// Cancel every pending enrollment whose grace window has elapsed. Each record gets its own
    /// transaction; a failing record is logged and skipped. Safe to re-run.
    pub fn sweep_expired_payments(&mut self, now: u64) -> Result<SweepReport> {
        let candidates: Vec<EnrollmentId> = self
            .store
            .enrollments_in_state(EnrollmentState::PendingPayment)?
            .into_iter()
            .filter(|e| EnrollmentMachine::grace_expired(e, &self.config, now))
            .map(|e| e.id)
            .collect();

        let mut report = SweepReport {
            examined: candidates.len(),
            ..SweepReport::default()
        };

        for enrollment_id in candidates {
            let outcome = self.atomically(|tx| {
                let enrollment = tx.enrollment(&enrollment_id)?;
                // Paid or cancelled since the scan
                if !EnrollmentMachine::grace_expired(&enrollment, tx.config, now) {
                    return Ok(false);
                }
                let offering = tx.offering(&enrollment.offering_id)?;
                let (enrollment, transition) =
                    tx.apply(enrollment, &offering, EnrollmentEvent::PaymentLapsed, now)?;
                if let Transition::Changed { .. } = transition {
                    tx.outbox.push(Notification::PaymentGraceExpired {
                        enrollment: enrollment.clone(),
                    });
                    tx.released(&enrollment)?;
                    return Ok(true);
                }
                Ok(false)
            });

            match outcome {
                Ok(true) => report.processed += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(enrollment_id = %enrollment_id, error = %e, "Expiry sweep skipped record");
                }
            }
        }

        tracing::info!(
            examined = report.examined,
            cancelled = report.processed,
            failed = report.failed,
            "Payment expiry sweep finished"
        );
        Ok(report)
    }

    /// Send "starts soon" reminders at the two configured lead times, once each.
    pub fn sweep_reminders(&mut self, now: u64) -> Result<SweepReport> {
        let confirmed = self.store.enrollments_in_state(EnrollmentState::Confirmed)?;
        let mut report = SweepReport {
            examined: confirmed.len(),
            ..SweepReport::default()
        };

        for candidate in confirmed {
            if candidate.reminder_1h_sent {
                continue;
            }
            let enrollment_id = candidate.id;
            let outcome = self.atomically(|tx| {
                let mut enrollment = tx.enrollment(&enrollment_id)?;
                let offering = tx.offering(&enrollment.offering_id)?;
                if enrollment.state != EnrollmentState::Confirmed || now >= offering.starts_at {
                    return Ok(false);
                }

                let lead = offering.starts_at - now;
                let reminder = if lead <= tx.config.final_reminder_lead_ms && !enrollment.reminder_1h_sent {
                    enrollment.reminder_1h_sent = true;
                    // A late first reminder would only repeat the final one
                    enrollment.reminder_24h_sent = true;
                    Some(tx.config.final_reminder_lead_ms)
                } else if lead <= tx.config.reminder_lead_ms && !enrollment.reminder_24h_sent {
                    enrollment.reminder_24h_sent = true;
                    Some(tx.config.reminder_lead_ms)
                } else {
                    None
                };

                let Some(lead_ms) = reminder else {
                    return Ok(false);
                };
                enrollment.updated_at = now;
                tx.store.update_enrollment(&enrollment)?;
                tx.outbox.push(Notification::StartsSoon { enrollment, lead_ms });
                Ok(true)
            });

            match outcome {
                Ok(true) => report.processed += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(enrollment_id = %enrollment_id, error = %e, "Reminder sweep skipped record");
                }
            }
        }

        tracing::info!(
            examined = report.examined,
            sent = report.processed,
            failed = report.failed,
            "Reminder sweep finished"
        );
        Ok(report)
    }
}

impl Default for Registrar {
    fn default() -> Self {
        Self::new()
    }
}
