#[cfg(test)]
mod tests {
    use std::sync::mpsc::Receiver;
    use std::sync::{Arc, Mutex};
    use std::thread;

    use crate::client::{PaymentOutcome, PaymentReport, Registrar};
    use crate::config::RegistrarConfig;
    use crate::conflict::ConflictChecker;
    use crate::error::EnrollmentError;
    use crate::notify::{ChannelNotifier, Notification, Notifier, NotifyError};
    use crate::types::{
        Attendance, ConflictPolicy, DAY_MS, DayOfWeek, EnrollmentState, HOUR_MS, MINUTE_MS, Offering,
        OfferingStatus, WaitlistState, WeeklySlot,
    };

    // Far enough out that cancellation windows are open at t=0
    const START: u64 = 30 * DAY_MS;

    // =========================================================================
    // Helpers
    // =========================================================================

    fn registrar() -> (Registrar, Receiver<Notification>) {
        let (notifier, rx) = ChannelNotifier::new();
        (Registrar::new().with_notifier(notifier), rx)
    }

    fn free_workshop(id: &str, capacity: u32) -> Offering {
        Offering::workshop(id, START, START + 2 * HOUR_MS, capacity, 0)
    }

    fn paid_workshop(id: &str, capacity: u32) -> Offering {
        Offering::workshop(id, START, START + 2 * HOUR_MS, capacity, 2500)
    }

    fn kinds(rx: &Receiver<Notification>) -> Vec<&'static str> {
        rx.try_iter().map(|n| n.kind()).collect()
    }

    fn approve(enrollment_id: &str, amount: u64) -> PaymentReport {
        PaymentReport {
            enrollment_id: enrollment_id.to_string(),
            outcome: PaymentOutcome::Approved,
            amount,
        }
    }

    fn decline(enrollment_id: &str) -> PaymentReport {
        PaymentReport {
            enrollment_id: enrollment_id.to_string(),
            outcome: PaymentOutcome::Declined,
            amount: 0,
        }
    }

    struct RejectingNotifier;

    impl Notifier for RejectingNotifier {
        fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
            Err(NotifyError::Rejected("smtp down".to_string()))
        }
    }

    // =========================================================================
    // Offerings
    // =========================================================================

    #[test]
    fn add_offering_validates() {
        let (mut reg, _rx) = registrar();
        let mut broken = free_workshop("ws_bad", 5);
        broken.ends_at = broken.starts_at;
        assert!(matches!(
            reg.add_offering(broken),
            Err(EnrollmentError::InvalidOffering(_))
        ));
        assert!(matches!(
            reg.offering("ws_bad"),
            Err(EnrollmentError::NotFound { kind: "offering", .. })
        ));
    }

    #[test]
    fn offering_with_seats_taken_cannot_be_replaced() {
        let (mut reg, _rx) = registrar();
        reg.add_offering(free_workshop("ws", 5)).unwrap();
        reg.enroll("alice", "ws", 0).unwrap();

        let err = reg.add_offering(free_workshop("ws", 50)).unwrap_err();
        assert!(matches!(err, EnrollmentError::OfferingLocked { .. }));
        assert_eq!(reg.offering("ws").unwrap().max_capacity, 5);
    }

    #[test]
    fn draft_offerings_refuse_enrollment() {
        let (mut reg, _rx) = registrar();
        reg.add_offering(free_workshop("ws", 5)).unwrap();
        reg.set_status("ws", OfferingStatus::Draft).unwrap();

        let err = reg.enroll("alice", "ws", 0).unwrap_err();
        assert_eq!(err.code(), "OFFERING_NOT_ENROLLABLE");
    }

    // =========================================================================
    // Capacity
    // =========================================================================

    #[test]
    fn free_enrollment_confirms_and_notifies() {
        let (mut reg, rx) = registrar();
        reg.add_offering(free_workshop("ws", 3)).unwrap();

        let outcome = reg.enroll("alice", "ws", 0).unwrap();
        assert_eq!(outcome.enrollment.state, EnrollmentState::Confirmed);
        assert!(outcome.warnings.is_empty());
        assert_eq!(reg.available_seats("ws").unwrap(), 2);
        assert_eq!(kinds(&rx), vec!["enrollment_confirmed"]);
    }

    #[test]
    fn full_offering_rejects_without_creating_a_record() {
        let (mut reg, _rx) = registrar();
        reg.add_offering(free_workshop("ws", 1)).unwrap();
        reg.enroll("alice", "ws", 0).unwrap();

        let err = reg.enroll("bob", "ws", 0).unwrap_err();
        assert!(matches!(err, EnrollmentError::CapacityExceeded { capacity: 1, .. }));
        assert!(reg.enrollments_for_learner("bob").unwrap().is_empty());
        assert_eq!(reg.stats("ws").unwrap().total_enrollments, 1);
    }

    #[test]
    fn duplicate_enrollment_is_refused() {
        let (mut reg, _rx) = registrar();
        reg.add_offering(paid_workshop("ws", 5)).unwrap();
        reg.enroll("alice", "ws", 0).unwrap();
        assert!(matches!(
            reg.enroll("alice", "ws", 1),
            Err(EnrollmentError::DuplicateEnrollment { .. })
        ));
    }

    #[test]
    fn active_seats_never_exceed_capacity() {
        let (mut reg, _rx) = registrar();
        reg.add_offering(free_workshop("ws", 3)).unwrap();

        let mut held = Vec::new();
        for round in 0..20u64 {
            let learner = format!("learner_{}", round);
            match reg.enroll(&learner, "ws", round) {
                Ok(outcome) => held.push(outcome.enrollment.id),
                Err(e) => assert!(matches!(e, EnrollmentError::CapacityExceeded { .. })),
            }
            if round % 4 == 3 {
                let id = held.remove(0);
                reg.cancel(&id, round).unwrap();
            }
            let stats = reg.stats("ws").unwrap();
            let active = (stats.confirmed + stats.pending_payment) as u32;
            assert_eq!(stats.available_seats + active, 3);
        }
    }

    #[test]
    fn blocking_policy_keeps_active_schedules_disjoint() {
        let (notifier, _rx) = ChannelNotifier::new();
        let mut reg = Registrar::new()
            .with_notifier(notifier)
            .with_config(RegistrarConfig {
                workshop_conflicts: ConflictPolicy::Blocking,
                ..RegistrarConfig::default()
            });

        // Staggered 90 minute sessions every 45 minutes, so neighbours overlap
        let offerings: Vec<Offering> = (0..12u64)
            .map(|i| {
                let starts_at = START + i * 45 * MINUTE_MS;
                Offering::workshop(format!("ws_{}", i), starts_at, starts_at + 90 * MINUTE_MS, 5, 0)
            })
            .collect();
        for offering in &offerings {
            reg.add_offering(offering.clone()).unwrap();
        }

        for offering in &offerings {
            match reg.enroll("alice", &offering.id, 0) {
                Ok(outcome) => assert!(outcome.warnings.is_empty()),
                Err(e) => assert!(matches!(e, EnrollmentError::ScheduleConflict { .. })),
            }
        }

        let held: Vec<Offering> = reg
            .enrollments_for_learner("alice")
            .unwrap()
            .into_iter()
            .filter(|e| e.is_active())
            .map(|e| reg.offering(&e.offering_id).unwrap())
            .collect();
        assert!(held.len() > 1);
        for (i, a) in held.iter().enumerate() {
            for b in &held[i + 1..] {
                assert!(!ConflictChecker::offerings_overlap(a, b), "{} overlaps {}", a.id, b.id);
            }
        }
    }

    #[test]
    fn two_threads_racing_for_the_last_seat() {
        let reg = Arc::new(Mutex::new(Registrar::new()));
        reg.lock()
            .unwrap()
            .add_offering(free_workshop("ws", 1))
            .unwrap();

        let handles: Vec<_> = ["alice", "bob"]
            .into_iter()
            .map(|learner| {
                let reg = Arc::clone(&reg);
                thread::spawn(move || reg.lock().unwrap().enroll(learner, "ws", 0))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let admitted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(admitted, 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(EnrollmentError::CapacityExceeded { .. }))));
        assert_eq!(reg.lock().unwrap().available_seats("ws").unwrap(), 0);
    }

    #[test]
    fn growing_capacity_promotes_the_waitlist() {
        let (mut reg, rx) = registrar();
        reg.add_offering(free_workshop("ws", 1)).unwrap();
        reg.enroll("holder", "ws", 0).unwrap();
        let a = reg.join_waitlist("alice", "ws", 10).unwrap();
        let b = reg.join_waitlist("bob", "ws", 20).unwrap();
        let c = reg.join_waitlist("carol", "ws", 30).unwrap();
        rx.try_iter().count();

        reg.set_capacity("ws", 3).unwrap();

        let waitlist = reg.waitlist("ws").unwrap();
        let state_of = |id: &str| waitlist.iter().find(|e| e.id == id).unwrap().state;
        assert_eq!(state_of(&a.id), WaitlistState::Notified);
        assert_eq!(state_of(&b.id), WaitlistState::Notified);
        assert_eq!(state_of(&c.id), WaitlistState::Active);
        assert_eq!(kinds(&rx), vec!["waitlist_seat_available", "waitlist_seat_available"]);
    }

    #[test]
    fn shrinking_capacity_is_refused_once_confirmed() {
        let (mut reg, _rx) = registrar();
        reg.add_offering(free_workshop("ws", 5)).unwrap();
        reg.enroll("alice", "ws", 0).unwrap();

        let err = reg.set_capacity("ws", 4).unwrap_err();
        assert!(matches!(err, EnrollmentError::OfferingLocked { .. }));
        assert_eq!(reg.offering("ws").unwrap().max_capacity, 5);
    }

    #[test]
    fn shrinking_capacity_is_fine_with_only_pending_seats() {
        let (mut reg, _rx) = registrar();
        reg.add_offering(paid_workshop("ws", 5)).unwrap();
        reg.enroll("alice", "ws", 0).unwrap();
        reg.enroll("bob", "ws", 0).unwrap();

        assert!(matches!(
            reg.set_capacity("ws", 1),
            Err(EnrollmentError::OfferingLocked { .. })
        ));
        assert_eq!(reg.set_capacity("ws", 2).unwrap().max_capacity, 2);
    }

    // =========================================================================
    // Conflicts
    // =========================================================================

    #[test]
    fn back_to_back_workshops_enroll_without_warnings() {
        let (mut reg, _rx) = registrar();
        reg.add_offering(Offering::workshop("ws_9", START + 9 * HOUR_MS, START + 10 * HOUR_MS, 5, 0))
            .unwrap();
        reg.add_offering(Offering::workshop("ws_10", START + 10 * HOUR_MS, START + 11 * HOUR_MS, 5, 0))
            .unwrap();

        reg.enroll("alice", "ws_9", 0).unwrap();
        assert!(!reg.has_conflict("alice", "ws_10").unwrap());
        let outcome = reg.enroll("alice", "ws_10", 0).unwrap();
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn overlapping_workshop_enrolls_with_warning() {
        let (mut reg, _rx) = registrar();
        reg.add_offering(Offering::workshop("ws_a", START, START + 2 * HOUR_MS, 5, 0))
            .unwrap();
        reg.add_offering(Offering::workshop("ws_b", START + HOUR_MS, START + 3 * HOUR_MS, 5, 0))
            .unwrap();

        reg.enroll("alice", "ws_a", 0).unwrap();
        assert_eq!(reg.conflicts("alice", "ws_b").unwrap(), vec!["ws_a".to_string()]);
        let outcome = reg.enroll("alice", "ws_b", 0).unwrap();
        assert_eq!(outcome.warnings, vec!["ws_a".to_string()]);
    }

    #[test]
    fn overlapping_course_is_blocked() {
        let (mut reg, _rx) = registrar();
        let term_end = START + 70 * DAY_MS;
        let slot = WeeklySlot::new(DayOfWeek::Thursday, 18 * 60, 20 * 60);
        let later = WeeklySlot::new(DayOfWeek::Thursday, 19 * 60, 21 * 60);
        reg.add_offering(Offering::course("c_a", START, term_end, slot, 5, 0))
            .unwrap();
        reg.add_offering(Offering::course("c_b", START, term_end, later, 5, 0))
            .unwrap();

        reg.enroll("alice", "c_a", 0).unwrap();
        let err = reg.enroll("alice", "c_b", 0).unwrap_err();
        assert!(matches!(err, EnrollmentError::ScheduleConflict { .. }));
        assert_eq!(reg.enrollments_for_learner("alice").unwrap().len(), 1);
    }

    #[test]
    fn cancelled_enrollments_stop_counting_as_commitments() {
        let (mut reg, _rx) = registrar();
        reg.add_offering(Offering::workshop("ws_a", START, START + 2 * HOUR_MS, 5, 0))
            .unwrap();
        reg.add_offering(Offering::workshop("ws_b", START + HOUR_MS, START + 3 * HOUR_MS, 5, 0))
            .unwrap();

        let held = reg.enroll("alice", "ws_a", 0).unwrap().enrollment;
        reg.cancel(&held.id, 0).unwrap();
        assert!(!reg.has_conflict("alice", "ws_b").unwrap());
    }

    // =========================================================================
    // Payment and cancellation
    // =========================================================================

    #[test]
    fn payment_confirms_pending_enrollment() {
        let (mut reg, rx) = registrar();
        reg.add_offering(paid_workshop("ws", 5)).unwrap();

        let enrollment = reg.enroll("alice", "ws", 0).unwrap().enrollment;
        assert_eq!(enrollment.state, EnrollmentState::PendingPayment);
        assert_eq!(
            reg.payment_time_remaining(&enrollment.id, 10 * MINUTE_MS).unwrap(),
            Some(20 * MINUTE_MS)
        );

        let err = reg.record_payment(&approve(&enrollment.id, 100), MINUTE_MS).unwrap_err();
        assert!(matches!(err, EnrollmentError::PaymentMismatch { .. }));
        assert_eq!(
            reg.enrollment(&enrollment.id).unwrap().state,
            EnrollmentState::PendingPayment
        );

        let paid = reg.record_payment(&approve(&enrollment.id, 2500), MINUTE_MS).unwrap();
        assert_eq!(paid.state, EnrollmentState::Confirmed);
        assert_eq!(paid.updated_at, MINUTE_MS);
        assert_eq!(reg.payment_time_remaining(&enrollment.id, MINUTE_MS).unwrap(), None);

        // Redelivered callback
        reg.record_payment(&approve(&enrollment.id, 2500), 2 * MINUTE_MS).unwrap();
        assert_eq!(kinds(&rx), vec!["enrollment_confirmed"]);
    }

    #[test]
    fn decline_inside_grace_keeps_the_seat() {
        let (mut reg, _rx) = registrar();
        reg.add_offering(paid_workshop("ws", 5)).unwrap();
        let enrollment = reg.enroll("alice", "ws", 0).unwrap().enrollment;

        let after = reg.record_payment(&decline(&enrollment.id), 5 * MINUTE_MS).unwrap();
        assert_eq!(after.state, EnrollmentState::PendingPayment);
        assert_eq!(reg.available_seats("ws").unwrap(), 4);
    }

    #[test]
    fn decline_after_grace_cancels_and_promotes() {
        let (mut reg, rx) = registrar();
        reg.add_offering(paid_workshop("ws", 1)).unwrap();
        let enrollment = reg.enroll("alice", "ws", 0).unwrap().enrollment;
        let waiting = reg.join_waitlist("bob", "ws", MINUTE_MS).unwrap();

        let after = reg.record_payment(&decline(&enrollment.id), 31 * MINUTE_MS).unwrap();
        assert_eq!(after.state, EnrollmentState::Cancelled);
        assert_eq!(reg.waitlist("ws").unwrap()[0].id, waiting.id);
        assert_eq!(reg.waitlist("ws").unwrap()[0].state, WaitlistState::Notified);
        assert_eq!(kinds(&rx), vec!["enrollment_cancelled", "waitlist_seat_available"]);
    }

    #[test]
    fn cancel_two_hours_before_start_is_refused() {
        let (mut reg, _rx) = registrar();
        reg.add_offering(free_workshop("ws", 5)).unwrap();
        let enrollment = reg.enroll("alice", "ws", 0).unwrap().enrollment;

        let err = reg.cancel(&enrollment.id, START - 2 * HOUR_MS).unwrap_err();
        assert!(matches!(err, EnrollmentError::CancellationDeadlinePassed { .. }));
        assert_eq!(
            reg.enrollment(&enrollment.id).unwrap().state,
            EnrollmentState::Confirmed
        );
    }

    #[test]
    fn cancelling_twice_is_a_no_op() {
        let (mut reg, rx) = registrar();
        reg.add_offering(free_workshop("ws", 1)).unwrap();
        let enrollment = reg.enroll("alice", "ws", 0).unwrap().enrollment;
        reg.join_waitlist("bob", "ws", 1).unwrap();
        reg.join_waitlist("carol", "ws", 2).unwrap();
        rx.try_iter().count();

        let first = reg.cancel(&enrollment.id, 10).unwrap();
        let second = reg.cancel(&enrollment.id, 20).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.updated_at, 10);

        // Only one seat was freed, so only one learner hears about it
        assert_eq!(kinds(&rx), vec!["enrollment_cancelled", "waitlist_seat_available"]);
    }

    #[test]
    fn unknown_enrollment_is_not_found() {
        let (mut reg, _rx) = registrar();
        assert!(matches!(
            reg.cancel("enr_missing", 0),
            Err(EnrollmentError::NotFound { kind: "enrollment", .. })
        ));
    }

    #[test]
    fn completion_after_the_offering_ends() {
        let (mut reg, _rx) = registrar();
        reg.add_offering(free_workshop("ws", 5)).unwrap();
        let enrollment = reg.enroll("alice", "ws", 0).unwrap().enrollment;

        let early = reg.complete(&enrollment.id, Attendance::new(4, 4), START).unwrap_err();
        assert!(matches!(early, EnrollmentError::OfferingNotFinished { .. }));

        let ended = START + 3 * HOUR_MS;
        let low = reg.complete(&enrollment.id, Attendance::new(3, 4), ended).unwrap_err();
        assert!(matches!(low, EnrollmentError::AttendanceBelowThreshold { .. }));

        let done = reg.complete(&enrollment.id, Attendance::new(4, 5), ended).unwrap();
        assert_eq!(done.state, EnrollmentState::Completed);
        assert_eq!(reg.stats("ws").unwrap().completed, 1);
        // A completed learner no longer holds a seat
        assert_eq!(reg.available_seats("ws").unwrap(), 5);
    }

    // =========================================================================
    // Waitlist
    // =========================================================================

    #[test]
    fn join_waitlist_needs_a_full_offering() {
        let (mut reg, _rx) = registrar();
        reg.add_offering(free_workshop("ws", 2)).unwrap();
        assert!(matches!(
            reg.join_waitlist("alice", "ws", 0),
            Err(EnrollmentError::SeatsAvailable { available: 2, .. })
        ));
    }

    #[test]
    fn waitlist_promotes_in_registration_order() {
        let (mut reg, rx) = registrar();
        reg.add_offering(free_workshop("ws", 1)).unwrap();
        let holder = reg.enroll("holder", "ws", 0).unwrap().enrollment;

        // Joined out of id order, registered t1 < t2 < t3
        let a = reg.join_waitlist("alice", "ws", 100).unwrap();
        let b = reg.join_waitlist("bob", "ws", 200).unwrap();
        let c = reg.join_waitlist("carol", "ws", 300).unwrap();
        assert_eq!(reg.waitlist_position(&c.id).unwrap(), Some(3));
        rx.try_iter().count();

        reg.cancel(&holder.id, 1_000).unwrap();

        let notified: Vec<Notification> = rx.try_iter().collect();
        let promoted: Vec<&str> = notified
            .iter()
            .filter(|n| n.kind() == "waitlist_seat_available")
            .map(|n| n.learner_id())
            .collect();
        assert_eq!(promoted, vec!["alice"]);
        assert_eq!(reg.waitlist_position(&a.id).unwrap(), None);
        assert_eq!(reg.waitlist_position(&b.id).unwrap(), Some(1));
        assert_eq!(reg.waitlist_position(&c.id).unwrap(), Some(2));
    }

    #[test]
    fn enrolling_closes_the_learners_waitlist_entry() {
        let (mut reg, _rx) = registrar();
        reg.add_offering(free_workshop("ws", 1)).unwrap();
        let holder = reg.enroll("holder", "ws", 0).unwrap().enrollment;
        let entry = reg.join_waitlist("alice", "ws", 1).unwrap();

        reg.cancel(&holder.id, 2).unwrap();
        reg.enroll("alice", "ws", 3).unwrap();

        let stored = &reg.waitlist("ws").unwrap()[0];
        assert_eq!(stored.id, entry.id);
        assert_eq!(stored.state, WaitlistState::Cancelled);
    }

    #[test]
    fn waitlist_join_twice_and_leave() {
        let (mut reg, _rx) = registrar();
        reg.add_offering(free_workshop("ws", 1)).unwrap();
        reg.enroll("holder", "ws", 0).unwrap();
        let entry = reg.join_waitlist("alice", "ws", 1).unwrap();

        assert!(matches!(
            reg.join_waitlist("alice", "ws", 2),
            Err(EnrollmentError::AlreadyQueued { .. })
        ));
        assert!(matches!(
            reg.join_waitlist("holder", "ws", 2),
            Err(EnrollmentError::DuplicateEnrollment { .. })
        ));

        let left = reg.leave_waitlist(&entry.id).unwrap();
        assert_eq!(left.state, WaitlistState::Cancelled);
        assert_eq!(reg.leave_waitlist(&entry.id).unwrap(), left);
        assert!(reg.join_waitlist("alice", "ws", 3).is_ok());
    }

    #[test]
    fn explicit_promotion_of_several_seats() {
        let (mut reg, _rx) = registrar();
        reg.add_offering(free_workshop("ws", 1)).unwrap();
        reg.enroll("holder", "ws", 0).unwrap();
        for (i, learner) in ["a", "b", "c"].into_iter().enumerate() {
            reg.join_waitlist(learner, "ws", i as u64).unwrap();
        }

        let promoted = reg.promote("ws", 2).unwrap();
        let learners: Vec<&str> = promoted.iter().map(|e| e.learner_id.as_str()).collect();
        assert_eq!(learners, vec!["a", "b"]);
        assert!(reg.promote("ws", 0).unwrap().is_empty());
    }

    // =========================================================================
    // Sweeps
    // =========================================================================

    #[test]
    fn expiry_sweep_cancels_after_thirty_minutes() {
        let (mut reg, rx) = registrar();
        reg.add_offering(paid_workshop("ws", 5)).unwrap();
        let enrollment = reg.enroll("alice", "ws", 0).unwrap().enrollment;
        rx.try_iter().count();

        let early = reg.sweep_expired_payments(29 * MINUTE_MS).unwrap();
        assert_eq!(early.processed, 0);
        assert_eq!(
            reg.enrollment(&enrollment.id).unwrap().state,
            EnrollmentState::PendingPayment
        );

        let report = reg.sweep_expired_payments(31 * MINUTE_MS).unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.processed, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(
            reg.enrollment(&enrollment.id).unwrap().state,
            EnrollmentState::Cancelled
        );
        assert_eq!(reg.available_seats("ws").unwrap(), 5);
        assert_eq!(kinds(&rx), vec!["payment_grace_expired", "enrollment_cancelled"]);

        // Re-running finds nothing left to do
        let again = reg.sweep_expired_payments(40 * MINUTE_MS).unwrap();
        assert_eq!(again.examined, 0);
    }

    #[test]
    fn expiry_sweep_honours_configured_grace() {
        let (notifier, _rx) = ChannelNotifier::new();
        let mut reg = Registrar::new()
            .with_notifier(notifier)
            .with_config(RegistrarConfig {
                payment_grace_ms: 5 * MINUTE_MS,
                ..RegistrarConfig::default()
            });
        reg.add_offering(paid_workshop("ws", 5)).unwrap();
        reg.enroll("alice", "ws", 0).unwrap();

        assert_eq!(reg.sweep_expired_payments(6 * MINUTE_MS).unwrap().processed, 1);
    }

    #[test]
    fn reminder_sweep_sends_each_reminder_once() {
        let (mut reg, rx) = registrar();
        reg.add_offering(free_workshop("ws", 5)).unwrap();
        reg.enroll("alice", "ws", 0).unwrap();
        rx.try_iter().count();

        assert_eq!(reg.sweep_reminders(START - 48 * HOUR_MS).unwrap().processed, 0);

        assert_eq!(reg.sweep_reminders(START - 23 * HOUR_MS).unwrap().processed, 1);
        assert_eq!(reg.sweep_reminders(START - 22 * HOUR_MS).unwrap().processed, 0);

        assert_eq!(reg.sweep_reminders(START - 30 * MINUTE_MS).unwrap().processed, 1);
        assert_eq!(reg.sweep_reminders(START - 10 * MINUTE_MS).unwrap().processed, 0);

        let leads: Vec<u64> = rx
            .try_iter()
            .filter_map(|n| match n {
                Notification::StartsSoon { lead_ms, .. } => Some(lead_ms),
                _ => None,
            })
            .collect();
        assert_eq!(leads, vec![24 * HOUR_MS, HOUR_MS]);
    }

    #[test]
    fn reminder_sweep_skips_pending_enrollments() {
        let (mut reg, _rx) = registrar();
        reg.add_offering(paid_workshop("ws", 5)).unwrap();
        reg.enroll("alice", "ws", START - 2 * HOUR_MS).unwrap();
        assert_eq!(reg.sweep_reminders(START - HOUR_MS).unwrap().examined, 0);
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    #[test]
    fn notifier_failure_does_not_undo_the_operation() {
        let mut reg = Registrar::new().with_notifier(RejectingNotifier);
        reg.add_offering(free_workshop("ws", 2)).unwrap();

        let outcome = reg.enroll("alice", "ws", 0).unwrap();
        assert_eq!(
            reg.enrollment(&outcome.enrollment.id).unwrap().state,
            EnrollmentState::Confirmed
        );
    }

    #[test]
    fn failed_operations_send_nothing() {
        let (mut reg, rx) = registrar();
        reg.add_offering(free_workshop("ws", 1)).unwrap();
        reg.enroll("alice", "ws", 0).unwrap();
        rx.try_iter().count();

        assert!(reg.enroll("bob", "ws", 0).is_err());
        assert!(kinds(&rx).is_empty());
    }

    // =========================================================================
    // SQLite backend
    // =========================================================================

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_registrars_racing_for_the_last_seat() {
        let path = std::env::temp_dir().join(format!("rollcall-race-{}.db", std::process::id()));
        let path = path.to_string_lossy().to_string();

        Registrar::with_sqlite(&path)
            .unwrap()
            .add_offering(free_workshop("ws", 1))
            .unwrap();

        let handles: Vec<_> = ["alice", "bob"]
            .into_iter()
            .map(|learner| {
                let path = path.clone();
                thread::spawn(move || {
                    let mut reg = Registrar::with_sqlite(&path).unwrap();
                    reg.enroll(learner, "ws", 0)
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| r.is_ok())
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(
            Registrar::with_sqlite(&path).unwrap().available_seats("ws").unwrap(),
            0
        );

        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path, suffix));
        }
    }
}
