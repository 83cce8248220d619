//! Outbound notifications. The registrar hands these over after a transition has been
//! committed; delivery is best-effort and never affects the transition itself.

use std::sync::mpsc::{self, Receiver, Sender};

use serde::Serialize;
use thiserror::Error;

use crate::types::{Enrollment, WaitlistEntry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    EnrollmentConfirmed { enrollment: Enrollment },
    EnrollmentCancelled { enrollment: Enrollment },
    /// A seat opened up for a waitlisted learner
    WaitlistSeatAvailable { entry: WaitlistEntry },
    /// The sweep cancelled an unpaid enrollment
    PaymentGraceExpired { enrollment: Enrollment },
    /// Reminder that the offering starts within `lead_ms`
    StartsSoon { enrollment: Enrollment, lead_ms: u64 },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::EnrollmentConfirmed { .. } => "enrollment_confirmed",
            Notification::EnrollmentCancelled { .. } => "enrollment_cancelled",
            Notification::WaitlistSeatAvailable { .. } => "waitlist_seat_available",
            Notification::PaymentGraceExpired { .. } => "payment_grace_expired",
            Notification::StartsSoon { .. } => "starts_soon",
        }
    }

    pub fn learner_id(&self) -> &str {
        match self {
            Notification::EnrollmentConfirmed { enrollment }
            | Notification::EnrollmentCancelled { enrollment }
            | Notification::PaymentGraceExpired { enrollment }
            | Notification::StartsSoon { enrollment, .. } => &enrollment.learner_id,
            Notification::WaitlistSeatAvailable { entry } => &entry.learner_id,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification queue is closed")]
    Closed,
    #[error("notification rejected: {0}")]
    Rejected(String),
}

/// Contract for the notification collaborator. Implementations must not block.
pub trait Notifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Writes each notification as a tracing event
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            kind = notification.kind(),
            learner_id = %notification.learner_id(),
            "Notification queued"
        );
        Ok(())
    }
}

/// Queues notifications on an unbounded channel for an external dispatcher to drain.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: Sender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, Receiver<Notification>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.tx
            .send(notification.clone())
            .map_err(|_| NotifyError::Closed)
    }
}
