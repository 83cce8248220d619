use crate::types::{DAY_MS, DayOfWeek, MINUTE_MS, Offering, OfferingId, WeeklySlot};

/// Represents the outcome of a conflict check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictResult {
    /// No conflict found
    Ok,
    /// The candidate overlaps these already-held offerings
    Conflict { conflicting: Vec<OfferingId> },
}

impl ConflictResult {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ConflictResult::Conflict { .. })
    }
}

/// Pure schedule-overlap detection between offerings. Every window is half-open, so
/// back-to-back sessions never collide.
pub struct ConflictChecker;

impl ConflictChecker {
    /// `[s1, e1)` and `[s2, e2)` share at least one instant.
    pub fn windows_overlap(s1: u64, e1: u64, s2: u64, e2: u64) -> bool {
        s1 < e2 && s2 < e1
    }

    /// Whether two offerings ever meet at the same time.
    pub fn offerings_overlap(a: &Offering, b: &Offering) -> bool {
        match (&a.weekly, &b.weekly) {
            (None, None) => Self::windows_overlap(a.starts_at, a.ends_at, b.starts_at, b.ends_at),
            (Some(slot_a), Some(slot_b)) => {
                Self::windows_overlap(a.starts_at, a.ends_at, b.starts_at, b.ends_at)
                    && slot_a.day == slot_b.day
                    && Self::windows_overlap(
                        u64::from(slot_a.start_minute),
                        u64::from(slot_a.end_minute),
                        u64::from(slot_b.start_minute),
                        u64::from(slot_b.end_minute),
                    )
            }
            (Some(slot), None) => Self::slot_hits_window(a, slot, b),
            (None, Some(slot)) => Self::slot_hits_window(b, slot, a),
        }
    }

    /// Does any occurrence of `slot` during `weekly`'s term overlap `once`'s calendar window?
    fn slot_hits_window(weekly: &Offering, slot: &WeeklySlot, once: &Offering) -> bool {
        let from = weekly.starts_at.max(once.starts_at);
        let until = weekly.ends_at.min(once.ends_at);
        if from >= until {
            return false;
        }

        // Eight days always contain a full occurrence of every weekday.
        if until - from >= 8 * DAY_MS {
            return true;
        }

        let first_day = from / DAY_MS;
        let last_day = (until - 1) / DAY_MS;
        (first_day..=last_day).any(|day| {
            if DayOfWeek::from_epoch_day(day) != slot.day {
                return false;
            }
            let midnight = day * DAY_MS;
            let start = midnight + u64::from(slot.start_minute) * MINUTE_MS;
            let end = midnight + u64::from(slot.end_minute) * MINUTE_MS;
            Self::windows_overlap(start, end, from, until)
        })
    }

    /// Every held offering that overlaps `candidate`. The candidate itself is skipped.
    pub fn conflicts(candidate: &Offering, commitments: &[Offering]) -> Vec<OfferingId> {
        commitments
            .iter()
            .filter(|held| held.id != candidate.id)
            .filter(|held| Self::offerings_overlap(candidate, held))
            .map(|held| held.id.clone())
            .collect()
    }

    pub fn has_conflict(candidate: &Offering, commitments: &[Offering]) -> bool {
        commitments
            .iter()
            .any(|held| held.id != candidate.id && Self::offerings_overlap(candidate, held))
    }

    pub fn check(candidate: &Offering, commitments: &[Offering]) -> ConflictResult {
        let conflicting = Self::conflicts(candidate, commitments);
        if conflicting.is_empty() {
            ConflictResult::Ok
        } else {
            ConflictResult::Conflict { conflicting }
        }
    }
}
