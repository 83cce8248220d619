use serde::{Deserialize, Serialize};

pub type LearnerId = String;
pub type OfferingId = String;
pub type EnrollmentId = String;
pub type WaitlistEntryId = String;

pub const MINUTE_MS: u64 = 60 * 1000;
pub const HOUR_MS: u64 = 60 * MINUTE_MS;
pub const DAY_MS: u64 = 24 * HOUR_MS;
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Day of the week a recurring slot falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    /// Day of the week for a UTC day number counted from 1970-01-01 (a Thursday).
    pub fn from_epoch_day(day: u64) -> Self {
        Self::ALL[((day + 3) % 7) as usize]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }
}

/// A weekly recurring time slot, in minutes from midnight UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeeklySlot {
    pub day: DayOfWeek,
    pub start_minute: u32,
    /// Exclusive end
    pub end_minute: u32,
}

impl WeeklySlot {
    pub fn new(day: DayOfWeek, start_minute: u32, end_minute: u32) -> Self {
        Self {
            day,
            start_minute,
            end_minute,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.start_minute < self.end_minute && self.end_minute <= MINUTES_PER_DAY
    }
}

/// What sort of offering this is. Decides which conflict policy applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferingKind {
    /// One-off workshop or seminar
    Workshop,
    /// Term-long course with weekly sessions
    Course,
}

impl OfferingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OfferingKind::Workshop => "workshop",
            OfferingKind::Course => "course",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "workshop" => Some(OfferingKind::Workshop),
            "course" => Some(OfferingKind::Course),
            _ => None,
        }
    }
}

/// How a detected schedule conflict is treated at enrollment time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Surface the conflict as a warning and let the enrollment through
    Advisory,
    /// Reject the enrollment with `ScheduleConflict`
    Blocking,
}
