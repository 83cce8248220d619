use crate::error::StoreError;
use crate::types::{Enrollment, EnrollmentState, Offering, WaitlistEntry};

/// Defines the contract for enrollment storage backends.
///
/// Callers bracket every read-then-write with `begin`/`commit` (or `rollback`), so the seat
/// count read while admitting a learner is the one the insert is checked against.
pub trait EnrollmentStore {
    fn begin(&mut self) -> Result<(), StoreError>;
    fn commit(&mut self) -> Result<(), StoreError>;
    fn rollback(&mut self) -> Result<(), StoreError>;

    fn get_offering(&self, offering_id: &str) -> Result<Option<Offering>, StoreError>;

    /// Insert or replace an offering
    fn put_offering(&mut self, offering: &Offering) -> Result<(), StoreError>;

    fn get_enrollment(&self, enrollment_id: &str) -> Result<Option<Enrollment>, StoreError>;
    fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), StoreError>;
    fn update_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), StoreError>;

    /// All enrollments on an offering, any state
    fn enrollments_for_offering(&self, offering_id: &str) -> Result<Vec<Enrollment>, StoreError>;

    /// All enrollments of a learner, any state
    fn enrollments_for_learner(&self, learner_id: &str) -> Result<Vec<Enrollment>, StoreError>;

    fn enrollments_in_state(&self, state: EnrollmentState) -> Result<Vec<Enrollment>, StoreError>;

    fn get_waitlist_entry(&self, entry_id: &str) -> Result<Option<WaitlistEntry>, StoreError>;

    /// Insert a new entry. The store assigns `sequence` and returns the stored entry.
    fn insert_waitlist_entry(&mut self, entry: WaitlistEntry) -> Result<WaitlistEntry, StoreError>;
    fn update_waitlist_entry(&mut self, entry: &WaitlistEntry) -> Result<(), StoreError>;

    /// Entries for an offering, any state, ordered by `(registered_at, sequence)`
    fn waitlist_for_offering(&self, offering_id: &str) -> Result<Vec<WaitlistEntry>, StoreError>;
}
