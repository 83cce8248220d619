use crate::error::StoreError;
use crate::infrastructure::EnrollmentStore;
use crate::types::{Enrollment, EnrollmentState, Offering, WaitlistEntry};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
struct Tables {
    // Map of Offering ID -> Offering
    offerings: HashMap<String, Offering>,
    // Map of Enrollment ID -> Enrollment
    enrollments: HashMap<String, Enrollment>,
    // Map of Entry ID -> WaitlistEntry
    waitlist: HashMap<String, WaitlistEntry>,
    next_sequence: u64,
}

/// Process-local store. `begin` snapshots every table and `rollback` restores the snapshot.
#[derive(Debug, Default)]
pub struct InMemoryEnrollmentStore {
    tables: Tables,
    snapshot: Option<Tables>,
}

impl InMemoryEnrollmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted_enrollments(&self, keep: impl Fn(&Enrollment) -> bool) -> Vec<Enrollment> {
        let mut found: Vec<Enrollment> = self
            .tables
            .enrollments
            .values()
            .filter(|e| keep(e))
            .cloned()
            .collect();
        found.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        found
    }
}

impl EnrollmentStore for InMemoryEnrollmentStore {
    fn begin(&mut self) -> Result<(), StoreError> {
        if self.snapshot.is_some() {
            return Err(StoreError::NestedTransaction);
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or(StoreError::NoTransaction)
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        let snapshot = self.snapshot.take().ok_or(StoreError::NoTransaction)?;
        self.tables = snapshot;
        Ok(())
    }

    fn get_offering(&self, offering_id: &str) -> Result<Option<Offering>, StoreError> {
        Ok(self.tables.offerings.get(offering_id).cloned())
    }

    fn put_offering(&mut self, offering: &Offering) -> Result<(), StoreError> {
        self.tables
            .offerings
            .insert(offering.id.clone(), offering.clone());
        Ok(())
    }

    fn get_enrollment(&self, enrollment_id: &str) -> Result<Option<Enrollment>, StoreError> {
        Ok(self.tables.enrollments.get(enrollment_id).cloned())
    }

    fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), StoreError> {
        self.tables
            .enrollments
            .insert(enrollment.id.clone(), enrollment.clone());
        Ok(())
    }

    fn update_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), StoreError> {
        match self.tables.enrollments.get_mut(&enrollment.id) {
            Some(existing) => {
                *existing = enrollment.clone();
                Ok(())
            }
            None => Err(StoreError::Corrupt {
                table: "enrollments",
                id: enrollment.id.clone(),
                detail: "update of missing row".to_string(),
            }),
        }
    }

    fn enrollments_for_offering(&self, offering_id: &str) -> Result<Vec<Enrollment>, StoreError> {
        Ok(self.sorted_enrollments(|e| e.offering_id == offering_id))
    }

    fn enrollments_for_learner(&self, learner_id: &str) -> Result<Vec<Enrollment>, StoreError> {
        Ok(self.sorted_enrollments(|e| e.learner_id == learner_id))
    }

    fn enrollments_in_state(&self, state: EnrollmentState) -> Result<Vec<Enrollment>, StoreError> {
        Ok(self.sorted_enrollments(|e| e.state == state))
    }

    fn get_waitlist_entry(&self, entry_id: &str) -> Result<Option<WaitlistEntry>, StoreError> {
        Ok(self.tables.waitlist.get(entry_id).cloned())
    }

    fn insert_waitlist_entry(&mut self, mut entry: WaitlistEntry) -> Result<WaitlistEntry, StoreError> {
        self.tables.next_sequence += 1;
        entry.sequence = self.tables.next_sequence;
        self.tables.waitlist.insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    fn update_waitlist_entry(&mut self, entry: &WaitlistEntry) -> Result<(), StoreError> {
        match self.tables.waitlist.get_mut(&entry.id) {
            Some(existing) => {
                *existing = entry.clone();
                Ok(())
            }
            None => Err(StoreError::Corrupt {
                table: "waitlist_entries",
                id: entry.id.clone(),
                detail: "update of missing row".to_string(),
            }),
        }
    }

    fn waitlist_for_offering(&self, offering_id: &str) -> Result<Vec<WaitlistEntry>, StoreError> {
        let mut entries: Vec<WaitlistEntry> = self
            .tables
            .waitlist
            .values()
            .filter(|e| e.offering_id == offering_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.registered_at, e.sequence));
        Ok(entries)
    }
}
