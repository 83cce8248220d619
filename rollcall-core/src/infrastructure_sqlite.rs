//! SQLite-backed EnrollmentStore implementation.
//! Provides persistent enrollment storage across runs.
//!
//! Enable with the `sqlite` feature flag:
//! ```toml
//! rollcall-core = { path = "../rollcall-core", features = ["sqlite"] }
//! ```

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::StoreError;
use crate::infrastructure::EnrollmentStore;
use crate::types::*;

const OFFERING_COLUMNS: &str = "id, title, kind, status, starts_at, ends_at, weekly_day, slot_start, slot_end, max_capacity, min_capacity, price";
const ENROLLMENT_COLUMNS: &str =
    "id, learner_id, offering_id, state, created_at, updated_at, reminder_24h_sent, reminder_1h_sent";
const WAITLIST_COLUMNS: &str = "id, learner_id, offering_id, state, registered_at, sequence";

/// A persistent enrollment store backed by SQLite.
///
/// Uses WAL mode for concurrent read performance. Transactions are opened with
/// `BEGIN IMMEDIATE`, so the write lock is held from the seat count to the insert.
pub struct SqliteEnrollmentStore {
    conn: Connection,
    in_transaction: bool,
}

impl SqliteEnrollmentStore {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent read performance
        // journal_mode answers with the resulting mode
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS offerings (
                id           TEXT PRIMARY KEY,
                title        TEXT NOT NULL,
                kind         TEXT NOT NULL,
                status       TEXT NOT NULL,
                starts_at    INTEGER NOT NULL,
                ends_at      INTEGER NOT NULL,
                weekly_day   TEXT,
                slot_start   INTEGER,
                slot_end     INTEGER,
                max_capacity INTEGER NOT NULL,
                min_capacity INTEGER NOT NULL DEFAULT 0,
                price        INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS enrollments (
                id                TEXT PRIMARY KEY,
                learner_id        TEXT NOT NULL,
                offering_id       TEXT NOT NULL REFERENCES offerings(id),
                state             TEXT NOT NULL,
                created_at        INTEGER NOT NULL,
                updated_at        INTEGER NOT NULL,
                reminder_24h_sent INTEGER NOT NULL DEFAULT 0,
                reminder_1h_sent  INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_enrollments_offering ON enrollments(offering_id);
            CREATE INDEX IF NOT EXISTS idx_enrollments_learner ON enrollments(learner_id);
            CREATE INDEX IF NOT EXISTS idx_enrollments_state ON enrollments(state);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_enrollments_active_pair
                ON enrollments(learner_id, offering_id)
                WHERE state IN ('pending_payment', 'confirmed');

            CREATE TABLE IF NOT EXISTS waitlist_entries (
                id            TEXT PRIMARY KEY,
                learner_id    TEXT NOT NULL,
                offering_id   TEXT NOT NULL REFERENCES offerings(id),
                state         TEXT NOT NULL DEFAULT 'active',
                registered_at INTEGER NOT NULL,
                sequence      INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_waitlist_offering
                ON waitlist_entries(offering_id, registered_at, sequence);",
        )?;

        Ok(Self {
            conn,
            in_transaction: false,
        })
    }

    fn parse_column<T>(idx: usize, raw: &str, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
        parse(raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Text,
                format!("unexpected value '{}'", raw).into(),
            )
        })
    }

    fn row_to_offering(row: &Row) -> rusqlite::Result<Offering> {
        let kind: String = row.get(2)?;
        let status: String = row.get(3)?;
        let weekly_day: Option<String> = row.get(6)?;

        let weekly = match weekly_day {
            Some(day) => Some(WeeklySlot::new(
                Self::parse_column(6, &day, DayOfWeek::parse)?,
                row.get(7)?,
                row.get(8)?,
            )),
            None => None,
        };

        Ok(Offering {
            id: row.get(0)?,
            title: row.get(1)?,
            kind: Self::parse_column(2, &kind, OfferingKind::parse)?,
            status: Self::parse_column(3, &status, OfferingStatus::parse)?,
            starts_at: row.get(4)?,
            ends_at: row.get(5)?,
            weekly,
            max_capacity: row.get(9)?,
            min_capacity: row.get(10)?,
            price: row.get(11)?,
        })
    }

    fn row_to_enrollment(row: &Row) -> rusqlite::Result<Enrollment> {
        let state: String = row.get(3)?;

        Ok(Enrollment {
            id: row.get(0)?,
            learner_id: row.get(1)?,
            offering_id: row.get(2)?,
            state: Self::parse_column(3, &state, EnrollmentState::parse)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            reminder_24h_sent: row.get(6)?,
            reminder_1h_sent: row.get(7)?,
        })
    }

    fn row_to_waitlist_entry(row: &Row) -> rusqlite::Result<WaitlistEntry> {
        let state: String = row.get(3)?;

        Ok(WaitlistEntry {
            id: row.get(0)?,
            learner_id: row.get(1)?,
            offering_id: row.get(2)?,
            state: Self::parse_column(3, &state, WaitlistState::parse)?,
            registered_at: row.get(4)?,
            sequence: row.get(5)?,
        })
    }

    fn query_enrollments(&self, filter: &str, value: &str) -> Result<Vec<Enrollment>, StoreError> {
        let sql = format!(
            "SELECT {} FROM enrollments WHERE {} = ?1 ORDER BY created_at, id",
            ENROLLMENT_COLUMNS, filter
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let found = stmt
            .query_map(params![value], Self::row_to_enrollment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(found)
    }
}

impl EnrollmentStore for SqliteEnrollmentStore {
    fn begin(&mut self) -> Result<(), StoreError> {
        if self.in_transaction {
            return Err(StoreError::NestedTransaction);
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        if !self.in_transaction {
            return Err(StoreError::NoTransaction);
        }
        self.conn.execute_batch("COMMIT")?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        if !self.in_transaction {
            return Err(StoreError::NoTransaction);
        }
        self.in_transaction = false;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn get_offering(&self, offering_id: &str) -> Result<Option<Offering>, StoreError> {
        let sql = format!("SELECT {} FROM offerings WHERE id = ?1", OFFERING_COLUMNS);
        let offering = self
            .conn
            .query_row(&sql, params![offering_id], Self::row_to_offering)
            .optional()?;
        Ok(offering)
    }

    fn put_offering(&mut self, offering: &Offering) -> Result<(), StoreError> {
        let slot = offering.weekly.as_ref();
        self.conn.execute(
            "INSERT OR REPLACE INTO offerings (id, title, kind, status, starts_at, ends_at, weekly_day, slot_start, slot_end, max_capacity, min_capacity, price)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                offering.id,
                offering.title,
                offering.kind.as_str(),
                offering.status.as_str(),
                offering.starts_at,
                offering.ends_at,
                slot.map(|s| s.day.as_str()),
                slot.map(|s| s.start_minute),
                slot.map(|s| s.end_minute),
                offering.max_capacity,
                offering.min_capacity,
                offering.price,
            ],
        )?;
        Ok(())
    }

    fn get_enrollment(&self, enrollment_id: &str) -> Result<Option<Enrollment>, StoreError> {
        let sql = format!("SELECT {} FROM enrollments WHERE id = ?1", ENROLLMENT_COLUMNS);
        let enrollment = self
            .conn
            .query_row(&sql, params![enrollment_id], Self::row_to_enrollment)
            .optional()?;
        Ok(enrollment)
    }

    fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO enrollments (id, learner_id, offering_id, state, created_at, updated_at, reminder_24h_sent, reminder_1h_sent)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                enrollment.id,
                enrollment.learner_id,
                enrollment.offering_id,
                enrollment.state.as_str(),
                enrollment.created_at,
                enrollment.updated_at,
                enrollment.reminder_24h_sent,
                enrollment.reminder_1h_sent,
            ],
        )?;
        Ok(())
    }

    fn update_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), StoreError> {
        let rows = self.conn.execute(
            "UPDATE enrollments
             SET state = ?1, updated_at = ?2, reminder_24h_sent = ?3, reminder_1h_sent = ?4
             WHERE id = ?5",
            params![
                enrollment.state.as_str(),
                enrollment.updated_at,
                enrollment.reminder_24h_sent,
                enrollment.reminder_1h_sent,
                enrollment.id,
            ],
        )?;
        if rows == 0 {
            return Err(StoreError::Corrupt {
                table: "enrollments",
                id: enrollment.id.clone(),
                detail: "update of missing row".to_string(),
            });
        }
        Ok(())
    }

    fn enrollments_for_offering(&self, offering_id: &str) -> Result<Vec<Enrollment>, StoreError> {
        self.query_enrollments("offering_id", offering_id)
    }

    fn enrollments_for_learner(&self, learner_id: &str) -> Result<Vec<Enrollment>, StoreError> {
        self.query_enrollments("learner_id", learner_id)
    }

    fn enrollments_in_state(&self, state: EnrollmentState) -> Result<Vec<Enrollment>, StoreError> {
        self.query_enrollments("state", state.as_str())
    }

    fn get_waitlist_entry(&self, entry_id: &str) -> Result<Option<WaitlistEntry>, StoreError> {
        let sql = format!("SELECT {} FROM waitlist_entries WHERE id = ?1", WAITLIST_COLUMNS);
        let entry = self
            .conn
            .query_row(&sql, params![entry_id], Self::row_to_waitlist_entry)
            .optional()?;
        Ok(entry)
    }

    fn insert_waitlist_entry(&mut self, mut entry: WaitlistEntry) -> Result<WaitlistEntry, StoreError> {
        entry.sequence = self.conn.query_row(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM waitlist_entries",
            [],
            |row| row.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO waitlist_entries (id, learner_id, offering_id, state, registered_at, sequence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.id,
                entry.learner_id,
                entry.offering_id,
                entry.state.as_str(),
                entry.registered_at,
                entry.sequence,
            ],
        )?;
        Ok(entry)
    }

    fn update_waitlist_entry(&mut self, entry: &WaitlistEntry) -> Result<(), StoreError> {
        let rows = self.conn.execute(
            "UPDATE waitlist_entries SET state = ?1 WHERE id = ?2",
            params![entry.state.as_str(), entry.id],
        )?;
        if rows == 0 {
            return Err(StoreError::Corrupt {
                table: "waitlist_entries",
                id: entry.id.clone(),
                detail: "update of missing row".to_string(),
            });
        }
        Ok(())
    }

    fn waitlist_for_offering(&self, offering_id: &str) -> Result<Vec<WaitlistEntry>, StoreError> {
        let sql = format!(
            "SELECT {} FROM waitlist_entries WHERE offering_id = ?1 ORDER BY registered_at, sequence",
            WAITLIST_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![offering_id], Self::row_to_waitlist_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}
