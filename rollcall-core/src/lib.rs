//! # rollcall-core
//!
//! Enrollment kernel for courses and workshops.
//! Provides seat accounting, schedule-conflict detection, the enrollment
//! lifecycle and FIFO waitlists over a pluggable transactional store.

pub mod capacity;
pub mod client;
pub mod config;
pub mod conflict;
pub mod error;
pub mod infrastructure;
#[path = "infrastructure_in_memory.rs"]
pub mod infrastructure_in_memory;
#[cfg(feature = "sqlite")]
#[path = "infrastructure_sqlite.rs"]
pub mod infrastructure_sqlite;
pub mod notify;
pub mod state;
pub mod types;
pub mod waitlist;

#[cfg(test)]
mod client_test;
