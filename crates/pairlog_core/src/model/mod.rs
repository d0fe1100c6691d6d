//! Journal domain model.
//!
//! # Responsibility
//! - Define the record shape every provider and view agrees on.
//! - Define calendar-day semantics shared by filters and reports.
//!
//! # Invariants
//! - Every record is identified by a unique `RecordId`.
//! - Records are created and bulk-deleted, never edited.

pub mod day;
pub mod record;
