//! `SQLite`-backed storage for the graduation core.
//!
//! One database holds batches, eligibility snapshots, organization
//! counters, issued certificates, and the audit log, so a single
//! transaction can span a mutation and everything that must commit or
//! roll back with it (snapshot replacement, counter increments, audit
//! entries).
//!
//! The write path always uses immediate transactions: the write lock is
//! taken up front, making every read-check-then-write sequence atomic
//! against concurrent writers.

pub(crate) mod sqlite;

#[cfg(test)]
mod tests;

pub use sqlite::{GraduationStore, StoreError};
