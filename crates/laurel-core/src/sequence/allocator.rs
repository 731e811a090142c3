//! Counter keys, number formatting, and the allocator itself.

use chrono::{Datelike, NaiveDate};
use rusqlite::{OptionalExtension, Transaction, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::store::{GraduationStore, StoreError};
use crate::tenant::TenantContext;

/// Reduces free text to a slug: lowercase, alphanumeric runs joined by
/// single hyphens.
#[must_use]
pub fn slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_separator = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('-');
            }
            pending_separator = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }
    out
}

/// The composite key of one organization counter.
///
/// Encodes certificate type, school, and year, so sequences per school
/// and per year never interleave.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    value: String,
}

impl CounterKey {
    /// Builds the key for a certificate type, school, and year.
    #[must_use]
    pub fn new(certificate_type: &str, school_id: &str, year: i32) -> Self {
        Self {
            value: format!("{}-{}-{}", slug(certificate_type), school_id, year),
        }
    }

    /// Returns the key as stored in the counter table.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Certificate number layout.
///
/// Renders `{prefix}-{TYPE}-{YEAR}-{SEQ}` with the sequence zero-padded
/// to `pad_width` digits (wider values render unpadded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberFormat {
    /// Leading prefix of every certificate number.
    pub prefix: String,

    /// Minimum digit count of the sequence component.
    pub pad_width: usize,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            prefix: "PFX".to_owned(),
            pad_width: 4,
        }
    }
}

impl NumberFormat {
    /// Formats one allocated value as a certificate number.
    #[must_use]
    pub fn render(&self, certificate_type: &str, year: i32, sequence: i64) -> String {
        format!(
            "{}-{}-{}-{:0width$}",
            self.prefix,
            slug(certificate_type).to_uppercase(),
            year,
            sequence,
            width = self.pad_width,
        )
    }
}

/// Allocates sequential certificate numbers per (organization, key).
#[derive(Debug, Clone)]
pub struct SequenceNumberAllocator {
    store: GraduationStore,
    format: NumberFormat,
}

impl SequenceNumberAllocator {
    /// Creates an allocator over the given store.
    #[must_use]
    pub fn new(store: GraduationStore, format: NumberFormat) -> Self {
        Self { store, format }
    }

    /// Allocates the next number for (organization, type, school, year)
    /// and returns it formatted.
    ///
    /// Opens its own immediate transaction; callers that already hold a
    /// transaction use [`next_value`] instead so the increment shares
    /// their commit-or-rollback fate.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure; nothing is consumed in that
    /// case.
    pub fn generate(
        &self,
        ctx: &TenantContext,
        certificate_type: &str,
        date: NaiveDate,
    ) -> Result<String, StoreError> {
        let year = date.year();
        let key = CounterKey::new(certificate_type, &ctx.school_id, year);

        let mut conn = self.store.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = next_value(&tx, &ctx.organization_id, &key)?;
        tx.commit()?;

        Ok(self.format.render(certificate_type, year, value))
    }

    /// Returns the number layout this allocator renders with.
    #[must_use]
    pub const fn format(&self) -> &NumberFormat {
        &self.format
    }
}

/// Increments the counter for (organization, key) inside the caller's
/// transaction and returns the new value.
///
/// The counter row is created at zero on first use, so the first value
/// ever returned for a key is 1. The caller's transaction must be
/// immediate: the write lock it holds is what serializes concurrent
/// increments.
///
/// # Errors
///
/// Returns an error if the counter row cannot be read or written.
pub(crate) fn next_value(
    tx: &Transaction<'_>,
    org: &str,
    key: &CounterKey,
) -> Result<i64, StoreError> {
    let current: Option<i64> = tx
        .query_row(
            "SELECT last_value FROM org_counters
             WHERE organization_id = ?1 AND counter_type = ?2",
            params![org, key.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    let next = match current {
        Some(value) => {
            tx.execute(
                "UPDATE org_counters SET last_value = ?1
                 WHERE organization_id = ?2 AND counter_type = ?3",
                params![value + 1, org, key.as_str()],
            )?;
            value + 1
        }
        None => {
            tx.execute(
                "INSERT INTO org_counters (organization_id, counter_type, last_value)
                 VALUES (?1, ?2, 1)",
                params![org, key.as_str()],
            )?;
            1
        }
    };

    debug!(org, key = key.as_str(), value = next, "allocated sequence value");
    Ok(next)
}
