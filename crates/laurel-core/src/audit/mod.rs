//! Append-only audit log for certificate operations.
//!
//! Every mutating action in the graduation core appends one record here,
//! inside the same transaction as the mutation it describes: a rolled-back
//! mutation can never leave an orphan audit entry, and a committed
//! mutation can never miss one. No code path updates or deletes records.


use chrono::{DateTime, Utc};
use rusqlite::{Transaction, params};
use serde_json::Value;

use crate::store::{GraduationStore, StoreError};
use crate::tenant::{ActorId, OrgId, SchoolId, TenantContext};

/// Sentinel actor recorded when the acting user cannot be resolved.
///
/// Substituted rather than failing the call: losing the mutation over a
/// missing actor identity would be worse than an anonymous entry.
pub const SYSTEM_ACTOR: &str = "system";

/// Entity type of batch-level audit entries.
pub const ENTITY_BATCH: &str = "graduation_batch";

/// Entity type of certificate-level audit entries.
pub const ENTITY_CERTIFICATE: &str = "issued_certificate";

/// The auditable actions of the graduation core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum AuditAction {
    /// A batch was created.
    Create,

    /// A batch's eligibility snapshot was (re)generated.
    GenerateStudents,

    /// A batch was approved.
    Approve,

    /// A certificate was issued.
    Issue,

    /// A certificate's rendered PDF was attached.
    RenderCompleted,
}

impl AuditAction {
    /// Returns the action as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::GenerateStudents => "generate_students",
            Self::Approve => "approve",
            Self::Issue => "issue",
            Self::RenderCompleted => "render_completed",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One audit record.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    /// Sequence number assigned on append, `None` before persistence.
    pub seq: Option<i64>,

    /// Organization the action happened in.
    pub organization_id: OrgId,

    /// School the action happened in.
    pub school_id: SchoolId,

    /// The kind of entity acted on ([`ENTITY_BATCH`] or
    /// [`ENTITY_CERTIFICATE`]).
    pub entity_type: String,

    /// The entity acted on.
    pub entity_id: String,

    /// What happened.
    pub action: String,

    /// Action-specific details.
    pub metadata: Value,

    /// Who performed the action ([`SYSTEM_ACTOR`] when unresolvable).
    pub performed_by: ActorId,

    /// When the action was performed.
    pub performed_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Builds a record for the given action with the current timestamp.
    ///
    /// An empty or whitespace actor in `ctx` is replaced by
    /// [`SYSTEM_ACTOR`].
    #[must_use]
    pub fn new(
        ctx: &TenantContext,
        entity_type: &str,
        entity_id: impl Into<String>,
        action: AuditAction,
        metadata: Value,
    ) -> Self {
        let performed_by = if ctx.actor_id.trim().is_empty() {
            SYSTEM_ACTOR.to_owned()
        } else {
            ctx.actor_id.clone()
        };

        Self {
            seq: None,
            organization_id: ctx.organization_id.clone(),
            school_id: ctx.school_id.clone(),
            entity_type: entity_type.to_owned(),
            entity_id: entity_id.into(),
            action: action.as_str().to_owned(),
            metadata,
            performed_by,
            performed_at: Utc::now(),
        }
    }
}

/// Appends one record inside the caller's transaction.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub(crate) fn append(tx: &Transaction<'_>, record: &AuditRecord) -> Result<(), StoreError> {
    let metadata = serde_json::to_string(&record.metadata)?;
    tx.execute(
        "INSERT INTO certificate_audit_log (organization_id, school_id, entity_type, entity_id, \
         action, metadata, performed_by, performed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.organization_id,
            record.school_id,
            record.entity_type,
            record.entity_id,
            record.action,
            metadata,
            record.performed_by,
            record.performed_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Read access to the audit log.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    store: GraduationStore,
}

impl AuditLogger {
    /// Creates a logger over the given store.
    #[must_use]
    pub fn new(store: GraduationStore) -> Self {
        Self { store }
    }

    /// Lists the records for one entity in append order.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure or a corrupt row.
    pub fn entries_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        let conn = self.store.lock();
        let mut stmt = conn.prepare(
            "SELECT seq, organization_id, school_id, entity_type, entity_id, action, metadata, \
             performed_by, performed_at
             FROM certificate_audit_log
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![entity_type, entity_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?;

        let mut records = Vec::new();
        for raw in rows {
            let (
                seq,
                organization_id,
                school_id,
                entity_type,
                entity_id,
                action,
                metadata,
                performed_by,
                performed_at,
            ) = raw?;
            let metadata: Value = serde_json::from_str(&metadata)?;
            let performed_at = DateTime::parse_from_rfc3339(&performed_at)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| StoreError::Corrupt {
                    entity: "certificate_audit_log",
                    field: "performed_at",
                    value: performed_at,
                })?;
            records.push(AuditRecord {
                seq: Some(seq),
                organization_id,
                school_id,
                entity_type,
                entity_id,
                action,
                metadata,
                performed_by,
                performed_at,
            });
        }
        Ok(records)
    }
}
