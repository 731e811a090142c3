//! Tenant and actor context resolved by the surrounding platform.

/// Unique identifier for an organization (tenant).
pub type OrgId = String;

/// Unique identifier for a school within an organization.
pub type SchoolId = String;

/// Unique identifier for the acting user.
pub type ActorId = String;

/// The tenant scope and acting user for one operation.
///
/// Resolution of the organization, school, and user happens upstream
/// (authentication middleware); this crate only threads the resolved
/// identifiers through its operations and audit records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    /// The organization (tenant) every lookup is scoped to.
    pub organization_id: OrgId,

    /// The school within the organization.
    pub school_id: SchoolId,

    /// The acting user. May be empty when the mutation originates from
    /// the platform itself; the audit log substitutes the system sentinel.
    pub actor_id: ActorId,
}

impl TenantContext {
    /// Creates a context for the given organization, school, and actor.
    #[must_use]
    pub fn new(
        organization_id: impl Into<OrgId>,
        school_id: impl Into<SchoolId>,
        actor_id: impl Into<ActorId>,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            school_id: school_id.into(),
            actor_id: actor_id.into(),
        }
    }
}
