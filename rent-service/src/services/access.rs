//! Access gate.
//!
//! Role authorization runs first and is final for the request. The ownership
//! predicate is a separate check, evaluated only once the role check passed.

use service_core::error::AppError;
use thiserror::Error;

use crate::models::{Principal, Role};
use crate::services::metrics::record_denial;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(String),
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Unauthenticated => AppError::Unauthorized(anyhow::anyhow!(err)),
            AccessError::Forbidden(_) => AppError::Forbidden(anyhow::anyhow!(err)),
        }
    }
}

/// Set of roles allowed through a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSet(u8);

impl RoleSet {
    pub const fn of(roles: &[Role]) -> Self {
        let mut bits = 0u8;
        let mut i = 0;
        while i < roles.len() {
            bits |= Self::bit(roles[i]);
            i += 1;
        }
        Self(bits)
    }

    const fn bit(role: Role) -> u8 {
        match role {
            Role::Admin => 0b01,
            Role::Tenant => 0b10,
        }
    }

    pub const fn contains(&self, role: Role) -> bool {
        self.0 & Self::bit(role) != 0
    }
}

pub const ADMIN_ONLY: RoleSet = RoleSet::of(&[Role::Admin]);
pub const TENANT_OR_ADMIN: RoleSet = RoleSet::of(&[Role::Admin, Role::Tenant]);

/// Allow `principal` through if its role is in `required`.
pub fn authorize(
    principal: Option<&Principal>,
    required: RoleSet,
) -> Result<&Principal, AccessError> {
    let principal = principal.ok_or_else(|| {
        record_denial("unauthenticated");
        AccessError::Unauthenticated
    })?;

    if !required.contains(principal.role) {
        record_denial("forbidden");
        tracing::warn!(
            principal_id = %principal.id,
            role = %principal.role,
            "Role not permitted for operation"
        );
        return Err(AccessError::Forbidden(
            "role is not permitted to perform this operation".to_string(),
        ));
    }

    Ok(principal)
}

/// Ownership predicate for tenant-scoped records. Administrators act on
/// behalf of any tenant.
pub fn authorize_owner(principal: &Principal, tenant_id: &str) -> Result<(), AccessError> {
    if principal.role == Role::Admin || principal.id == tenant_id {
        return Ok(());
    }

    record_denial("forbidden");
    tracing::warn!(
        principal_id = %principal.id,
        tenant_id = %tenant_id,
        "Tenant attempted to access another tenant's record"
    );
    Err(AccessError::Forbidden(
        "record belongs to another tenant".to_string(),
    ))
}
