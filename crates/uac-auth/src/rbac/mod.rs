//! Role-based access control.
//!
//! A user holds roles; a role holds permission codes of the form
//! `resource:action`. Checks pass when any active role of the user grants
//! the exact code or `resource:*`, or when the user is a super admin.

pub mod engine;
pub mod model;
pub mod storage;

pub use engine::{RbacEngine, RbacService};
pub use model::{
    ALL_PERMISSIONS, Permission, ROLE_ORG_ADMIN, ROLE_SUPER_ADMIN, ROLE_USER, Role, RoleStatus,
    permission_code,
};
pub use storage::{MemoryRbacStorage, PermissionStorage, RoleStorage, UserRoleStorage};

/// Result alias for RBAC operations.
pub type RbacResult<T> = Result<T, RbacError>;

#[derive(Debug, thiserror::Error)]
pub enum RbacError {
    #[error("Role not found")]
    RoleNotFound,

    #[error("Permission not found")]
    PermissionNotFound,

    #[error("Role code already exists")]
    RoleCodeExists,

    #[error("Permission code already exists")]
    PermissionExists,

    /// Built-in roles cannot be altered or removed.
    #[error("System roles cannot be modified")]
    SystemRole,

    #[error("System permissions cannot be modified")]
    SystemPermission,

    #[error("RBAC storage error: {0}")]
    Storage(String),
}
