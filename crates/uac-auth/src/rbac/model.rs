//! Roles and permissions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Built-in codes
// =============================================================================

/// Implicitly holds every permission.
pub const ROLE_SUPER_ADMIN: &str = "super_admin";
pub const ROLE_ORG_ADMIN: &str = "org_admin";
pub const ROLE_USER: &str = "user";

pub const RESOURCE_USER: &str = "user";
pub const RESOURCE_ROLE: &str = "role";
pub const RESOURCE_ORG: &str = "org";
pub const RESOURCE_APP: &str = "app";

pub const ACTION_READ: &str = "read";
pub const ACTION_WRITE: &str = "write";
pub const ACTION_DELETE: &str = "delete";

/// Matches every action on a resource.
pub const ACTION_ALL: &str = "*";

/// Reported as the only permission of a super admin.
pub const ALL_PERMISSIONS: &str = "*:*";

/// `resource:action`
#[must_use]
pub fn permission_code(resource: &str, action: &str) -> String {
    format!("{resource}:{action}")
}

// =============================================================================
// Permission
// =============================================================================

/// An action on a resource, identified by its `resource:action` code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: String,
    /// `None` for platform-wide permissions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    pub resource: String,
    pub action: String,
    /// Derived from resource and action when left empty.
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_system: bool,
}

impl Permission {
    #[must_use]
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        let resource = resource.into();
        let action = action.into();
        Self {
            id: Uuid::new_v4().to_string(),
            org_id: None,
            code: permission_code(&resource, &action),
            resource,
            action,
            description: None,
            is_system: false,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    #[must_use]
    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }
}

// =============================================================================
// Role
// =============================================================================

/// Role status. Disabled roles grant nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleStatus {
    #[default]
    Active,
    Disabled,
}

/// A named bundle of permission codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    pub name: String,
    /// Unique across all roles.
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub status: RoleStatus,
    /// Granted permission codes.
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl Role {
    /// An active, non-system role with no permissions.
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            org_id: None,
            name: name.into(),
            code: code.into(),
            description: None,
            is_system: false,
            status: RoleStatus::Active,
            permissions: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    #[must_use]
    pub fn with_permission(mut self, code: impl Into<String>) -> Self {
        self.permissions.insert(code.into());
        self
    }

    #[must_use]
    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == RoleStatus::Active
    }

    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.code == ROLE_SUPER_ADMIN
    }

    /// Exact `resource:action` or `resource:*`.
    #[must_use]
    pub fn grants(&self, resource: &str, action: &str) -> bool {
        self.permissions.contains(&permission_code(resource, action))
            || self.permissions.contains(&permission_code(resource, ACTION_ALL))
    }
}

// =============================================================================
// Defaults
// =============================================================================

const DEFAULT_RESOURCES: [&str; 4] = [RESOURCE_USER, RESOURCE_ROLE, RESOURCE_ORG, RESOURCE_APP];
const DEFAULT_ACTIONS: [&str; 3] = [ACTION_READ, ACTION_WRITE, ACTION_DELETE];

/// `{user, role, org, app} x {read, write, delete}`, all marked system.
#[must_use]
pub fn default_permissions() -> Vec<Permission> {
    DEFAULT_RESOURCES
        .iter()
        .flat_map(|resource| {
            DEFAULT_ACTIONS.iter().map(move |action| {
                Permission::new(*resource, *action)
                    .with_description(format!("{action} access to {resource}"))
                    .system()
            })
        })
        .collect()
}

/// The three built-in system roles, without grants.
#[must_use]
pub fn default_roles() -> Vec<Role> {
    vec![
        Role::new(ROLE_SUPER_ADMIN, "Super Administrator")
            .with_description("Holds every permission")
            .system(),
        Role::new(ROLE_ORG_ADMIN, "Organization Administrator")
            .with_description("Manages users and applications within an organization")
            .system(),
        Role::new(ROLE_USER, "User")
            .with_description("Basic access")
            .system(),
    ]
}

/// Codes a built-in role receives at bootstrap.
#[must_use]
pub fn default_grants(role_code: &str, permissions: &[Permission]) -> BTreeSet<String> {
    match role_code {
        ROLE_SUPER_ADMIN => permissions.iter().map(|p| p.code.clone()).collect(),
        ROLE_ORG_ADMIN => permissions
            .iter()
            .filter(|p| p.resource != RESOURCE_ORG)
            .map(|p| p.code.clone())
            .collect(),
        ROLE_USER => BTreeSet::from([permission_code(RESOURCE_USER, ACTION_READ)]),
        _ => BTreeSet::new(),
    }
}
