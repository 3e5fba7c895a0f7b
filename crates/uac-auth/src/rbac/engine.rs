//! Permission checks and role administration.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::model::{
    ALL_PERMISSIONS, Permission, Role, default_grants, default_permissions, default_roles,
    permission_code,
};
use super::storage::{PermissionStorage, RoleStorage, UserRoleStorage};
use super::{RbacError, RbacResult};

/// RBAC operations used by the auth gate and the admin API.
#[async_trait]
pub trait RbacEngine: Send + Sync {
    /// True for super admins, or when an active role grants
    /// `resource:action` or `resource:*`.
    async fn check_permission(&self, user_id: &str, resource: &str, action: &str)
    -> RbacResult<bool>;

    /// Sorted, deduplicated codes. Super admins get exactly `["*:*"]`.
    async fn get_user_permissions(&self, user_id: &str) -> RbacResult<Vec<String>>;

    async fn create_role(&self, role: Role) -> RbacResult<Role>;

    async fn get_role(&self, id: &str) -> RbacResult<Role>;

    async fn get_role_by_code(&self, code: &str) -> RbacResult<Role>;

    async fn update_role(&self, role: Role) -> RbacResult<Role>;

    async fn delete_role(&self, id: &str) -> RbacResult<()>;

    async fn list_roles(&self, org_id: Option<&str>) -> RbacResult<Vec<Role>>;

    async fn create_permission(&self, permission: Permission) -> RbacResult<Permission>;

    async fn get_permission(&self, id: &str) -> RbacResult<Permission>;

    async fn delete_permission(&self, id: &str) -> RbacResult<()>;

    async fn list_permissions(&self, org_id: Option<&str>) -> RbacResult<Vec<Permission>>;

    async fn add_permissions_to_role(&self, role_id: &str, permission_ids: &[String])
    -> RbacResult<()>;

    async fn remove_permissions_from_role(
        &self,
        role_id: &str,
        permission_ids: &[String],
    ) -> RbacResult<()>;

    async fn assign_role(&self, user_id: &str, role_id: &str) -> RbacResult<()>;

    async fn assign_role_by_code(&self, user_id: &str, code: &str) -> RbacResult<()>;

    async fn revoke_role(&self, user_id: &str, role_id: &str) -> RbacResult<()>;

    async fn get_user_roles(&self, user_id: &str) -> RbacResult<Vec<Role>>;

    async fn has_role(&self, user_id: &str, code: &str) -> RbacResult<bool>;

    /// Creates the built-in permissions and roles. Safe to call on every start.
    async fn init_default_roles_and_permissions(&self) -> RbacResult<()>;
}

/// [`RbacEngine`] over pluggable storage.
pub struct RbacService {
    roles: Arc<dyn RoleStorage>,
    permissions: Arc<dyn PermissionStorage>,
    assignments: Arc<dyn UserRoleStorage>,
}

impl RbacService {
    pub fn new(
        roles: Arc<dyn RoleStorage>,
        permissions: Arc<dyn PermissionStorage>,
        assignments: Arc<dyn UserRoleStorage>,
    ) -> Self {
        Self {
            roles,
            permissions,
            assignments,
        }
    }

    /// Uses one storage object for all three tables.
    pub fn with_storage<S>(storage: Arc<S>) -> Self
    where
        S: RoleStorage + PermissionStorage + UserRoleStorage + 'static,
    {
        Self::new(storage.clone(), storage.clone(), storage)
    }

    async fn active_roles(&self, user_id: &str) -> RbacResult<Vec<Role>> {
        Ok(self
            .get_user_roles(user_id)
            .await?
            .into_iter()
            .filter(Role::is_active)
            .collect())
    }

    async fn permission_codes(&self, permission_ids: &[String]) -> RbacResult<Vec<String>> {
        let mut codes = Vec::with_capacity(permission_ids.len());
        for id in permission_ids {
            let permission = self
                .permissions
                .find_permission_by_id(id)
                .await?
                .ok_or(RbacError::PermissionNotFound)?;
            codes.push(permission.code);
        }
        Ok(codes)
    }

    async fn ensure_permission(&self, permission: Permission) -> RbacResult<Permission> {
        match self.permissions.find_permission_by_code(&permission.code).await? {
            Some(existing) => Ok(existing),
            None => {
                self.permissions.create_permission(&permission).await?;
                Ok(permission)
            }
        }
    }
}

#[async_trait]
impl RbacEngine for RbacService {
    async fn check_permission(
        &self,
        user_id: &str,
        resource: &str,
        action: &str,
    ) -> RbacResult<bool> {
        let roles = self.active_roles(user_id).await?;
        if roles.iter().any(Role::is_super_admin) {
            return Ok(true);
        }
        Ok(roles.iter().any(|role| role.grants(resource, action)))
    }

    async fn get_user_permissions(&self, user_id: &str) -> RbacResult<Vec<String>> {
        let roles = self.active_roles(user_id).await?;
        if roles.iter().any(Role::is_super_admin) {
            return Ok(vec![ALL_PERMISSIONS.to_string()]);
        }
        let codes: BTreeSet<String> = roles
            .into_iter()
            .flat_map(|role| role.permissions)
            .collect();
        Ok(codes.into_iter().collect())
    }

    async fn create_role(&self, role: Role) -> RbacResult<Role> {
        if self.roles.find_role_by_code(&role.code).await?.is_some() {
            return Err(RbacError::RoleCodeExists);
        }
        self.roles.create_role(&role).await?;
        tracing::info!(role_id = %role.id, code = %role.code, "Role created");
        Ok(role)
    }

    async fn get_role(&self, id: &str) -> RbacResult<Role> {
        self.roles
            .find_role_by_id(id)
            .await?
            .ok_or(RbacError::RoleNotFound)
    }

    async fn get_role_by_code(&self, code: &str) -> RbacResult<Role> {
        self.roles
            .find_role_by_code(code)
            .await?
            .ok_or(RbacError::RoleNotFound)
    }

    async fn update_role(&self, mut role: Role) -> RbacResult<Role> {
        let current = self.get_role(&role.id).await?;

        if current.is_system {
            let changed = role.code != current.code
                || role.name != current.name
                || role.description != current.description
                || role.status != current.status
                || role.permissions != current.permissions;
            if changed {
                return Err(RbacError::SystemRole);
            }
            return Ok(current);
        }

        if role.code != current.code
            && self.roles.find_role_by_code(&role.code).await?.is_some()
        {
            return Err(RbacError::RoleCodeExists);
        }

        // The system flag is fixed at creation.
        role.is_system = false;
        self.roles.update_role(&role).await?;
        Ok(role)
    }

    async fn delete_role(&self, id: &str) -> RbacResult<()> {
        let role = self.get_role(id).await?;
        if role.is_system {
            return Err(RbacError::SystemRole);
        }
        self.roles.delete_role(id).await?;
        tracing::info!(role_id = %id, code = %role.code, "Role deleted");
        Ok(())
    }

    async fn list_roles(&self, org_id: Option<&str>) -> RbacResult<Vec<Role>> {
        self.roles.list_roles(org_id).await
    }

    async fn create_permission(&self, mut permission: Permission) -> RbacResult<Permission> {
        if permission.code.is_empty() {
            permission.code = permission_code(&permission.resource, &permission.action);
        }
        if self
            .permissions
            .find_permission_by_code(&permission.code)
            .await?
            .is_some()
        {
            return Err(RbacError::PermissionExists);
        }
        self.permissions.create_permission(&permission).await?;
        Ok(permission)
    }

    async fn get_permission(&self, id: &str) -> RbacResult<Permission> {
        self.permissions
            .find_permission_by_id(id)
            .await?
            .ok_or(RbacError::PermissionNotFound)
    }

    async fn delete_permission(&self, id: &str) -> RbacResult<()> {
        let permission = self.get_permission(id).await?;
        if permission.is_system {
            return Err(RbacError::SystemPermission);
        }

        for mut role in self.roles.list_roles(None).await? {
            if role.permissions.remove(&permission.code) {
                self.roles.update_role(&role).await?;
            }
        }
        self.permissions.delete_permission(id).await
    }

    async fn list_permissions(&self, org_id: Option<&str>) -> RbacResult<Vec<Permission>> {
        self.permissions.list_permissions(org_id).await
    }

    async fn add_permissions_to_role(
        &self,
        role_id: &str,
        permission_ids: &[String],
    ) -> RbacResult<()> {
        let mut role = self.get_role(role_id).await?;
        if role.is_system {
            return Err(RbacError::SystemRole);
        }
        role.permissions
            .extend(self.permission_codes(permission_ids).await?);
        self.roles.update_role(&role).await
    }

    async fn remove_permissions_from_role(
        &self,
        role_id: &str,
        permission_ids: &[String],
    ) -> RbacResult<()> {
        let mut role = self.get_role(role_id).await?;
        if role.is_system {
            return Err(RbacError::SystemRole);
        }
        for code in self.permission_codes(permission_ids).await? {
            role.permissions.remove(&code);
        }
        self.roles.update_role(&role).await
    }

    async fn assign_role(&self, user_id: &str, role_id: &str) -> RbacResult<()> {
        self.get_role(role_id).await?;
        self.assignments.assign(user_id, role_id).await
    }

    async fn assign_role_by_code(&self, user_id: &str, code: &str) -> RbacResult<()> {
        let role = self.get_role_by_code(code).await?;
        self.assignments.assign(user_id, &role.id).await
    }

    async fn revoke_role(&self, user_id: &str, role_id: &str) -> RbacResult<()> {
        self.assignments.revoke(user_id, role_id).await
    }

    async fn get_user_roles(&self, user_id: &str) -> RbacResult<Vec<Role>> {
        let mut roles = Vec::new();
        for role_id in self.assignments.role_ids(user_id).await? {
            if let Some(role) = self.roles.find_role_by_id(&role_id).await? {
                roles.push(role);
            }
        }
        Ok(roles)
    }

    async fn has_role(&self, user_id: &str, code: &str) -> RbacResult<bool> {
        Ok(self
            .active_roles(user_id)
            .await?
            .iter()
            .any(|role| role.code == code))
    }

    async fn init_default_roles_and_permissions(&self) -> RbacResult<()> {
        let mut permissions = Vec::new();
        for permission in default_permissions() {
            permissions.push(self.ensure_permission(permission).await?);
        }

        for role in default_roles() {
            let grants = default_grants(&role.code, &permissions);
            match self.roles.find_role_by_code(&role.code).await? {
                Some(mut existing) => {
                    let before = existing.permissions.len();
                    existing.permissions.extend(grants);
                    if existing.permissions.len() != before {
                        self.roles.update_role(&existing).await?;
                    }
                }
                None => {
                    let role = Role {
                        permissions: grants,
                        ..role
                    };
                    self.roles.create_role(&role).await?;
                }
            }
        }

        tracing::info!(
            permissions = permissions.len(),
            "Default roles and permissions initialized"
        );
        Ok(())
    }
}
