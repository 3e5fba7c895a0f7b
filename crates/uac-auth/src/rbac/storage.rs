//! Role, permission and assignment persistence.
//!
//! The relational store is external; [`MemoryRbacStorage`] implements all
//! three traits for tests and local runs.

use std::collections::BTreeSet;

use async_trait::async_trait;
use dashmap::DashMap;

use super::RbacResult;
use super::model::{Permission, Role};

#[async_trait]
pub trait RoleStorage: Send + Sync {
    async fn find_role_by_id(&self, id: &str) -> RbacResult<Option<Role>>;

    async fn find_role_by_code(&self, code: &str) -> RbacResult<Option<Role>>;

    async fn create_role(&self, role: &Role) -> RbacResult<()>;

    /// Replaces a stored role by id.
    async fn update_role(&self, role: &Role) -> RbacResult<()>;

    async fn delete_role(&self, id: &str) -> RbacResult<()>;

    /// All roles, or those of one organization plus platform-wide ones.
    async fn list_roles(&self, org_id: Option<&str>) -> RbacResult<Vec<Role>>;
}

#[async_trait]
pub trait PermissionStorage: Send + Sync {
    async fn find_permission_by_id(&self, id: &str) -> RbacResult<Option<Permission>>;

    async fn find_permission_by_code(&self, code: &str) -> RbacResult<Option<Permission>>;

    async fn create_permission(&self, permission: &Permission) -> RbacResult<()>;

    async fn delete_permission(&self, id: &str) -> RbacResult<()>;

    /// All permissions, or those of one organization plus platform-wide ones.
    async fn list_permissions(&self, org_id: Option<&str>) -> RbacResult<Vec<Permission>>;
}

/// User to role assignments.
#[async_trait]
pub trait UserRoleStorage: Send + Sync {
    /// Idempotent.
    async fn assign(&self, user_id: &str, role_id: &str) -> RbacResult<()>;

    /// Idempotent.
    async fn revoke(&self, user_id: &str, role_id: &str) -> RbacResult<()>;

    async fn role_ids(&self, user_id: &str) -> RbacResult<Vec<String>>;
}

fn visible_to(entry_org: Option<&str>, filter: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(org) => entry_org.is_none_or(|o| o == org),
    }
}

/// In-memory RBAC tables.
#[derive(Debug, Default)]
pub struct MemoryRbacStorage {
    roles: DashMap<String, Role>,
    permissions: DashMap<String, Permission>,
    assignments: DashMap<String, BTreeSet<String>>,
}

impl MemoryRbacStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleStorage for MemoryRbacStorage {
    async fn find_role_by_id(&self, id: &str) -> RbacResult<Option<Role>> {
        Ok(self.roles.get(id).map(|r| r.value().clone()))
    }

    async fn find_role_by_code(&self, code: &str) -> RbacResult<Option<Role>> {
        Ok(self
            .roles
            .iter()
            .find(|r| r.code == code)
            .map(|r| r.value().clone()))
    }

    async fn create_role(&self, role: &Role) -> RbacResult<()> {
        self.roles.insert(role.id.clone(), role.clone());
        Ok(())
    }

    async fn update_role(&self, role: &Role) -> RbacResult<()> {
        self.roles.insert(role.id.clone(), role.clone());
        Ok(())
    }

    async fn delete_role(&self, id: &str) -> RbacResult<()> {
        self.roles.remove(id);
        for mut entry in self.assignments.iter_mut() {
            entry.value_mut().remove(id);
        }
        Ok(())
    }

    async fn list_roles(&self, org_id: Option<&str>) -> RbacResult<Vec<Role>> {
        let mut roles: Vec<Role> = self
            .roles
            .iter()
            .filter(|r| visible_to(r.org_id.as_deref(), org_id))
            .map(|r| r.value().clone())
            .collect();
        roles.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(roles)
    }
}

#[async_trait]
impl PermissionStorage for MemoryRbacStorage {
    async fn find_permission_by_id(&self, id: &str) -> RbacResult<Option<Permission>> {
        Ok(self.permissions.get(id).map(|p| p.value().clone()))
    }

    async fn find_permission_by_code(&self, code: &str) -> RbacResult<Option<Permission>> {
        Ok(self
            .permissions
            .iter()
            .find(|p| p.code == code)
            .map(|p| p.value().clone()))
    }

    async fn create_permission(&self, permission: &Permission) -> RbacResult<()> {
        self.permissions
            .insert(permission.id.clone(), permission.clone());
        Ok(())
    }

    async fn delete_permission(&self, id: &str) -> RbacResult<()> {
        self.permissions.remove(id);
        Ok(())
    }

    async fn list_permissions(&self, org_id: Option<&str>) -> RbacResult<Vec<Permission>> {
        let mut permissions: Vec<Permission> = self
            .permissions
            .iter()
            .filter(|p| visible_to(p.org_id.as_deref(), org_id))
            .map(|p| p.value().clone())
            .collect();
        permissions.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(permissions)
    }
}

#[async_trait]
impl UserRoleStorage for MemoryRbacStorage {
    async fn assign(&self, user_id: &str, role_id: &str) -> RbacResult<()> {
        self.assignments
            .entry(user_id.to_string())
            .or_default()
            .insert(role_id.to_string());
        Ok(())
    }

    async fn revoke(&self, user_id: &str, role_id: &str) -> RbacResult<()> {
        if let Some(mut roles) = self.assignments.get_mut(user_id) {
            roles.remove(role_id);
        }
        Ok(())
    }

    async fn role_ids(&self, user_id: &str) -> RbacResult<Vec<String>> {
        Ok(self
            .assignments
            .get(user_id)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_org_filter_includes_platform_entries() {
        let storage = MemoryRbacStorage::new();
        storage.create_role(&Role::new("global", "Global")).await.unwrap();
        storage
            .create_role(&Role::new("a-only", "A").with_org("org-a"))
            .await
            .unwrap();
        storage
            .create_role(&Role::new("b-only", "B").with_org("org-b"))
            .await
            .unwrap();

        let codes = |roles: Vec<Role>| roles.into_iter().map(|r| r.code).collect::<Vec<_>>();
        assert_eq!(codes(storage.list_roles(None).await.unwrap()), vec!["a-only", "b-only", "global"]);
        assert_eq!(codes(storage.list_roles(Some("org-a")).await.unwrap()), vec!["a-only", "global"]);
    }

    #[tokio::test]
    async fn test_deleting_role_drops_assignments() {
        let storage = MemoryRbacStorage::new();
        let role = Role::new("temp", "Temp");
        storage.create_role(&role).await.unwrap();
        storage.assign("u1", &role.id).await.unwrap();
        storage.assign("u1", &role.id).await.unwrap();
        assert_eq!(storage.role_ids("u1").await.unwrap(), vec![role.id.clone()]);

        storage.delete_role(&role.id).await.unwrap();
        assert!(storage.role_ids("u1").await.unwrap().is_empty());
    }
}
