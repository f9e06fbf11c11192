//! In-memory role store
//!
//! Holds role definitions plus user, client and anonymous assignments and
//! answers the three guard lookups. Roles without a tenant are shared by
//! every tenant; tenant-scoped roles are only returned under their own
//! tenant. Lookups hand out cloned snapshots, so a decision never observes
//! a half-applied administrative change.

use crate::config::RbacSettings;
use crate::error::{RbacError, RbacResult};
use crate::lookup::RoleLookup;
use async_trait::async_trait;
use rolegate_core::{Role, Rule};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
struct StoreState {
    roles: BTreeMap<String, Role>,
    user_roles: BTreeMap<String, BTreeSet<String>>,
    client_roles: BTreeMap<String, BTreeSet<String>>,
    anonymous_roles: BTreeSet<String>,
}

impl StoreState {
    fn require(&self, role_ids: &[String]) -> RbacResult<()> {
        match role_ids.iter().find(|id| !self.roles.contains_key(*id)) {
            Some(missing) => Err(RbacError::RoleNotFound(missing.clone())),
            None => Ok(()),
        }
    }

    fn resolve(&self, role_ids: Option<&BTreeSet<String>>, tenant: Option<&str>) -> Vec<Role> {
        role_ids
            .into_iter()
            .flatten()
            .filter_map(|id| self.roles.get(id))
            .filter(|role| role.visible_to(tenant))
            .cloned()
            .collect()
    }
}

/// Which assignment table an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Holder {
    User,
    Client,
}

/// Role store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryRoleStore {
    state: RwLock<StoreState>,
}

impl MemoryRoleStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from validated settings
    pub fn from_settings(settings: &RbacSettings) -> RbacResult<Self> {
        settings.validate()?;

        let mut state = StoreState::default();
        for role in &settings.roles {
            state.roles.insert(role.id.clone(), role.clone());
        }
        for (user, roles) in &settings.user_roles {
            state
                .user_roles
                .insert(user.clone(), roles.iter().cloned().collect());
        }
        for (client, roles) in &settings.client_roles {
            state
                .client_roles
                .insert(client.clone(), roles.iter().cloned().collect());
        }
        state.anonymous_roles = settings.anonymous_roles.iter().cloned().collect();

        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Insert or replace a role by id
    pub async fn upsert_role(&self, role: Role) {
        debug!(role = %role, "rolestore: upsert");
        self.state.write().await.roles.insert(role.id.clone(), role);
    }

    /// Create a role under a fresh id
    pub async fn create_role(
        &self,
        name: &str,
        tenant: Option<&str>,
        rules: Vec<Rule>,
    ) -> RbacResult<Role> {
        if name.trim().is_empty() {
            return Err(RbacError::Configuration(
                "Required Values Missing: role name".to_string(),
            ));
        }

        let mut role = Role::new(Uuid::new_v4().to_string(), name).with_rules(rules);
        role.tenant = tenant.map(str::to_string);

        self.upsert_role(role.clone()).await;
        Ok(role)
    }

    /// Replace name and rules of an existing role
    pub async fn update_role(&self, role: Role) -> RbacResult<()> {
        let mut state = self.state.write().await;
        match state.roles.get_mut(&role.id) {
            Some(existing) => {
                *existing = role;
                Ok(())
            }
            None => Err(RbacError::RoleNotFound(role.id)),
        }
    }

    /// Delete a role and every assignment naming it
    pub async fn remove_role(&self, role_id: &str) -> RbacResult<Role> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let role = state
            .roles
            .remove(role_id)
            .ok_or_else(|| RbacError::RoleNotFound(role_id.to_string()))?;

        for assigned in state
            .user_roles
            .values_mut()
            .chain(state.client_roles.values_mut())
        {
            assigned.remove(role_id);
        }
        state.anonymous_roles.remove(role_id);

        debug!(role = %role, "rolestore: removed");
        Ok(role)
    }

    /// Role by id, if visible under `tenant`
    pub async fn get_role(&self, role_id: &str, tenant: Option<&str>) -> Option<Role> {
        let state = self.state.read().await;
        state
            .roles
            .get(role_id)
            .filter(|role| tenant.is_none() || role.visible_to(tenant))
            .cloned()
    }

    /// All roles visible under `tenant`; every role when `tenant` is `None`
    pub async fn list_roles(&self, tenant: Option<&str>) -> Vec<Role> {
        let state = self.state.read().await;
        state
            .roles
            .values()
            .filter(|role| tenant.is_none() || role.visible_to(tenant))
            .cloned()
            .collect()
    }

    /// Grant roles to a user; unknown role ids are rejected
    pub async fn add_user_roles(&self, user_id: &str, role_ids: &[String]) -> RbacResult<()> {
        self.add_roles(Holder::User, user_id, role_ids).await
    }

    /// Grant roles to a client; unknown role ids are rejected
    pub async fn add_client_roles(&self, client_id: &str, role_ids: &[String]) -> RbacResult<()> {
        self.add_roles(Holder::Client, client_id, role_ids).await
    }

    /// Remove one role (or all roles when `role_id` is `None`) from a user;
    /// returns how many assignments went away.
    pub async fn remove_user_roles(&self, user_id: &str, role_id: Option<&str>) -> usize {
        self.remove_roles(Holder::User, user_id, role_id).await
    }

    /// Client counterpart of [`remove_user_roles`](Self::remove_user_roles)
    pub async fn remove_client_roles(&self, client_id: &str, role_id: Option<&str>) -> usize {
        self.remove_roles(Holder::Client, client_id, role_id).await
    }

    /// Replace the roles granted to callers without credentials
    pub async fn set_anonymous_roles(&self, role_ids: &[String]) -> RbacResult<()> {
        let mut state = self.state.write().await;
        state.require(role_ids)?;
        state.anonymous_roles = role_ids.iter().cloned().collect();
        Ok(())
    }

    async fn add_roles(&self, holder: Holder, id: &str, role_ids: &[String]) -> RbacResult<()> {
        let mut state = self.state.write().await;
        state.require(role_ids)?;

        let table = match holder {
            Holder::User => &mut state.user_roles,
            Holder::Client => &mut state.client_roles,
        };
        table
            .entry(id.to_string())
            .or_default()
            .extend(role_ids.iter().cloned());

        debug!(holder = ?holder, id = %id, roles = ?role_ids, "rolestore: roles added");
        Ok(())
    }

    async fn remove_roles(&self, holder: Holder, id: &str, role_id: Option<&str>) -> usize {
        let mut state = self.state.write().await;
        let table = match holder {
            Holder::User => &mut state.user_roles,
            Holder::Client => &mut state.client_roles,
        };

        let Some(assigned) = table.get_mut(id) else {
            return 0;
        };
        let removed = match role_id {
            Some(role_id) => usize::from(assigned.remove(role_id)),
            None => std::mem::take(assigned).len(),
        };
        if assigned.is_empty() {
            table.remove(id);
        }
        removed
    }
}

#[async_trait]
impl RoleLookup for MemoryRoleStore {
    async fn roles_for_user(&self, tenant_id: Option<&str>, user_id: &str) -> RbacResult<Vec<Role>> {
        let state = self.state.read().await;
        Ok(state.resolve(state.user_roles.get(user_id), tenant_id))
    }

    async fn roles_for_client(
        &self,
        tenant_id: Option<&str>,
        client_id: &str,
    ) -> RbacResult<Vec<Role>> {
        let state = self.state.read().await;
        Ok(state.resolve(state.client_roles.get(client_id), tenant_id))
    }

    async fn roles_for_anonymous(&self, tenant_id: Option<&str>) -> RbacResult<Vec<Role>> {
        let state = self.state.read().await;
        Ok(state.resolve(Some(&state.anonymous_roles), tenant_id))
    }
}
