//! Hook registry
//!
//! The registry is the capability bundle a guard is built from: three
//! identity extractors, three role lookups and the process-wide
//! enforcement settings. It is an ordinary value shared through an `Arc`,
//! so independent registries (one per test, one per service) never see
//! each other's hooks.
//!
//! Patches replace the whole table atomically. A decision takes one
//! [`RegistrySnapshot`] up front and uses it throughout, so an
//! administrative patch landing mid-request can never pair an old
//! extractor with a new lookup.

use crate::config::{ConfigPatch, GuardConfig};
use crate::context::{ExtensionExtractor, IdentityExtractor};
use crate::lookup::{
    ActorRoleLookup, AnonymousRoleLookup, AnonymousRoles, ClientRoles, EmptyRoleLookup,
    RoleLookup, UserRoles,
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// The full hook table
#[derive(Clone)]
pub struct Hooks {
    /// Tenant id extractor
    pub tenant: Arc<dyn IdentityExtractor>,
    /// User id extractor
    pub user: Arc<dyn IdentityExtractor>,
    /// Client id extractor
    pub client: Arc<dyn IdentityExtractor>,
    /// Roles of an identified user
    pub roles_for_user: Arc<dyn ActorRoleLookup>,
    /// Roles of an identified client
    pub roles_for_client: Arc<dyn ActorRoleLookup>,
    /// Roles granted without credentials
    pub roles_for_anonymous: Arc<dyn AnonymousRoleLookup>,
}

/// Extension-backed extractors and empty lookups: nothing is granted until
/// a real store is installed.
impl Default for Hooks {
    fn default() -> Self {
        let empty = Arc::new(EmptyRoleLookup);
        Self {
            tenant: Arc::new(ExtensionExtractor::tenant()),
            user: Arc::new(ExtensionExtractor::user()),
            client: Arc::new(ExtensionExtractor::client()),
            roles_for_user: Arc::new(UserRoles(empty.clone())),
            roles_for_client: Arc::new(ClientRoles(empty.clone())),
            roles_for_anonymous: Arc::new(AnonymousRoles(empty)),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("tenant", &self.tenant.name())
            .field("user", &self.user.name())
            .field("client", &self.client.name())
            .field("roles_for_user", &self.roles_for_user.name())
            .field("roles_for_client", &self.roles_for_client.name())
            .field("roles_for_anonymous", &self.roles_for_anonymous.name())
            .finish()
    }
}

/// Field-by-field replacement for [`Hooks`]; unset fields are left alone.
#[derive(Clone, Default)]
pub struct HookPatch {
    tenant: Option<Arc<dyn IdentityExtractor>>,
    user: Option<Arc<dyn IdentityExtractor>>,
    client: Option<Arc<dyn IdentityExtractor>>,
    roles_for_user: Option<Arc<dyn ActorRoleLookup>>,
    roles_for_client: Option<Arc<dyn ActorRoleLookup>>,
    roles_for_anonymous: Option<Arc<dyn AnonymousRoleLookup>>,
}

impl HookPatch {
    /// Patch that changes nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tenant extractor
    pub fn tenant_extractor(mut self, extractor: impl IdentityExtractor + 'static) -> Self {
        self.tenant = Some(Arc::new(extractor));
        self
    }

    /// Replace the user extractor
    pub fn user_extractor(mut self, extractor: impl IdentityExtractor + 'static) -> Self {
        self.user = Some(Arc::new(extractor));
        self
    }

    /// Replace the client extractor
    pub fn client_extractor(mut self, extractor: impl IdentityExtractor + 'static) -> Self {
        self.client = Some(Arc::new(extractor));
        self
    }

    /// Replace the user role lookup
    pub fn roles_for_user(mut self, lookup: impl ActorRoleLookup + 'static) -> Self {
        self.roles_for_user = Some(Arc::new(lookup));
        self
    }

    /// Replace the client role lookup
    pub fn roles_for_client(mut self, lookup: impl ActorRoleLookup + 'static) -> Self {
        self.roles_for_client = Some(Arc::new(lookup));
        self
    }

    /// Replace the anonymous role lookup
    pub fn roles_for_anonymous(mut self, lookup: impl AnonymousRoleLookup + 'static) -> Self {
        self.roles_for_anonymous = Some(Arc::new(lookup));
        self
    }

    /// Route all three lookups to one store
    pub fn role_lookup<L: RoleLookup + 'static>(mut self, store: Arc<L>) -> Self {
        self.roles_for_user = Some(Arc::new(UserRoles(store.clone())));
        self.roles_for_client = Some(Arc::new(ClientRoles(store.clone())));
        self.roles_for_anonymous = Some(Arc::new(AnonymousRoles(store)));
        self
    }

    /// Whether no hook is set
    pub fn is_empty(&self) -> bool {
        self.tenant.is_none()
            && self.user.is_none()
            && self.client.is_none()
            && self.roles_for_user.is_none()
            && self.roles_for_client.is_none()
            && self.roles_for_anonymous.is_none()
    }

    /// Write the set fields into `hooks`
    pub fn apply(&self, hooks: &mut Hooks) {
        if let Some(tenant) = &self.tenant {
            hooks.tenant = tenant.clone();
        }
        if let Some(user) = &self.user {
            hooks.user = user.clone();
        }
        if let Some(client) = &self.client {
            hooks.client = client.clone();
        }
        if let Some(lookup) = &self.roles_for_user {
            hooks.roles_for_user = lookup.clone();
        }
        if let Some(lookup) = &self.roles_for_client {
            hooks.roles_for_client = lookup.clone();
        }
        if let Some(lookup) = &self.roles_for_anonymous {
            hooks.roles_for_anonymous = lookup.clone();
        }
    }
}

/// Hooks and process-wide settings as seen by one decision
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    /// Hook table
    pub hooks: Hooks,
    /// Process-wide settings
    pub config: GuardConfig,
}

/// Shared, patchable hook table plus the process-wide [`GuardConfig`].
pub struct HookRegistry {
    state: RwLock<Arc<RegistrySnapshot>>,
}

impl HookRegistry {
    /// Default hooks and default (log-only) settings
    pub fn new() -> Self {
        Self::with_hooks(Hooks::default())
    }

    /// Registry over `hooks` with default settings
    pub fn with_hooks(hooks: Hooks) -> Self {
        Self {
            state: RwLock::new(Arc::new(RegistrySnapshot {
                hooks,
                config: GuardConfig::default(),
            })),
        }
    }

    /// Builder-style process-wide settings override
    pub fn with_config(self, patch: ConfigPatch) -> Self {
        let mut state = self.state.into_inner();
        patch.apply(&mut Arc::make_mut(&mut state).config);
        Self {
            state: RwLock::new(state),
        }
    }

    /// Consistent view of hooks and settings for one decision
    pub async fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.state.read().await.clone()
    }

    pub async fn hooks(&self) -> Hooks {
        self.snapshot().await.hooks.clone()
    }

    pub async fn config(&self) -> GuardConfig {
        self.snapshot().await.config
    }

    /// Merge `patch` into the hook table and return the resulting table.
    ///
    /// Takes effect for decisions that start after this call returns.
    pub async fn patch_hooks(&self, patch: HookPatch) -> Hooks {
        let mut state = self.state.write().await;
        let mut next = RegistrySnapshot::clone(&state);
        patch.apply(&mut next.hooks);
        debug!(hooks = ?next.hooks, "RBAC: patching hooks");
        *state = Arc::new(next);
        state.hooks.clone()
    }

    /// Merge `patch` into the process-wide settings and return them.
    pub async fn patch_config(&self, patch: ConfigPatch) -> GuardConfig {
        let mut state = self.state.write().await;
        let mut next = RegistrySnapshot::clone(&state);
        patch.apply(&mut next.config);
        debug!(config = ?next.config, "RBAC: patching config");
        *state = Arc::new(next);
        state.config
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeaderExtractor;
    use crate::lookup::{actor_lookup_fn, anonymous_lookup_fn};
    use rolegate_core::Role;

    #[tokio::test]
    async fn test_patch_leaves_unspecified_hooks_untouched() {
        let registry = HookRegistry::new();
        let before = registry.hooks().await;

        let after = registry
            .patch_hooks(
                HookPatch::new().tenant_extractor(HeaderExtractor::named("x-tenant-id").unwrap()),
            )
            .await;

        assert_eq!(after.tenant.name(), "header");
        assert!(Arc::ptr_eq(&before.user, &after.user));
        assert!(Arc::ptr_eq(&before.client, &after.client));
        assert!(Arc::ptr_eq(&before.roles_for_user, &after.roles_for_user));
        assert!(Arc::ptr_eq(&before.roles_for_anonymous, &after.roles_for_anonymous));
    }

    #[tokio::test]
    async fn test_patch_config_returns_current() {
        let registry = HookRegistry::new();
        assert!(registry.config().await.log_only);

        let config = registry.patch_config(ConfigPatch::enforcing()).await;
        assert!(!config.log_only);

        // An empty patch keeps the previous value
        let config = registry.patch_config(ConfigPatch::new()).await;
        assert!(!config.log_only);
    }

    #[tokio::test]
    async fn test_snapshot_is_unaffected_by_later_patch() {
        let registry = HookRegistry::new().with_config(ConfigPatch::enforcing());
        let snapshot = registry.snapshot().await;

        registry
            .patch_hooks(
                HookPatch::new()
                    .roles_for_user(actor_lookup_fn(|_, _| Ok(vec![Role::new("1", "late")])))
                    .roles_for_anonymous(anonymous_lookup_fn(|_| Ok(Vec::new()))),
            )
            .await;
        registry.patch_config(ConfigPatch::log_only()).await;

        assert!(!snapshot.config.log_only);
        assert!(
            snapshot
                .hooks
                .roles_for_user
                .roles(None, "u1")
                .await
                .unwrap()
                .is_empty()
        );
        assert!(registry.config().await.log_only);
    }

    #[tokio::test]
    async fn test_independent_registries_do_not_interfere() {
        let first = HookRegistry::new();
        let second = HookRegistry::new();

        first
            .patch_hooks(
                HookPatch::new()
                    .roles_for_user(actor_lookup_fn(|_, _| Ok(vec![Role::new("1", "admin")]))),
            )
            .await;

        let hooks = second.hooks().await;
        assert!(hooks.roles_for_user.roles(None, "u1").await.unwrap().is_empty());
    }

    #[test]
    fn test_empty_patch() {
        assert!(HookPatch::new().is_empty());
        assert!(!HookPatch::new().role_lookup(Arc::new(EmptyRoleLookup)).is_empty());
    }
}
