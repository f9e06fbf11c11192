//! Configuration types for rolegate RBAC
//!
//! Enforcement is configured in three layers, lowest priority first: the
//! compiled-in [`GuardConfig::default`], the process-wide patch held by the
//! [`HookRegistry`](crate::hooks::HookRegistry), and the per-guard patch
//! given to [`RbacGuard::new`](crate::middleware::RbacGuard::new). The layers
//! are merged again on every decision.

use crate::error::{RbacError, RbacResult};
use rolegate_core::Role;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Effective enforcement settings for one decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Record denials without blocking the request
    pub log_only: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self { log_only: true }
    }
}

/// Partial override of [`GuardConfig`]; unset fields leave the base alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_only: Option<bool>,
}

impl ConfigPatch {
    /// Patch that changes nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Block denied requests
    pub fn enforcing() -> Self {
        Self {
            log_only: Some(false),
        }
    }

    /// Let denied requests through and only record them
    pub fn log_only() -> Self {
        Self {
            log_only: Some(true),
        }
    }

    /// Override `log_only`
    pub fn with_log_only(mut self, log_only: bool) -> Self {
        self.log_only = Some(log_only);
        self
    }

    /// Write the set fields into `config`
    pub fn apply(&self, config: &mut GuardConfig) {
        if let Some(log_only) = self.log_only {
            config.log_only = log_only;
        }
    }

    /// `base` with this patch applied
    pub fn merge(&self, base: GuardConfig) -> GuardConfig {
        let mut merged = base;
        self.apply(&mut merged);
        merged
    }

    /// Fold `other` on top of this patch; `other` wins where it is set
    pub fn overlay(&self, other: &ConfigPatch) -> ConfigPatch {
        ConfigPatch {
            log_only: other.log_only.or(self.log_only),
        }
    }
}

/// File-backed settings: enforcement plus role definitions and assignments
/// used to seed a [`MemoryRoleStore`](crate::store::MemoryRoleStore).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RbacSettings {
    /// Process-wide enforcement override
    #[serde(flatten)]
    pub config: ConfigPatch,
    /// Role definitions
    #[serde(default)]
    pub roles: Vec<Role>,
    /// user id -> role ids
    #[serde(default)]
    pub user_roles: BTreeMap<String, Vec<String>>,
    /// client id -> role ids
    #[serde(default)]
    pub client_roles: BTreeMap<String, Vec<String>>,
    /// Role ids granted to callers without credentials
    #[serde(default)]
    pub anonymous_roles: Vec<String>,
}

impl RbacSettings {
    /// Load settings from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> RbacResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RbacError::Configuration(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;

        let settings: RbacSettings = serde_json::from_str(&content)?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a JSON file
    pub fn to_file(&self, path: impl AsRef<Path>) -> RbacResult<()> {
        let content = serde_json::to_string_pretty(self)?;

        std::fs::write(path.as_ref(), content).map_err(|e| {
            RbacError::Configuration(format!("Failed to write settings file: {}", e))
        })?;

        Ok(())
    }

    /// Reject duplicate role ids and assignments that name unknown roles
    pub fn validate(&self) -> RbacResult<()> {
        let mut role_ids = HashSet::new();
        for role in &self.roles {
            if !role_ids.insert(role.id.as_str()) {
                return Err(RbacError::Configuration(format!(
                    "Duplicate role id: {}",
                    role.id
                )));
            }
        }

        let assignments = self
            .user_roles
            .iter()
            .map(|(user, roles)| (format!("user '{}'", user), roles))
            .chain(
                self.client_roles
                    .iter()
                    .map(|(client, roles)| (format!("client '{}'", client), roles)),
            )
            .chain(std::iter::once((
                "anonymous".to_string(),
                &self.anonymous_roles,
            )));

        for (holder, roles) in assignments {
            for role_id in roles {
                if !role_ids.contains(role_id.as_str()) {
                    return Err(RbacError::Configuration(format!(
                        "Assignment for {} references non-existent role '{}'",
                        holder, role_id
                    )));
                }
            }
        }

        Ok(())
    }

    /// A permissive starting point for local development
    pub fn development() -> Self {
        use rolegate_core::{GroupMatcher, Rule, VerbMatcher};

        let admin = Role::new("admin", "Administrator").with_rule(Rule::any());
        let reader = Role::new("reader", "Read only")
            .with_rule(Rule::new(GroupMatcher::Any, VerbMatcher::set(["read", "list"])));

        Self {
            config: ConfigPatch::log_only(),
            roles: vec![admin, reader],
            user_roles: BTreeMap::from([("developer".to_string(), vec!["admin".to_string()])]),
            client_roles: BTreeMap::new(),
            anonymous_roles: vec!["reader".to_string()],
        }
    }
}
