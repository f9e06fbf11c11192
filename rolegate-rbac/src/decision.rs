//! Access decisions
//!
//! A decision runs identity resolution, role resolution and rule
//! evaluation in that order against one registry snapshot, then maps the
//! result onto an [`Outcome`] using the merged enforcement settings. A
//! failing hook is folded into the same denial branch as a legitimate
//! "no": the caller can never tell the two apart, only the logs can.

use crate::config::{ConfigPatch, GuardConfig};
use crate::context::{RequestInfo, resolve_identity};
use crate::error::RbacError;
use crate::hooks::RegistrySnapshot;
use crate::lookup::resolve_roles;
use axum::http::request::Parts;
use rolegate_core::{Identity, granting_role};
use std::fmt;
use tracing::{debug, error, warn};

/// What the guard does with a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Some role grants the operation
    Allow,
    /// Denied, but the guard is in log-only mode: pass through and record
    DenyObserved,
    /// Denied and blocked with a 403
    DenyEnforced,
}

impl Outcome {
    /// Map an access result onto the enforcement mode
    pub fn from_access(can_access: bool, config: GuardConfig) -> Self {
        match (can_access, config.log_only) {
            (true, _) => Outcome::Allow,
            (false, true) => Outcome::DenyObserved,
            (false, false) => Outcome::DenyEnforced,
        }
    }

    /// Whether the request continues to the handler
    pub fn proceeds(&self) -> bool {
        !matches!(self, Outcome::DenyEnforced)
    }

    /// Whether no role granted the operation
    pub fn is_denied(&self) -> bool {
        !matches!(self, Outcome::Allow)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Allow => write!(f, "allow"),
            Outcome::DenyObserved => write!(f, "deny (log only)"),
            Outcome::DenyEnforced => write!(f, "deny"),
        }
    }
}

/// Full result of one decision, for callers that want more than the outcome
#[derive(Debug)]
pub struct Decision {
    /// What the guard does with the request
    pub outcome: Outcome,
    /// Resolved identity; `None` when identity extraction failed
    pub identity: Option<Identity>,
    /// Id of the first role that granted access
    pub granted_by: Option<String>,
    /// Hook failure that forced the denial, if any
    pub failure: Option<RbacError>,
}

impl Decision {
    /// Whether a role granted access (independent of enforcement mode)
    pub fn can_access(&self) -> bool {
        self.granted_by.is_some()
    }
}

/// Decide `verb` on `group` for `request`.
///
/// `snapshot` is read once by the caller; `instance` is the per-guard
/// override applied on top of the snapshot's process-wide settings.
pub async fn decide(
    snapshot: &RegistrySnapshot,
    instance: &ConfigPatch,
    request: &Parts,
    verb: &str,
    group: &str,
) -> Decision {
    let config = instance.merge(snapshot.config);
    let target = format!("{}({})", verb, group);
    let info = RequestInfo::from_parts(request);

    debug!(operation = %target, hooks = ?snapshot.hooks, config = ?config, "RBAC: deciding");

    let identity = match resolve_identity(&snapshot.hooks, request).await {
        Ok(identity) => identity,
        Err(e) => return fail(config, &info, &target, None, e),
    };

    debug!(
        operation = %target,
        identity = %identity,
        actor = %identity.actor().kind(),
        "RBAC: auth"
    );

    let roles = match resolve_roles(&snapshot.hooks, &identity).await {
        Ok(roles) => roles,
        Err(e) => return fail(config, &info, &target, Some(identity), e),
    };

    debug!(
        operation = %target,
        roles = ?roles.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
        "RBAC: roles"
    );

    let granted_by = granting_role(&roles, verb, group).map(|role| role.id.clone());
    let outcome = Outcome::from_access(granted_by.is_some(), config);

    match outcome {
        Outcome::Allow => debug!(
            operation = %target,
            identity = %identity,
            role = granted_by.as_deref().unwrap_or_default(),
            "RBAC: access granted"
        ),
        Outcome::DenyObserved => warn!(
            peer = %info.peer_label(),
            method = %info.method,
            path = %info.path,
            operation = %target,
            identity = %identity,
            actor = %identity.actor().kind(),
            "RBAC: LOG ONLY: Permission Denied"
        ),
        Outcome::DenyEnforced => warn!(
            peer = %info.peer_label(),
            method = %info.method,
            path = %info.path,
            operation = %target,
            identity = %identity,
            actor = %identity.actor().kind(),
            "RBAC: Permission Denied"
        ),
    }

    Decision {
        outcome,
        identity: Some(identity),
        granted_by,
        failure: None,
    }
}

fn fail(
    config: GuardConfig,
    info: &RequestInfo,
    target: &str,
    identity: Option<Identity>,
    failure: RbacError,
) -> Decision {
    let outcome = Outcome::from_access(false, config);
    error!(
        peer = %info.peer_label(),
        method = %info.method,
        path = %info.path,
        operation = %target,
        identity = %identity.as_ref().map(|i| i.to_string()).unwrap_or_default(),
        kind = failure.kind(),
        error = %failure,
        outcome = %outcome,
        "RBAC: EXCEPTION"
    );
    Decision {
        outcome,
        identity,
        granted_by: None,
        failure: Some(failure),
    }
}
