//! Rule evaluation
//!
//! A role grants `verb` on `group` when any of its rules matches. Rules are
//! visited in list order and each visited rule is traced at debug level, so
//! a given role list always yields the same trace. Evaluation stops at the
//! first match; the boolean is the same as a full scan.

use crate::types::Role;
use tracing::debug;

/// Whether `role` grants `verb` on `group`.
///
/// An empty rule list never grants.
pub fn evaluate_role(role: &Role, verb: &str, group: &str) -> bool {
    role.rules.iter().any(|rule| {
        let matched = rule.matches(verb, group);
        debug!(
            role = %role.id,
            rule = %rule,
            operation = %format_args!("{}({})", verb, group),
            matched,
            "RBAC: eval rule"
        );
        matched
    })
}

/// The first role in `roles` that grants `verb` on `group`.
pub fn granting_role<'a>(roles: &'a [Role], verb: &str, group: &str) -> Option<&'a Role> {
    roles.iter().find(|role| {
        let granted = evaluate_role(role, verb, group);
        debug!(
            role = %role,
            operation = %format_args!("{}({})", verb, group),
            granted,
            "RBAC: eval role"
        );
        granted
    })
}

/// OR of [`evaluate_role`] over `roles`; an empty list never grants.
pub fn evaluate_roles(roles: &[Role], verb: &str, group: &str) -> bool {
    granting_role(roles, verb, group).is_some()
}
