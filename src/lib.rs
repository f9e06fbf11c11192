//! # Rolegate - role-based access control for Rust HTTP services
//!
//! This crate re-exports the constituent crates:
//! - `rolegate-core`: roles, rules, identities and the rule evaluator
//! - `rolegate-rbac`: hook registry, role stores and the axum guard

pub use rolegate_core as core;
pub use rolegate_rbac as rbac;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::core::prelude::*;
    pub use crate::rbac::prelude::*;
}
