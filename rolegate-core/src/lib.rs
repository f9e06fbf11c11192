//! # Rolegate Core
//!
//! Framework-free building blocks for role-based authorization of
//! verb/group operations:
//!
//! - [`Role`] and [`Rule`]: a named, optionally tenant-scoped bundle of
//!   matching clauses.
//! - [`GroupMatcher`] and [`VerbMatcher`]: the tagged form of a rule's
//!   `group` and `verb`/`verbs` keys.
//! - [`Identity`] and [`Actor`]: who is behind a request, with the
//!   user > client > anonymous precedence.
//! - [`evaluate_role`] and [`evaluate_roles`]: the rule evaluator.
//!
//! ## Example
//!
//! ```rust
//! use rolegate_core::prelude::*;
//!
//! let role = Role::new("clerk", "Invoice clerk")
//!     .with_rule(Rule::new(GroupMatcher::exact("invoice"), VerbMatcher::set(["read", "update"])));
//!
//! assert!(evaluate_role(&role, "read", "invoice"));
//! assert!(!evaluate_role(&role, "delete", "invoice"));
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod evaluator;
pub mod types;

pub use error::{Error, Result};
pub use evaluator::{evaluate_role, evaluate_roles, granting_role};
pub use types::*;

/// Common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::evaluator::{evaluate_role, evaluate_roles, granting_role};
    pub use crate::types::*;
}
