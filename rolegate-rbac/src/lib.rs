//! Role-based access guard for axum services
//!
//! This crate wires the rule evaluator from `rolegate-core` into an HTTP
//! request pipeline through a registry of pluggable hooks.
//!
//! # Features
//!
//! - **Pluggable identity**: tenant, user and client ids come from
//!   request extensions, headers or any closure
//! - **Pluggable role storage**: one lookup per actor kind, or a single
//!   [`lookup::RoleLookup`] store for all three
//! - **Log-only rollout**: denials are logged but not blocked until
//!   enforcement is switched on, per process or per guard
//! - **Uniform denial**: every blocked request gets the same `403` body,
//!   whether no role matched or a hook failed
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use rolegate_core::{Role, Rule, VerbMatcher};
//! use rolegate_rbac::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn read_invoice() -> &'static str { "{}" }
//! # async fn run() -> RbacResult<()> {
//! let store = Arc::new(MemoryRoleStore::new());
//! store
//!     .upsert_role(Role::new("clerk", "Clerk").with_rule(Rule::new("invoice", VerbMatcher::exact("read"))))
//!     .await;
//! store.add_user_roles("u1", &["clerk".to_string()]).await?;
//!
//! let registry = Arc::new(HookRegistry::new());
//! registry
//!     .patch_hooks(
//!         HookPatch::new()
//!             .user_extractor(HeaderExtractor::named("x-user-id")?)
//!             .role_lookup(store),
//!     )
//!     .await;
//!
//! let rbac = RbacGuard::new(registry, ConfigPatch::enforcing());
//! let app: Router = Router::new().route(
//!     "/invoices/:id",
//!     get(read_invoice).route_layer(rbac.layer("read", "invoice")),
//! );
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod decision;
pub mod error;
pub mod hooks;
pub mod lookup;
pub mod middleware;
pub mod store;

pub mod prelude {
    //! Common imports for rolegate RBAC

    pub use crate::config::*;
    pub use crate::context::*;
    pub use crate::decision::{Decision, Outcome};
    pub use crate::error::*;
    pub use crate::hooks::*;
    pub use crate::lookup::*;
    pub use crate::middleware::{GuardLayer, GuardedOperation, RbacGuard, forbidden_response};
    pub use crate::store::MemoryRoleStore;
}

pub use error::{RbacError, RbacResult};
pub use middleware::RbacGuard;
