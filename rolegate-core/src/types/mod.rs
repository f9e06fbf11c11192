//! Model types shared by every rolegate crate.

pub mod identity;
pub mod role;

pub use identity::*;
pub use role::*;
