//! Error types for rolegate RBAC

use thiserror::Error;

/// Errors that can occur while resolving a decision or wiring the guard.
///
/// None of these reach the caller of a guarded operation; the guard maps
/// every one of them onto the configured denial branch and reports the
/// detail through tracing only.
#[derive(Error, Debug)]
pub enum RbacError {
    #[error("Identity resolution failed: {0}")]
    IdentityResolution(String),

    #[error("Role lookup failed: {0}")]
    RoleLookup(String),

    #[error("Role lookup returned an unexpected value: {0}")]
    RoleLookupContract(String),

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RbacError {
    /// Stable label used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            RbacError::IdentityResolution(_) => "identity_resolution",
            RbacError::RoleLookup(_) => "role_lookup",
            RbacError::RoleLookupContract(_) => "role_lookup_contract",
            RbacError::RoleNotFound(_) => "role_not_found",
            RbacError::Configuration(_) => "configuration",
            RbacError::Serialization(_) => "serialization",
        }
    }
}

/// Result type for RBAC operations
pub type RbacResult<T> = std::result::Result<T, RbacError>;
