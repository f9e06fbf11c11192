//! Error types for the rolegate model.
//!
//! Evaluation itself never fails: a rule that cannot match simply does not
//! match. Errors here only come from decoding role records.

use thiserror::Error;

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or decoding roles and rules.
#[derive(Debug, Error)]
pub enum Error {
    /// A rule record is structurally unusable (e.g. no `group`).
    #[error("Invalid rule: {0}")]
    InvalidRule(String),
}
