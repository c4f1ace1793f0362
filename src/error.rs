//! Error types.

use thiserror::Error;

/// Errors raised while building a [`LocomotionController`](crate::controller::LocomotionController).
///
/// An actor whose controller fails to build is marked
/// [`LocomotionDisabled`](crate::state::LocomotionDisabled) and never ticked.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("actor has no collider to read capsule dimensions from")]
    MissingCollider,

    #[error("actor collider is not a capsule standing on the actor origin")]
    UnsupportedCollider,

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidValue { field, reason }
    }
}
