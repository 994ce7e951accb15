//! Error types for vegetation construction.

use thiserror::Error;

/// Errors raised while building the vegetation scene.
///
/// Per-frame updates never fail; every variant here is a construction-time error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VegetationError {
    #[error("invalid config `{field}`: {reason} (got {value})")]
    InvalidConfig {
        field: String,
        value: String,
        reason: &'static str,
    },

    #[error("iso-surface for foliage variant {variant} exceeded {limit} triangles")]
    SurfaceCapacity { variant: usize, limit: usize },

    #[error("config parse error: {0}")]
    Parse(String),
}

impl VegetationError {
    pub(crate) fn invalid(field: impl Into<String>, value: impl ToString, reason: &'static str) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            value: value.to_string(),
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, VegetationError>;
