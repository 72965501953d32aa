//! Error types for petreco-core.

use thiserror::Error;

/// Result type alias for petreco operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for petreco operations.
///
/// Only contract violations and configuration problems are errors.
/// Data-quality conditions are counted in [`crate::Diagnostics`] instead.
#[derive(Error, Debug)]
pub enum Error {
    /// A stage was handed input that breaks its contract.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The geometry service has no entry for a photomultiplier.
    #[error("no geometry entry for PM {pm_id}")]
    MissingGeometry { pm_id: u32 },

    /// The geometry service has no entry for a scintillator.
    #[error("no geometry entry for scintillator {id}")]
    MissingScintillator { id: u32 },

    /// Hits were pushed into a streaming stage out of time order.
    #[error("hits out of time order: {next} ps arrived after {previous} ps")]
    UnorderedHits { previous: f64, next: f64 },
}

/// Fatal configuration problems, reported at startup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A width, window or length was negative.
    #[error("{key} must be non-negative, got {value}")]
    Negative { key: &'static str, value: f64 },

    /// A value was NaN or infinite.
    #[error("{key} must be finite")]
    NonFinite { key: &'static str },

    /// A `[min, max]` pair is inverted.
    #[error("{key}: minimum {min} exceeds maximum {max}")]
    InvalidRange {
        key: &'static str,
        min: f64,
        max: f64,
    },

    /// Unknown scatter or match policy name.
    #[error("unknown policy: {0}")]
    UnknownPolicy(String),

    /// Threshold level outside `1..=4`.
    #[error("threshold level must be within 1..=4, got {0}")]
    InvalidThreshold(u8),

    /// The layers hold more scintillators than photomultiplier ids can
    /// address.
    #[error("geometry holds {0} scintillators, more than the {max} addressable", max = crate::geometry::MAX_SCINTILLATORS)]
    TooManyScintillators(u64),

    /// A flat key/value parameter could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}
