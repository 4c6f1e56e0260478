//! Error types for Repsense
//!
//! Only configuration and reference handling can fail. Per-frame processing
//! never returns an error: a frame without a usable signal is a no-op.

use thiserror::Error;

/// Core Repsense errors
#[derive(Error, Debug)]
pub enum RepsenseError {
    // Joint table errors
    #[error("Unknown joint: {0}")]
    UnknownJoint(String),

    #[error("Duplicate joint name: {0}")]
    DuplicateJoint(String),

    #[error("Landmark index {index} out of range for joint {joint} (max {max})")]
    LandmarkIndexOutOfRange {
        joint: String,
        index: usize,
        max: usize,
    },

    #[error("Joint {0} must reference three distinct landmarks")]
    DegenerateJoint(String),

    // Tuning errors
    #[error("Smoothing alpha for {name} must be in (0, 1], got {value}")]
    InvalidAlpha { name: &'static str, value: f32 },

    #[error("Invalid weight {weight} for joint {joint}")]
    InvalidWeight { joint: String, weight: f32 },

    #[error("Invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f32 },

    #[error("Thresholds inverted: low {low} > high {high}")]
    InvertedThresholds { low: f32, high: f32 },

    // Phase errors
    #[error("Completion edge {from} -> {to} cannot be produced by the phase rule")]
    UnreachableCompletion { from: String, to: String },

    #[error("Phase rule does not fit a {0} signal")]
    IncompatibleRule(&'static str),

    #[error("Limb set is empty")]
    NoLimbs,

    #[error("Duplicate limb name: {0}")]
    DuplicateLimb(String),

    #[error("Limb {0} has no driving joints")]
    EmptyLimb(String),

    // Reference errors
    #[error("Reference frame has no measurable joints")]
    EmptyReference,

    #[error("No start reference saved")]
    NoReference,

    // Loading errors
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Repsense operations
pub type RepsenseResult<T> = Result<T, RepsenseError>;
