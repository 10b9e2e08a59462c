//! Error types for the turret control loop.

use thiserror::Error;

/// Errors from loading or querying a distance calibration (C2/C10).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Fewer than the required minimum number of points were supplied.
    #[error("calibration needs at least {required} points, got {actual}")]
    TooFewPoints { required: usize, actual: usize },

    /// Two points share the same row after sorting.
    #[error("duplicate row pixel {row} in calibration")]
    DuplicateRow { row: i32 },

    /// Distances are not strictly monotone (in either direction) by row.
    #[error("calibration distances are not strictly monotone by row")]
    NotMonotone,
}

/// Errors from the aim transform (C3).
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum AimError {
    /// Forward ground distance was zero or negative.
    #[error("invalid target: forward distance {z} must be > 0")]
    InvalidTarget { z: f64 },
}

/// Errors from interactive calibration capture (C10).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// Save was attempted before the minimum point count was reached.
    #[error("need at least {required} captured points to save, have {actual}")]
    NotEnoughPoints { required: usize, actual: usize },

    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

/// Errors surfaced by the motion transport (C1). Lives in core so that
/// `state_machine` and `motion_intent` can reason about transport failure
/// without depending on the concrete transport implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// A `call` did not receive a matching response within its timeout.
    #[error("request {id} timed out after {timeout_ms} ms")]
    Timeout { id: u64, timeout_ms: u64 },

    /// The transport was closed, failing all outstanding waiters.
    #[error("transport closed")]
    Closed,

    /// The underlying connection reported an error.
    #[error("transport error: {0}")]
    Io(String),
}

/// Errors from the IMU line reader (C11).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImuError {
    /// The serial-like transport was lost; the reader task exits.
    #[error("IMU transport lost: {0}")]
    TransportLost(String),
}
