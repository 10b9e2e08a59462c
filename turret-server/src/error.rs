//! Top-level error aggregation. `main`'s inner `run()` returns
//! `miette::Result<()>` (§7); every per-component error converts into
//! [`TurretError`] via `#[from]`, the same flat aggregation
//! `mayara-core::error::ParseError` callers fold into before reporting.

use miette::Diagnostic;
use thiserror::Error;

use turret_core::{AimError, CalibrationError, CaptureError};

use crate::calibrate::SaveCaptureError;
use crate::laser::LaserError;
use crate::storage::StorageError;

#[derive(Debug, Error, Diagnostic)]
pub enum TurretError {
    #[error("calibration storage: {0}")]
    Storage(#[from] StorageError),

    #[error("calibration: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("capture: {0}")]
    Capture(#[from] CaptureError),

    #[error("capture save: {0}")]
    SaveCapture(#[from] SaveCaptureError),

    #[error("aim transform: {0}")]
    Aim(#[from] AimError),

    #[error("laser actuator: {0}")]
    Laser(#[from] LaserError),

    #[error("no calibration named '{0}' found")]
    NoSuchCalibration(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
