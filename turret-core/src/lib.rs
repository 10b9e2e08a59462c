//! # Turret Core
//!
//! Platform-independent control logic for an autonomous bird-deterrence
//! turret. This crate contains pure state machines, transforms, and parsers
//! with **zero I/O dependencies** — no tokio, no sockets, no serial ports —
//! so the control logic can be exercised and tested without any hardware.
//!
//! ## Architecture
//!
//! `turret-core` is the shared foundation for `turret-server`, which
//! supplies all the actual I/O (WebSocket motion transport, HTTP laser
//! endpoint, serial IMU reader, terminal operator surface) and drives this
//! crate's state machines from tokio tasks.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  turret-core (platform-independent, no tokio/async deps)   │
//! │  ├── detection       (Detection, staleness)                │
//! │  ├── distance        (C2: row → ground distance)           │
//! │  ├── aim             (C3: ground target → mirror deltas)   │
//! │  ├── motion_intent   (C4 core: diff/clamp/deadband)        │
//! │  ├── search          (C6: bouncing sweep)                  │
//! │  ├── tracking        (C7: proportional pixel corrector)    │
//! │  ├── pattern         (C8: square deterrence geometry)      │
//! │  ├── state_machine   (C9: SystemMode + safety transitions) │
//! │  ├── calibration     (C2/C10: calibration data + record)   │
//! │  └── imu             (C11 core: line parsing + roll)       │
//! └─────────────────────────────────────────────────────────────┘
//!                 ▲
//!    ┌────────────┴────────────┐
//!    │  turret-server          │
//!    │  (tokio I/O, CLI, HTTP) │
//!    └─────────────────────────┘
//! ```
//!
//! ## Key Modules
//!
//! - [`detection`] - The shared `Detection` value and its staleness rule
//! - [`distance`] - Piecewise-linear row→distance interpolator (C2)
//! - [`aim`] - Ground-target-to-mirror-axis transform (C3)
//! - [`motion_intent`] - Intent diffing, clamping, deadband (C4)
//! - [`search`] - Deterministic bouncing sweep (C6)
//! - [`tracking`] - Proportional tracking corrector with hysteresis (C7)
//! - [`pattern`] - Deterrence square geometry (C8)
//! - [`state_machine`] - `SystemMode` and safety transitions (C9)
//! - [`calibration`] - Calibration points, interpolator validation, records
//! - [`imu`] - IMU line parsing and roll freshness (C11)
//! - [`error`] - Per-component error types

pub mod aim;
pub mod calibration;
pub mod detection;
pub mod distance;
pub mod error;
pub mod imu;
pub mod motion_intent;
pub mod pattern;
pub mod search;
pub mod state_machine;
pub mod tracking;

pub use aim::{AimInputs, AimTransform};
pub use calibration::{Calibration, CalibrationPoint, CalibrationRecord};
pub use detection::{BBox, Detection, DetectionClass};
pub use distance::DistanceModel;
pub use error::{AimError, CalibrationError, CaptureError, ImuError, TransportError};
pub use imu::{ImuLineParser, RollSample};
pub use motion_intent::{MotionIntent, MotionState};
pub use pattern::{define_pattern, PatternConfig, PatternDefinition};
pub use search::SearchState;
pub use state_machine::{SafetyStateMachine, SideEffect, SystemMode};
pub use tracking::{TrackerState, TrackingConfig, TrackingOutcome};
