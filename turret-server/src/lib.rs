//! # Turret Server
//!
//! Autonomous bird-deterrence laser turret control service.
//!
//! This crate provides the process that ties a vision detector, an IMU, a
//! motion controller, and a laser actuator together into one closed
//! perception→decision→actuation loop:
//!
//! - Pulls detections from a pluggable vision source and tracks the nearest
//!   bird across frames
//! - Streams aim commands to an external motion controller over a
//!   JSON-RPC/WebSocket transport
//! - Fires a square deterrence pattern at birds within range, and fires
//!   nothing at all when a human is in frame
//! - Persists named calibrations (pixel row → ground distance) to disk
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         turret-server                         │
//! │  ┌────────────┐  ┌────────────┐  ┌───────────┐  ┌───────────┐ │
//! │  │ Vision     │  │ IMU Reader │  │ Motion     │  │ Operator  │ │
//! │  │ Producer   │  │            │  │ Transport  │  │ Surface   │ │
//! │  └─────┬──────┘  └─────┬──────┘  └─────┬──────┘  └─────┬─────┘ │
//! │        │               │               │               │     │
//! │        ▼               ▼               ▼               ▼     │
//! │  ┌───────────────────────────────────────────────────────────┐│
//! │  │                          Engine                           ││
//! │  │  search / tracking / pattern / safety state machine       ││
//! │  └───────────────────────────────────────────────────────────┘│
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example: Starting the Server
//!
//! `frame_source`/`detector` are supplied by the binary entry point since
//! this crate ships neither a camera backend nor a detection model
//! (out of scope, §1); see `src/main.rs` for a concrete wiring.
//!
//! ```rust,no_run
//! use clap::Parser;
//! use turret_server::{run, Cli};
//! use turret_server::vision::{DetectorSource, Frame};
//! use tokio_graceful_shutdown::Toplevel;
//! use std::time::Duration;
//!
//! struct NoDetector;
//! impl DetectorSource for NoDetector {
//!     fn detect(&mut self, _frame: &Frame) -> Vec<turret_core::detection::RawDetection> {
//!         Vec::new()
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let args = Cli::parse_from(["turret-server"]);
//!
//!     Toplevel::new(|s| async move {
//!         if let Err(e) = run(s, args, || None, Box::new(NoDetector)).await {
//!             log::error!("turret-server: {e}");
//!         }
//!     })
//!     .catch_signals()
//!     .handle_shutdown_requests(Duration::from_secs(5))
//!     .await
//!     .unwrap();
//! }
//! ```

pub mod calibrate;
pub mod config;
pub mod engine;
pub mod error;
pub mod imu_reader;
pub mod laser;
pub mod motion_streamer;
pub mod motion_transport;
pub mod operator;
pub mod storage;
pub mod vision;

pub use config::{Cli, TurretConfig};

use tokio::sync::mpsc;
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle};

use engine::Engine;
use imu_reader::{spawn_imu_reader, PlatformRoll};
use laser::LaserActuator;
use motion_streamer::MotionStreamer;
use motion_transport::MotionTransport;
use operator::spawn_operator;
use storage::CalibrationStore;
use vision::{spawn_vision_producer, DetectionSlot, Frame};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wires every subsystem under `subsys` and runs until shutdown is
/// requested, the same top-level composition role
/// `mayara_server::Session::new` plays for its own subsystems.
///
/// `frame_source`/`detector` are supplied by the caller since this crate
/// does not ship a camera backend or a detection model (out of scope, §1);
/// `main.rs` wires in whatever the deployment actually uses.
pub async fn run(
    subsys: SubsystemHandle,
    args: Cli,
    frame_source: impl FnMut() -> Option<Frame> + Send + 'static,
    detector: Box<dyn vision::DetectorSource>,
) -> anyhow::Result<()> {
    let config = TurretConfig::from_cli(&args);

    let mut store = match &config.calibration_path {
        Some(path) => CalibrationStore::open(path.clone())?,
        None => CalibrationStore::open_default()?,
    };
    let record = store
        .get(&config.calibration_name)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("no calibration named '{}' found", config.calibration_name))?;
    let calibration = record.calibration()?;

    let transport = MotionTransport::connect(&subsys, config.motion_url.clone()).await;
    let pattern_cycle = transport.pattern_cycle_signal();
    let motion = MotionStreamer::new(transport, config.streamer);
    let laser = LaserActuator::new(config.laser_url.clone(), config.blocking_call_timeout);

    let detections = DetectionSlot::new();
    spawn_vision_producer(
        &subsys,
        frame_source,
        detector,
        None,
        config.state_machine.bird_confidence_gate,
        detections.clone(),
        config.tick_interval,
    );

    let roll = PlatformRoll::new();
    spawn_imu_reader(
        &subsys,
        config.imu_port.clone(),
        config.imu_baud,
        config.imu_mounting_offset_deg,
        roll.clone(),
    );

    let (commands_tx, commands_rx) = mpsc::channel(8);
    spawn_operator(&subsys, commands_tx);

    let engine = Engine::new(config, calibration, motion, laser, detections, roll, pattern_cycle);
    subsys.start(SubsystemBuilder::new("Engine", move |s| {
        engine.run(s, commands_rx)
    }));

    subsys.on_shutdown_requested().await;
    Ok(())
}
