//! Process entry point: parses CLI args, initializes logging, and runs
//! either the `calibrate` capture front-end or the main control loop under
//! `tokio-graceful-shutdown`'s `Toplevel`, the same composition root shape
//! `mayara-server`'s binary uses.

use std::io::{stdin, stdout};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_graceful_shutdown::Toplevel;

use turret_core::calibration::{CaptureResolution, CaptureSession};
use turret_server::calibrate::{run_capture_session, save_capture};
use turret_server::config::Cli;
use turret_server::error::TurretError;
use turret_server::storage::CalibrationStore;
use turret_server::vision::{DetectorSource, Frame};

#[derive(Parser, Debug)]
#[command(name = "turret-server")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: Cli,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactively capture row/distance points and save them as a named
    /// calibration (C10), then exit without starting the control loop.
    Calibrate {
        /// Name to save the capture under.
        #[arg(long, default_value = "default")]
        name: String,
        /// Free-text note on how the points were captured.
        #[arg(long, default_value = "manual")]
        source: String,
        #[arg(long, default_value_t = 640)]
        width: u32,
        #[arg(long, default_value_t = 480)]
        height: u32,
    },
}

/// No camera or detection model ships with this crate (§1 external
/// collaborators); a real deployment links one in through
/// [`DetectorSource`]. This stand-in always reports no detections, which
/// keeps the control loop in SEARCH until a real detector is wired in.
struct NoDetector;

impl DetectorSource for NoDetector {
    fn detect(&mut self, _frame: &Frame) -> Vec<turret_core::detection::RawDetection> {
        Vec::new()
    }
}

fn no_frame_source() -> Option<Frame> {
    None
}

fn run_calibrate(args: &Cli, name: &str, source: &str, width: u32, height: u32) -> Result<(), TurretError> {
    let mut store = match &args.calibration_path {
        Some(path) => CalibrationStore::open(path.clone())?,
        None => CalibrationStore::open_default()?,
    };

    let session: CaptureSession = run_capture_session(stdin().lock(), stdout())
        .map_err(|e| TurretError::Other(e.into()))?;

    let captured_at = chrono::Utc::now().timestamp().max(0) as u64;
    save_capture(
        &mut store,
        &session,
        name,
        source,
        CaptureResolution { width, height },
        captured_at,
    )?;

    println!("saved calibration '{name}' ({} points)", session.points().len());
    Ok(())
}

async fn run_server(args: Cli) -> miette::Result<()> {
    Toplevel::new(move |s| {
        let args = args.clone();
        async move {
            turret_server::run(s, args, no_frame_source, Box::new(NoDetector)).await.inspect_err(|e| {
                log::error!("turret-server: {e}");
            })
        }
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_secs(5))
    .await
    .map_err(|e| miette::miette!("{e}"))
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.run.verbose.log_level_filter())
        .init();

    match &args.command {
        Some(Command::Calibrate { name, source, width, height }) => {
            run_calibrate(&args.run, name, source, *width, *height)
                .map_err(|e| miette::miette!("{e}"))?;
            Ok(())
        }
        None => run_server(args.run).await,
    }
}
