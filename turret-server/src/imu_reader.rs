//! IMU Feed (C11) I/O half: a blocking-style serial line reader subsystem
//! feeding `turret_core::imu::ImuLineParser`. Structured like the other
//! single-writer background tasks in this crate (see `vision.rs`,
//! `motion_transport.rs`): own the hardware handle, publish the latest
//! parsed value into a shared slot, and exit cleanly on transport loss
//! rather than attempting any self-healing reconnect (§4.11: "On transport
//! loss the task exits").

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle};
use tokio_serial::SerialPortBuilderExt;

use turret_core::imu::{ImuLineParser, RollSample};

/// Shared last-known-roll slot. `PlatformRoll` per §5: "word-sized
/// load/store... otherwise a short lock" — a `Mutex<Option<RollSample>>` is
/// the short-lock form, since `RollSample` is two `f64`s and not atomic on
/// every target.
#[derive(Clone)]
pub struct PlatformRoll {
    inner: Arc<Mutex<Option<RollSample>>>,
    monotonic_start: Instant,
}

impl PlatformRoll {
    pub fn new() -> Self {
        PlatformRoll {
            inner: Arc::new(Mutex::new(None)),
            monotonic_start: Instant::now(),
        }
    }

    pub fn now_secs(&self) -> f64 {
        self.monotonic_start.elapsed().as_secs_f64()
    }

    /// The most recent roll reading, if the IMU has ever produced a valid
    /// line. `None` before the first sample, never cleared afterward — C3
    /// continues to read the last value per §4.11/§7.
    pub fn latest(&self) -> Option<RollSample> {
        *self.inner.lock().unwrap()
    }

    fn set(&self, sample: RollSample) {
        *self.inner.lock().unwrap() = Some(sample);
    }
}

impl Default for PlatformRoll {
    fn default() -> Self {
        Self::new()
    }
}

/// Open the serial port and run the read loop until the transport is lost
/// or shutdown is requested.
async fn run_imu_reader(
    subsys: SubsystemHandle,
    port_path: String,
    baud_rate: u32,
    mounting_offset_deg: f64,
    roll: PlatformRoll,
) -> anyhow::Result<()> {
    let parser = ImuLineParser::new(mounting_offset_deg)?;

    let port = tokio_serial::new(&port_path, baud_rate)
        .timeout(Duration::from_millis(500))
        .open_native_async()?;
    log::info!("IMU reader connected to {port_path} at {baud_rate} baud");

    let mut lines = BufReader::new(port).lines();

    loop {
        tokio::select! {
            _ = subsys.on_shutdown_requested() => return Ok(()),
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let now = roll.now_secs();
                        if let Some(sample) = parser.parse(&line, now) {
                            roll.set(sample);
                        }
                        // Malformed lines are silently skipped per §4.11.
                    }
                    Ok(None) => {
                        log::warn!("IMU serial port {port_path} closed (EOF)");
                        return Ok(());
                    }
                    Err(e) => {
                        log::warn!("IMU serial read error on {port_path}: {e}");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Spawn the IMU reader as a named subsystem.
pub fn spawn_imu_reader(
    subsys: &SubsystemHandle,
    port_path: String,
    baud_rate: u32,
    mounting_offset_deg: f64,
    roll: PlatformRoll,
) {
    subsys.start(SubsystemBuilder::new("ImuReader", move |s| {
        run_imu_reader(s, port_path, baud_rate, mounting_offset_deg, roll)
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_roll_starts_empty() {
        let roll = PlatformRoll::new();
        assert!(roll.latest().is_none());
    }

    #[test]
    fn platform_roll_retains_last_value_after_set() {
        let roll = PlatformRoll::new();
        roll.set(RollSample {
            roll_rad: 0.1,
            timestamp: 0.0,
        });
        let sample = roll.latest().unwrap();
        assert!((sample.roll_rad - 0.1).abs() < 1e-9);
    }
}
