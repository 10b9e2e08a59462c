//! Process-level CLI surface and the `TurretConfig` bundle built from it.
//! `Cli` follows `mayara-server`'s flat-flags style (clap derive,
//! `clap-verbosity-flag`); the spec's handful of tunables fit directly on
//! the command line, so no separate config-file layer is introduced (§10).

use std::time::Duration;

use clap::Parser;

use turret_core::aim::{AxisCalibration, AimTransform};
use turret_core::motion_intent::{AxisLimits, MotionConfig};
use turret_core::pattern::PatternConfig;
use turret_core::state_machine::StateMachineConfig;
use turret_core::tracking::TrackingConfig;

use crate::motion_streamer::StreamerConfig;

#[derive(Parser, Clone, Debug)]
#[command(name = "turret-server", about = "Autonomous bird-deterrence laser turret control")]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// WebSocket URL of the motion controller's JSON-RPC endpoint.
    #[arg(long, default_value = "ws://127.0.0.1:7125/websocket")]
    pub motion_url: String,

    /// Base URL of the laser's HTTP endpoint (no trailing slash).
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    pub laser_url: String,

    /// Serial device path for the IMU feed.
    #[arg(long, default_value = "/dev/ttyUSB0")]
    pub imu_port: String,

    /// IMU serial baud rate.
    #[arg(long, default_value_t = 115200)]
    pub imu_baud: u32,

    /// Degrees to subtract from the raw IMU roll to account for mounting.
    #[arg(long, default_value_t = 0.0)]
    pub imu_mounting_offset_deg: f64,

    /// Maximum age, in seconds, before a roll sample is treated as stale for
    /// the TRACK→DETERRING gate. Unset means the gate is disabled (§9).
    #[arg(long)]
    pub imu_max_roll_age_secs: Option<f64>,

    /// Path to the calibration document (defaults to the platform data dir).
    #[arg(long)]
    pub calibration_path: Option<std::path::PathBuf>,

    /// Name of the calibration record to load at startup.
    #[arg(long, default_value = "default")]
    pub calibration_name: String,

    /// Main control loop tick rate, Hz.
    #[arg(long, default_value_t = 30.0)]
    pub tick_hz: f64,

    /// Laser height above the ground plane, meters.
    #[arg(long, default_value_t = 1.119)]
    pub laser_height_m: f64,

    /// Command units per radian for the X (yaw) axis (`rotation_distance/(2*pi)`).
    #[arg(long, default_value_t = 114.59)]
    pub x_axis_scale: f64,

    /// Command units per radian for the Y (pitch) axis.
    #[arg(long, default_value_t = 114.59)]
    pub y_axis_scale: f64,

    /// Command-unit limits for the X axis.
    #[arg(long, default_value_t = -50.0)]
    pub x_min: f64,
    #[arg(long, default_value_t = 50.0)]
    pub x_max: f64,

    /// Command-unit limits for the Y axis.
    #[arg(long, default_value_t = -50.0)]
    pub y_min: f64,
    #[arg(long, default_value_t = 50.0)]
    pub y_max: f64,

    /// Command-unit limits for the Z (search/track) axis.
    #[arg(long, default_value_t = 0.0)]
    pub z_min: f64,
    #[arg(long, default_value_t = 100.0)]
    pub z_max: f64,

    /// Neutral (beam straight-ahead, level) command-unit position per axis
    /// — the reference every Δ value is added to.
    #[arg(long, default_value_t = 0.0)]
    pub x_neutral: f64,
    #[arg(long, default_value_t = 0.0)]
    pub y_neutral: f64,
    #[arg(long, default_value_t = 50.0)]
    pub z_neutral: f64,

    /// Minimum |Δz| worth sending during streaming.
    #[arg(long, default_value_t = 0.05)]
    pub z_deadband: f64,

    /// Feedrate used for every emitted move, mm/min.
    #[arg(long, default_value_t = 6000)]
    pub feedrate_mm_per_min: u32,

    /// Tracking controller proportional gain.
    #[arg(long, default_value_t = 0.003)]
    pub tracking_k_p: f64,

    /// Tracking controller per-tick step clamp.
    #[arg(long, default_value_t = 3.0)]
    pub tracking_step_max: f64,

    /// Tracking controller minimum step worth sending.
    #[arg(long, default_value_t = 0.05)]
    pub tracking_step_min: f64,

    /// Tracking pixel deadzone around frame center.
    #[arg(long, default_value_t = 30.0)]
    pub tracking_deadzone_px: f32,

    /// Detection frame width, pixels (defines the tracking center column).
    #[arg(long, default_value_t = 640)]
    pub frame_width: u32,

    /// Consecutive missed-target frames before the tracker reports lost.
    #[arg(long, default_value_t = 15)]
    pub tracking_lost_threshold: u32,

    /// Search sweep bounds and step on the Z axis, command units.
    #[arg(long, default_value_t = 0.0)]
    pub search_min: f32,
    #[arg(long, default_value_t = 100.0)]
    pub search_max: f32,
    #[arg(long, default_value_t = 1.0)]
    pub search_step: f32,

    /// Minimum confidence to count a Bird detection.
    #[arg(long, default_value_t = 0.7)]
    pub bird_confidence_gate: f32,

    /// Minimum confidence to count a Human detection (safety interrupt).
    #[arg(long, default_value_t = 0.5)]
    pub human_confidence_gate: f32,

    /// Consecutive confirming ticks before SEARCH→TRACK.
    #[arg(long, default_value_t = 3)]
    pub confirm_ticks: u32,

    /// Ground distance window (meters) that gates TRACK→DETERRING.
    #[arg(long, default_value_t = 1.0)]
    pub distance_min_m: f32,
    #[arg(long, default_value_t = 20.0)]
    pub distance_max_m: f32,

    /// Minimum time in DETERRING before it is eligible to exit, ms.
    #[arg(long, default_value_t = 2000)]
    pub debounce_ms: u64,

    /// Pixel error beyond which DETERRING is considered "re-centered away".
    #[arg(long, default_value_t = 50.0)]
    pub re_center_error_px: f32,

    /// Deterrence pattern side length, meters.
    #[arg(long, default_value_t = 1.0)]
    pub pattern_side_m: f64,

    /// Deterrence pattern traversal speed (controller units).
    #[arg(long, default_value_t = 50.0)]
    pub pattern_speed: f64,

    /// Deterrence pattern per-corner dwell, seconds.
    #[arg(long, default_value_t = 0.5)]
    pub pattern_dwell_s: f64,

    /// Timeout for blocking motion controller calls (init/shutdown), ms.
    #[arg(long, default_value_t = 5000)]
    pub blocking_call_timeout_ms: u64,
}

/// Everything the engine needs, assembled once from [`Cli`] and handed by
/// reference to every component constructor (§9: configuration is an
/// immutable bundle, never global).
#[derive(Debug, Clone)]
pub struct TurretConfig {
    pub motion_url: String,
    pub laser_url: String,
    pub imu_port: String,
    pub imu_baud: u32,
    pub imu_mounting_offset_deg: f64,
    pub imu_max_roll_age_secs: Option<f64>,
    pub calibration_path: Option<std::path::PathBuf>,
    pub calibration_name: String,
    pub tick_interval: Duration,
    pub blocking_call_timeout: Duration,

    pub x_neutral: f64,
    pub y_neutral: f64,
    pub z_neutral: f64,

    pub aim: AimTransform,
    pub motion: MotionConfig,
    pub streamer: StreamerConfig,
    pub tracking: TrackingConfig,
    pub state_machine: StateMachineConfig,
    pub pattern: PatternConfig,

    pub search_min: f32,
    pub search_max: f32,
    pub search_step: f32,
}

impl TurretConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        let motion = MotionConfig {
            x_limits: AxisLimits { min: cli.x_min, max: cli.x_max },
            y_limits: AxisLimits { min: cli.y_min, max: cli.y_max },
            z_limits: AxisLimits { min: cli.z_min, max: cli.z_max },
            z_deadband: cli.z_deadband,
        };

        TurretConfig {
            motion_url: cli.motion_url.clone(),
            laser_url: cli.laser_url.clone(),
            imu_port: cli.imu_port.clone(),
            imu_baud: cli.imu_baud,
            imu_mounting_offset_deg: cli.imu_mounting_offset_deg,
            imu_max_roll_age_secs: cli.imu_max_roll_age_secs,
            calibration_path: cli.calibration_path.clone(),
            calibration_name: cli.calibration_name.clone(),
            tick_interval: Duration::from_secs_f64(1.0 / cli.tick_hz),
            blocking_call_timeout: Duration::from_millis(cli.blocking_call_timeout_ms),

            x_neutral: cli.x_neutral,
            y_neutral: cli.y_neutral,
            z_neutral: cli.z_neutral,

            aim: AimTransform {
                laser_height_m: cli.laser_height_m,
                x_axis: AxisCalibration { scale: cli.x_axis_scale, sign: 1.0 },
                y_axis: AxisCalibration { scale: cli.y_axis_scale, sign: 1.0 },
            },
            motion,
            streamer: StreamerConfig {
                motion,
                rate_hz: cli.tick_hz,
                feedrate_mm_per_min: cli.feedrate_mm_per_min,
            },
            tracking: TrackingConfig {
                frame_width: cli.frame_width,
                deadzone_px: cli.tracking_deadzone_px,
                k_p: cli.tracking_k_p as f32,
                step_max: cli.tracking_step_max as f32,
                step_min: cli.tracking_step_min as f32,
                confidence_gate: cli.bird_confidence_gate,
                lost_threshold: cli.tracking_lost_threshold,
            },
            state_machine: StateMachineConfig {
                bird_confidence_gate: cli.bird_confidence_gate,
                human_confidence_gate: cli.human_confidence_gate,
                confirm_ticks: cli.confirm_ticks,
                distance_min: cli.distance_min_m,
                distance_max: cli.distance_max_m,
                debounce_ms: cli.debounce_ms,
                re_center_error_px: cli.re_center_error_px,
                require_roll_fresh: cli.imu_max_roll_age_secs.is_some(),
            },
            pattern: PatternConfig {
                side_m: cli.pattern_side_m,
                speed: cli.pattern_speed,
                dwell_s: cli.pattern_dwell_s,
            },

            search_min: cli.search_min,
            search_max: cli.search_max,
            search_step: cli.search_step,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cli_builds_a_consistent_config() {
        let cli = Cli::parse_from(["turret-server"]);
        let config = TurretConfig::from_cli(&cli);
        assert!(config.motion.z_limits.min < config.motion.z_limits.max);
        assert_eq!(config.state_machine.require_roll_fresh, false);
    }

    #[test]
    fn setting_max_roll_age_enables_the_freshness_gate() {
        let cli = Cli::parse_from(["turret-server", "--imu-max-roll-age-secs", "1.0"]);
        let config = TurretConfig::from_cli(&cli);
        assert!(config.state_machine.require_roll_fresh);
    }
}
