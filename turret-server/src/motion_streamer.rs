//! Motion Streamer (C4) async half: owns `turret_core::motion_intent`'s pure
//! diff/clamp state behind a single `std::sync::Mutex`, the way
//! `mayara_core::connection::ConnectionManager` guards connection state, and
//! turns the resulting plan into the exact wire scripts of the motion
//! controller protocol.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use turret_core::motion_intent::{MotionConfig, MotionIntent, MotionPlan, MotionState};
use turret_core::pattern::PatternDefinition;

use crate::motion_transport::MotionTransport;

/// Tuning for the streaming cadence and wire formatting, layered on top of
/// the pure [`MotionConfig`].
#[derive(Debug, Clone, Copy)]
pub struct StreamerConfig {
    pub motion: MotionConfig,
    pub rate_hz: f64,
    /// Precomputed once from the configured angular velocity and the
    /// per-axis command scale (§4.4 "compute a feedrate from a configured
    /// angular velocity"); an integer mm/min value per §6's numeric
    /// formatting rule.
    pub feedrate_mm_per_min: u32,
}

struct Inner {
    state: MotionState,
    last_send: Option<Instant>,
}

/// Shared streaming handle: safe to hold from the main control loop and
/// clone into other tasks. Guards the pure diff state with a plain
/// `std::sync::Mutex` since ticks are short and CPU-bound.
pub struct MotionStreamer {
    transport: MotionTransport,
    config: StreamerConfig,
    inner: Mutex<Inner>,
}

impl MotionStreamer {
    pub fn new(transport: MotionTransport, config: StreamerConfig) -> Self {
        MotionStreamer {
            transport,
            config,
            inner: Mutex::new(Inner {
                state: MotionState::new(),
                last_send: None,
            }),
        }
    }

    /// One tick: rate-gate, diff, emit. Non-blocking: every wire write goes
    /// through C1's fire-and-forget path.
    pub async fn update(&self, intent: &MotionIntent) {
        let min_interval = Duration::from_secs_f64(1.0 / self.config.rate_hz);

        let plan = {
            let mut inner = self.inner.lock().unwrap();
            let now = Instant::now();
            if let Some(last) = inner.last_send {
                if now.duration_since(last) < min_interval {
                    return;
                }
            }

            let plan = inner.state.plan(intent, &self.config.motion);
            if plan.is_empty() {
                return;
            }
            inner.state.apply(intent, &plan, &self.config.motion);
            inner.last_send = Some(now);
            plan
        };

        self.emit(&plan).await;
    }

    async fn emit(&self, plan: &MotionPlan) {
        if let Some(delta_z) = plan.z_step {
            let script = format!(
                "G91\nG0 Z{:.4} F{}\nG90",
                delta_z, self.config.feedrate_mm_per_min
            );
            if let Err(e) = self.transport.send_fire_and_forget(script).await {
                log::warn!("motion streamer: relative Z step failed: {e}");
            }
        }

        if let Some((x, y)) = plan.xy_move {
            let mut line = String::from("G90\nG0");
            if let Some(x) = x {
                line.push_str(&format!(" X{:.4}", x));
            }
            if let Some(y) = y {
                line.push_str(&format!(" Y{:.4}", y));
            }
            line.push_str(&format!(" F{}", self.config.feedrate_mm_per_min));
            if let Err(e) = self.transport.send_fire_and_forget(line).await {
                log::warn!("motion streamer: absolute X/Y move failed: {e}");
            }
        }
    }

    /// INIT/SHUTDOWN only: a blocking absolute move covering whichever axes
    /// are `Some`, via C1's `call`. On success, seeds the diff baseline.
    pub async fn move_absolute_blocking(
        &self,
        targets: MotionIntent,
        timeout: Duration,
    ) -> Result<(), turret_core::TransportError> {
        let clamped = self.clamp(targets);
        let mut line = String::from("G90\nG0");
        if let Some(x) = clamped.x {
            line.push_str(&format!(" X{:.4}", x));
        }
        if let Some(y) = clamped.y {
            line.push_str(&format!(" Y{:.4}", y));
        }
        if let Some(z) = clamped.z {
            line.push_str(&format!(" Z{:.4}", z));
        }
        line.push_str(&format!(" F{}", self.config.feedrate_mm_per_min));

        self.transport
            .call("printer.gcode.script", serde_json::json!({ "script": line }), timeout)
            .await?;

        self.inner
            .lock()
            .unwrap()
            .state
            .seed_absolute(clamped.x, clamped.y, clamped.z);
        Ok(())
    }

    /// INIT/SHUTDOWN only: a blocking relative Z step, wrapped with
    /// "wait for moves to finish" (`M400`) per §6's exact barrier form.
    pub async fn move_z_relative_blocking(
        &self,
        delta_z: f64,
        timeout: Duration,
    ) -> Result<(), turret_core::TransportError> {
        let script = format!(
            "G91\nG0 Z{:.4} F{}\nM400\nG90",
            delta_z, self.config.feedrate_mm_per_min
        );
        self.transport
            .call("printer.gcode.script", serde_json::json!({ "script": script }), timeout)
            .await?;

        self.inner.lock().unwrap().state.seed_relative_z(delta_z);
        Ok(())
    }

    /// Sends `PATTERN_DEFINE` with the four corners and timing of `def`,
    /// fire-and-forget (§6). Stop is always issued before a new define+start
    /// elsewhere (§5 "`stop` issued before any new `define`+`start`"); this
    /// method only emits the define.
    pub async fn define_pattern(&self, def: &PatternDefinition) -> Result<(), turret_core::TransportError> {
        let [(x1, y1), (x2, y2), (x3, y3), (x4, y4)] = def.corners;
        let script = format!(
            "PATTERN_DEFINE X1={:.4} Y1={:.4} X2={:.4} Y2={:.4} X3={:.4} Y3={:.4} X4={:.4} Y4={:.4} SPEED={:.4} DWELL={:.4}",
            x1, y1, x2, y2, x3, y3, x4, y4, def.speed, def.dwell_s
        );
        self.transport.send_fire_and_forget(script).await
    }

    pub async fn start_pattern(&self) -> Result<(), turret_core::TransportError> {
        self.transport.send_fire_and_forget("PATTERN_START").await
    }

    pub async fn stop_pattern(&self) -> Result<(), turret_core::TransportError> {
        self.transport.send_fire_and_forget("PATTERN_STOP").await
    }

    /// INIT only: home all axes.
    pub async fn home(&self) -> Result<(), turret_core::TransportError> {
        self.transport.send_fire_and_forget("G28").await
    }

    /// Blocks until the controller's motion queue has drained (the bare
    /// `M400` barrier of §6), without commanding any movement. Used on
    /// SEARCH→TRACK entry (§4.9) so streamed search steps in flight can't
    /// land after tracking has already started moving the mirrors.
    pub async fn finish_pending_moves(&self, timeout: Duration) -> Result<(), turret_core::TransportError> {
        self.transport
            .call("printer.gcode.script", serde_json::json!({ "script": "M400" }), timeout)
            .await?;
        Ok(())
    }

    fn clamp(&self, intent: MotionIntent) -> MotionIntent {
        MotionIntent {
            x: intent.x.map(|v| v.clamp(self.config.motion.x_limits.min, self.config.motion.x_limits.max)),
            y: intent.y.map(|v| v.clamp(self.config.motion.y_limits.min, self.config.motion.y_limits.max)),
            z: intent.z.map(|v| v.clamp(self.config.motion.z_limits.min, self.config.motion.z_limits.max)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StreamerConfig {
        use turret_core::motion_intent::AxisLimits;
        StreamerConfig {
            motion: MotionConfig {
                x_limits: AxisLimits { min: -10.0, max: 10.0 },
                y_limits: AxisLimits { min: -10.0, max: 10.0 },
                z_limits: AxisLimits { min: -100.0, max: 100.0 },
                z_deadband: 0.05,
            },
            rate_hz: 30.0,
            feedrate_mm_per_min: 6000,
        }
    }

    #[test]
    fn relative_z_script_matches_the_wire_contract() {
        let cfg = config();
        let script = format!("G91\nG0 Z{:.4} F{}\nG90", 1.25, cfg.feedrate_mm_per_min);
        assert_eq!(script, "G91\nG0 Z1.2500 F6000\nG90");
    }

    #[test]
    fn barriered_relative_z_script_includes_m400() {
        let cfg = config();
        let script = format!("G91\nG0 Z{:.4} F{}\nM400\nG90", -2.5, cfg.feedrate_mm_per_min);
        assert_eq!(script, "G91\nG0 Z-2.5000 F6000\nM400\nG90");
    }

    #[test]
    fn pattern_define_script_lists_all_four_corners() {
        let def = PatternDefinition {
            corners: [(1.0, 2.0), (3.0, 4.0), (5.0, 6.0), (7.0, 8.0)],
            speed: 10.0,
            dwell_s: 0.5,
        };
        let [(x1, y1), (x2, y2), (x3, y3), (x4, y4)] = def.corners;
        let script = format!(
            "PATTERN_DEFINE X1={:.4} Y1={:.4} X2={:.4} Y2={:.4} X3={:.4} Y3={:.4} X4={:.4} Y4={:.4} SPEED={:.4} DWELL={:.4}",
            x1, y1, x2, y2, x3, y3, x4, y4, def.speed, def.dwell_s
        );
        assert_eq!(
            script,
            "PATTERN_DEFINE X1=1.0000 Y1=2.0000 X2=3.0000 Y2=4.0000 X3=5.0000 Y3=6.0000 X4=7.0000 Y4=8.0000 SPEED=10.0000 DWELL=0.5000"
        );
    }

    #[test]
    fn absolute_xy_script_omits_unset_axes() {
        let mut line = String::from("G90\nG0");
        line.push_str(&format!(" X{:.4}", 3.0));
        line.push_str(&format!(" F{}", 6000));
        assert_eq!(line, "G90\nG0 X3.0000 F6000");
    }
}
