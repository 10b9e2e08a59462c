//! Control Loop Orchestrator: the single struct tying together search,
//! tracking, the safety state machine, and the actuator handles, run as one
//! cooperative subsystem. Shaped like `mayara_core::engine`'s single struct
//! holding the cooperating per-radar processors, just with one turret
//! instead of many radars.
//!
//! The loop never blocks on I/O in SEARCH/TRACK/DETERRING steady state;
//! blocking calls to the motion controller happen only during INIT and
//! SHUTDOWN (§5).

use std::time::Instant;

use tokio::sync::mpsc;
use tokio_graceful_shutdown::SubsystemHandle;

use turret_core::calibration::Calibration;
use turret_core::motion_intent::MotionIntent;
use turret_core::pattern::define_pattern;
use turret_core::state_machine::{SafetyStateMachine, SideEffect, StateMachineConfig, TickInput};
use turret_core::tracking::TrackerState;
use turret_core::{AimTransform, DetectionClass, SearchState};

use crate::config::TurretConfig;
use crate::imu_reader::PlatformRoll;
use crate::laser::LaserActuator;
use crate::motion_streamer::MotionStreamer;
use crate::motion_transport::PatternCycleSignal;
use crate::operator::{print_status, OperatorCommand};
use crate::vision::DetectionSlot;

const DETECTION_STALE_SECS: f64 = 0.5;

pub struct Engine {
    config: TurretConfig,
    aim: AimTransform,
    calibration: Calibration,
    state_machine_config: StateMachineConfig,

    motion: MotionStreamer,
    laser: LaserActuator,
    detections: DetectionSlot,
    roll: PlatformRoll,
    pattern_cycle: PatternCycleSignal,

    state_machine: SafetyStateMachine,
    tracker: TrackerState,
    search: SearchState,
    /// Absolute Z position under active proportional tracking, relative to
    /// which `TrackingOutcome::delta_z` is applied each tick.
    track_z: f64,
    /// Set by an operator `P`; while true the tick loop still evaluates the
    /// state machine but withholds motion/laser/pattern commands (§11).
    paused: bool,

    started_at: Instant,
}

impl Engine {
    pub fn new(
        config: TurretConfig,
        calibration: Calibration,
        motion: MotionStreamer,
        laser: LaserActuator,
        detections: DetectionSlot,
        roll: PlatformRoll,
        pattern_cycle: PatternCycleSignal,
    ) -> Self {
        let aim = config.aim;
        let state_machine_config = config.state_machine;
        let z_neutral = config.z_neutral;
        let search = SearchState::new(
            z_neutral as f32,
            config.search_min,
            config.search_max,
            config.search_step,
            1,
        );

        Engine {
            config,
            aim,
            calibration,
            state_machine_config,
            motion,
            laser,
            detections,
            roll,
            pattern_cycle,
            state_machine: SafetyStateMachine::new(),
            tracker: TrackerState::new(),
            search,
            track_z: z_neutral,
            paused: false,
            started_at: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// INIT: home, seat the mirrors at neutral with a blocking move, then
    /// enter SEARCH (§4.9).
    async fn run_init(&mut self) -> anyhow::Result<()> {
        self.motion.home().await?;
        self.motion
            .move_absolute_blocking(
                MotionIntent {
                    x: Some(self.config.x_neutral),
                    y: Some(self.config.y_neutral),
                    z: Some(self.config.z_neutral),
                },
                self.config.blocking_call_timeout,
            )
            .await?;
        self.apply_effects(self.state_machine.complete_init()).await;
        Ok(())
    }

    /// SHUTDOWN: stop any pattern, laser off, one blocking neutral move,
    /// close the transport (§4.9 "any → SHUTDOWN").
    async fn run_shutdown(&mut self) {
        let effects = self.state_machine.shutdown();
        self.apply_effects(effects).await;
    }

    pub async fn run(
        mut self,
        subsys: SubsystemHandle,
        mut commands: mpsc::Receiver<OperatorCommand>,
    ) -> anyhow::Result<()> {
        if let Err(e) = self.run_init().await {
            log::error!("engine: INIT failed: {e}");
            return Err(e);
        }

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => break,
                cmd = commands.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_operator_command(cmd).await,
                        None => {}
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        self.run_shutdown().await;
        Ok(())
    }

    /// Operator `P`/`R` handling (§11): pause forces the laser off and the
    /// pattern stopped without otherwise touching `mode`; resume forces
    /// SEARCH unconditionally.
    async fn handle_operator_command(&mut self, command: OperatorCommand) {
        match command {
            OperatorCommand::Quit => {}
            OperatorCommand::Pause => {
                self.paused = true;
                if let Err(e) = self.laser.off().await {
                    log::warn!("engine: pause laser off failed: {e}");
                }
                if let Err(e) = self.motion.stop_pattern().await {
                    log::warn!("engine: pause pattern stop failed: {e}");
                }
                log::info!("engine: paused by operator");
            }
            OperatorCommand::Resume => {
                self.paused = false;
                let effects = self.state_machine.resume_to_search();
                self.apply_effects(effects).await;
                log::info!("engine: resumed into SEARCH by operator");
            }
        }
    }

    async fn tick(&mut self) {
        if self.paused {
            print_status("Paused", false, "operator pause (P)");
            return;
        }

        let detection = self.detections.latest_detection(DETECTION_STALE_SECS);
        let roll_sample = self.roll.latest();
        let roll_fresh = match self.config.imu_max_roll_age_secs {
            Some(max_age) => roll_sample
                .map(|s| self.roll.now_secs() - s.timestamp <= max_age)
                .unwrap_or(false),
            None => true,
        };

        let ground_distance = detection
            .bbox
            .map(|b| self.calibration.distance_of(b.bottom_row()));

        let tracking = match self.state_machine.mode() {
            turret_core::state_machine::SystemMode::Track
            | turret_core::state_machine::SystemMode::Deterring => Some(self.tracker.update(
                &self.config.tracking,
                detection.center,
                detection.confidence,
            )),
            _ => None,
        };
        let tracking_lost = tracking
            .map(|_| self.tracker.is_target_lost(&self.config.tracking))
            .unwrap_or(false);

        let input = TickInput {
            detection_class: detection.class,
            detection_confidence: detection.confidence,
            tracking,
            tracking_lost,
            ground_distance,
            roll_fresh,
            pattern_cycle_complete: self.pattern_cycle.take(),
        };

        let now_ms = self.now_ms();
        let effects = self
            .state_machine
            .tick(&input, now_ms, &self.state_machine_config);
        self.apply_effects(effects).await;

        match self.state_machine.mode() {
            turret_core::state_machine::SystemMode::Search => {
                let step = self.search.update();
                let intent = MotionIntent {
                    x: None,
                    y: None,
                    z: Some(step.absolute as f64),
                };
                self.motion.update(&intent).await;
            }
            turret_core::state_machine::SystemMode::Track => {
                if let Some(outcome) = tracking {
                    if outcome.should_move {
                        self.track_z += outcome.delta_z as f64;
                        let intent = MotionIntent {
                            x: None,
                            y: None,
                            z: Some(self.track_z),
                        };
                        self.motion.update(&intent).await;
                    }
                }
            }
            _ => {}
        }

        let mode_label = format!("{:?}", self.state_machine.mode());
        let summary = match (detection.class, detection.confidence) {
            (DetectionClass::None, _) => "no target".to_string(),
            (class, confidence) => format!("{class:?} conf={confidence:.2}"),
        };
        print_status(&mode_label, self.state_machine.mode() == turret_core::state_machine::SystemMode::Deterring, &summary);
    }

    async fn apply_effects(&mut self, effects: Vec<SideEffect>) {
        for effect in effects {
            match effect {
                SideEffect::FinishPendingMoves => {
                    if let Err(e) = self
                        .motion
                        .finish_pending_moves(self.config.blocking_call_timeout)
                        .await
                    {
                        log::warn!("engine: finish pending moves failed: {e}");
                    }
                }
                SideEffect::ResetTrackingController => {
                    self.tracker.reset();
                    self.track_z = self.config.z_neutral;
                }
                SideEffect::ResetSearchController => {
                    self.search.reset(self.config.z_neutral as f32, 1)
                }
                SideEffect::LaserOn => {
                    if let Err(e) = self.laser.on().await {
                        log::warn!("engine: laser on failed: {e}");
                    }
                }
                SideEffect::LaserOff => {
                    if let Err(e) = self.laser.off().await {
                        log::warn!("engine: laser off failed: {e}");
                    }
                }
                SideEffect::PatternStart { distance_m } => {
                    let roll = self.roll.latest().map(|s| s.roll_rad).unwrap_or(0.0);
                    match define_pattern(&self.aim, 0.0, distance_m as f64, roll, &self.config.pattern) {
                        Ok(def) => {
                            if let Err(e) = self.motion.define_pattern(&def).await {
                                log::warn!("engine: pattern define failed: {e}");
                            }
                            if let Err(e) = self.motion.start_pattern().await {
                                log::warn!("engine: pattern start failed: {e}");
                            }
                        }
                        Err(e) => log::warn!("engine: could not build deterrence pattern: {e}"),
                    }
                }
                SideEffect::PatternStop => {
                    if let Err(e) = self.motion.stop_pattern().await {
                        log::warn!("engine: pattern stop failed: {e}");
                    }
                }
                SideEffect::BlockingAbsoluteNeutral => {
                    let neutral = MotionIntent {
                        x: Some(self.config.x_neutral),
                        y: Some(self.config.y_neutral),
                        z: Some(self.config.z_neutral),
                    };
                    if let Err(e) = self
                        .motion
                        .move_absolute_blocking(neutral, self.config.blocking_call_timeout)
                        .await
                    {
                        log::warn!("engine: blocking neutral move failed: {e}");
                    }
                }
                SideEffect::CloseTransport => {
                    log::info!("engine: transport close requested by state machine");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turret_core::calibration::CalibrationPoint;

    #[test]
    fn search_state_seeds_from_configured_neutral() {
        let search = SearchState::new(50.0, 0.0, 100.0, 1.0, 1);
        assert_eq!(search.current, 50.0);
    }

    #[test]
    fn calibration_loads_from_points() {
        let calibration = Calibration::load(&[
            CalibrationPoint::new(100, 20.0),
            CalibrationPoint::new(400, 2.0),
        ])
        .unwrap();
        assert!(calibration.distance_of(250.0) > 2.0);
    }
}
