//! Tracking Controller (C7): proportional pixel-error correction with a
//! deadzone and lost-frame hysteresis.

/// Immutable tuning bundle for the tracking controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingConfig {
    pub frame_width: u32,
    pub deadzone_px: f32,
    pub k_p: f32,
    pub step_max: f32,
    pub step_min: f32,
    pub confidence_gate: f32,
    /// Consecutive no-target ticks before `is_target_lost` returns true.
    pub lost_threshold: u32,
}

impl TrackingConfig {
    fn frame_center_x(&self) -> f32 {
        self.frame_width as f32 / 2.0
    }
}

/// Mutable tracking state: just the consecutive-miss counter (§3
/// TrackerState).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackerState {
    frames_without_target: u32,
}

/// Result of one tracking update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingOutcome {
    pub should_move: bool,
    pub delta_z: f32,
    pub error_px: f32,
    pub target_locked: bool,
}

impl TrackerState {
    pub fn new() -> Self {
        TrackerState::default()
    }

    pub fn reset(&mut self) {
        self.frames_without_target = 0;
    }

    pub fn frames_without_target(&self) -> u32 {
        self.frames_without_target
    }

    /// True once the target has been missing for `config.lost_threshold`
    /// or more consecutive ticks.
    pub fn is_target_lost(&self, config: &TrackingConfig) -> bool {
        self.frames_without_target >= config.lost_threshold
    }

    /// One tick of the proportional corrector, per §4.7.
    pub fn update(
        &mut self,
        config: &TrackingConfig,
        bbox_center: Option<(f32, f32)>,
        confidence: f32,
    ) -> TrackingOutcome {
        let (cx, _cy) = match bbox_center {
            Some(c) if confidence >= config.confidence_gate => c,
            _ => {
                self.frames_without_target += 1;
                return TrackingOutcome {
                    should_move: false,
                    delta_z: 0.0,
                    error_px: 0.0,
                    target_locked: false,
                };
            }
        };

        self.frames_without_target = 0;

        let error_px = cx - config.frame_center_x();

        if error_px.abs() < config.deadzone_px {
            return TrackingOutcome {
                should_move: false,
                delta_z: 0.0,
                error_px,
                target_locked: true,
            };
        }

        let delta_z = (config.k_p * error_px).clamp(-config.step_max, config.step_max);

        if delta_z.abs() < config.step_min {
            return TrackingOutcome {
                should_move: false,
                delta_z: 0.0,
                error_px,
                target_locked: true,
            };
        }

        TrackingOutcome {
            should_move: true,
            delta_z,
            error_px,
            target_locked: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TrackingConfig {
        TrackingConfig {
            frame_width: 640,
            deadzone_px: 30.0,
            k_p: 0.003,
            step_max: 3.0,
            step_min: 0.05,
            confidence_gate: 0.7,
            lost_threshold: 5,
        }
    }

    #[test]
    fn scenario_2_tracker_deadzone() {
        let cfg = config();
        let mut t = TrackerState::new();

        let outcome = t.update(&cfg, Some((340.0, 0.0)), 0.9);
        assert!(!outcome.should_move);

        let mut t = TrackerState::new();
        let outcome = t.update(&cfg, Some((400.0, 0.0)), 0.9);
        assert!(outcome.should_move);
        assert!((outcome.delta_z - 0.24).abs() < 1e-6, "{}", outcome.delta_z);

        let mut t = TrackerState::new();
        let outcome = t.update(&cfg, Some((322000.0, 0.0)), 0.9);
        assert_eq!(outcome.delta_z, 3.0);
    }

    #[test]
    fn no_detection_increments_lost_counter_and_clears_lock() {
        let cfg = config();
        let mut t = TrackerState::new();
        let outcome = t.update(&cfg, None, 0.0);
        assert!(!outcome.should_move);
        assert!(!outcome.target_locked);
        assert_eq!(t.frames_without_target(), 1);
    }

    #[test]
    fn low_confidence_counts_as_no_detection() {
        let cfg = config();
        let mut t = TrackerState::new();
        let outcome = t.update(&cfg, Some((400.0, 0.0)), 0.5);
        assert!(!outcome.target_locked);
        assert_eq!(t.frames_without_target(), 1);
    }

    #[test]
    fn is_target_lost_after_threshold_consecutive_misses() {
        let cfg = config();
        let mut t = TrackerState::new();
        for _ in 0..4 {
            t.update(&cfg, None, 0.0);
            assert!(!t.is_target_lost(&cfg));
        }
        t.update(&cfg, None, 0.0);
        assert!(t.is_target_lost(&cfg));
    }

    #[test]
    fn a_good_detection_resets_the_lost_counter() {
        let cfg = config();
        let mut t = TrackerState::new();
        t.update(&cfg, None, 0.0);
        t.update(&cfg, None, 0.0);
        t.update(&cfg, Some((320.0, 0.0)), 0.9);
        assert_eq!(t.frames_without_target(), 0);
        assert!(!t.is_target_lost(&cfg));
    }

    #[test]
    fn any_error_below_deadzone_never_moves() {
        let cfg = config();
        let mut t = TrackerState::new();
        for cx in [300.0, 310.0, 320.0, 330.0, 349.0] {
            let outcome = t.update(&cfg, Some((cx, 0.0)), 0.9);
            assert!(!outcome.should_move, "cx={cx}");
        }
    }
}
