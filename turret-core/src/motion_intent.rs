//! Motion Streamer (C4) core half: the pure diff/clamp/deadband logic that
//! decides what, if anything, changed enough to send. Grounded on
//! `original_source/Motion/MotionController.py`'s edge-triggered
//! intent-vs-last-sent comparison; the lock and the actual socket write are
//! a server concern.

/// Per-axis travel limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisLimits {
    pub min: f64,
    pub max: f64,
}

impl AxisLimits {
    fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.min, self.max)
    }
}

/// Immutable tuning bundle: axis limits and the deadband below which a Z
/// step is dropped as noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionConfig {
    pub x_limits: AxisLimits,
    pub y_limits: AxisLimits,
    pub z_limits: AxisLimits,
    pub z_deadband: f64,
}

/// The commander's desired position, per axis. `x`/`y` are absolute;
/// `z` is tracked as an absolute target too, but emitted as a relative step
/// (§4.4: "For Z: compute clamped target... Δz = clamped − last_commanded_z").
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionIntent {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

/// What was actually last sent to the controller, used as the diff baseline.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionState {
    pub last_sent_x: Option<f64>,
    pub last_sent_y: Option<f64>,
    pub last_commanded_z: Option<f64>,
}

/// The work computed for one tick: an optional relative Z step and an
/// optional absolute X/Y move. Both are `None` when there's nothing to send.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionPlan {
    pub z_step: Option<f64>,
    pub xy_move: Option<(Option<f64>, Option<f64>)>,
}

impl MotionPlan {
    pub fn is_empty(&self) -> bool {
        self.z_step.is_none() && self.xy_move.is_none()
    }
}

impl MotionState {
    pub fn new() -> Self {
        MotionState::default()
    }

    /// Diff `intent` against this state and `config`'s limits, per §4.4
    /// steps 2-3. Does not mutate `self`; the caller applies
    /// [`Self::apply`] only after the plan has actually been sent.
    pub fn plan(&self, intent: &MotionIntent, config: &MotionConfig) -> MotionPlan {
        let z_step = intent.z.and_then(|z| {
            let clamped = config.z_limits.clamp(z);
            match self.last_commanded_z {
                None => None,
                Some(last) => {
                    let delta = clamped - last;
                    if delta.abs() <= config.z_deadband {
                        None
                    } else {
                        Some(delta)
                    }
                }
            }
        });

        let want_x = intent.x.map(|x| config.x_limits.clamp(x));
        let want_y = intent.y.map(|y| config.y_limits.clamp(y));

        let x_changed = matches!((want_x, self.last_sent_x), (Some(x), last) if Some(x) != last);
        let y_changed = matches!((want_y, self.last_sent_y), (Some(y), last) if Some(y) != last);

        let xy_move = if x_changed || y_changed {
            Some((want_x, want_y))
        } else {
            None
        };

        MotionPlan { z_step, xy_move }
    }

    /// Record that `plan` was actually sent, updating the diff baseline.
    pub fn apply(&mut self, intent: &MotionIntent, plan: &MotionPlan, config: &MotionConfig) {
        if let Some(z) = intent.z {
            if plan.z_step.is_some() {
                self.last_commanded_z = Some(config.z_limits.clamp(z));
            }
        }
        if let Some((x, y)) = plan.xy_move {
            if let Some(x) = x {
                self.last_sent_x = Some(x);
            }
            if let Some(y) = y {
                self.last_sent_y = Some(y);
            }
        }
    }

    /// Seed the diff baseline after a blocking absolute move (§4.4
    /// `move_absolute_blocking`).
    pub fn seed_absolute(&mut self, x: Option<f64>, y: Option<f64>, z: Option<f64>) {
        if let Some(x) = x {
            self.last_sent_x = Some(x);
        }
        if let Some(y) = y {
            self.last_sent_y = Some(y);
        }
        if let Some(z) = z {
            self.last_commanded_z = Some(z);
        }
    }

    /// Seed the Z baseline after a blocking relative step (§4.4
    /// `move_z_relative_blocking`).
    pub fn seed_relative_z(&mut self, delta: f64) {
        self.last_commanded_z = Some(self.last_commanded_z.unwrap_or(0.0) + delta);
    }
}
