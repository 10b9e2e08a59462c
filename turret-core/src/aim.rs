//! Aim Transform (C3): maps a ground target plus platform roll to mirror
//! axis deltas, applying the half-angle mirror law and roll compensation.

use crate::error::AimError;

/// Per-axis scale and sign constants derived from the motion controller's
/// rotation-distance configuration (§6: `S = rotation_distance/(2*pi)`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCalibration {
    /// Command units per radian.
    pub scale: f64,
    /// +1.0 or -1.0, to match the physical mounting of the mirror.
    pub sign: f64,
}

/// Immutable bundle of aim-transform parameters, built once at startup and
/// passed by reference (§9 "Configuration... should be passed as an
/// immutable bundle threaded through constructors, not global").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AimTransform {
    /// Laser height above the ground plane, meters.
    pub laser_height_m: f64,
    pub x_axis: AxisCalibration,
    pub y_axis: AxisCalibration,
}

/// A ground target plus the platform attitude needed to aim at it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AimInputs {
    /// Lateral ground offset, meters (+right).
    pub x: f64,
    /// Forward ground distance, meters. Must be > 0.
    pub z: f64,
    /// Platform roll, radians from level.
    pub roll: f64,
}

/// Command-unit deltas to add to each axis's neutral position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AimDeltas {
    pub dx: f64,
    pub dy: f64,
}

impl AimTransform {
    /// Solve for the mirror deltas that put the beam on the ground at
    /// `inputs`, per §4.3's exact formulas.
    ///
    /// d = sqrt(x^2 + z^2); theta_pitch = atan(h/d); theta_yaw = atan2(x, z).
    /// Each mirror moves half the desired beam angle (half-angle mirror
    /// law); roll is subtracted from the pitch as half its value.
    pub fn solve(&self, inputs: AimInputs) -> Result<AimDeltas, AimError> {
        if inputs.z <= 0.0 {
            return Err(AimError::InvalidTarget { z: inputs.z });
        }

        let d = (inputs.x * inputs.x + inputs.z * inputs.z).sqrt();
        let theta_pitch = (self.laser_height_m / d).atan();
        let theta_yaw = inputs.x.atan2(inputs.z);

        let dy = self.y_axis.sign * self.y_axis.scale * (theta_pitch / 2.0 - inputs.roll / 2.0);
        let dx = self.x_axis.sign * self.x_axis.scale * (theta_yaw / 2.0);

        Ok(AimDeltas { dx, dy })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform() -> AimTransform {
        let s = 720.0 / (2.0 * std::f64::consts::PI);
        AimTransform {
            laser_height_m: 1.119,
            x_axis: AxisCalibration { scale: s, sign: 1.0 },
            y_axis: AxisCalibration { scale: s, sign: 1.0 },
        }
    }

    #[test]
    fn rejects_non_positive_forward_distance() {
        let t = transform();
        let err = t
            .solve(AimInputs {
                x: 0.0,
                z: 0.0,
                roll: 0.0,
            })
            .unwrap_err();
        assert_eq!(err, AimError::InvalidTarget { z: 0.0 });

        assert!(t
            .solve(AimInputs {
                x: 0.0,
                z: -1.0,
                roll: 0.0,
            })
            .is_err());
    }

    #[test]
    fn scenario_3_straight_ahead_ground_target() {
        let t = transform();
        let out = t
            .solve(AimInputs {
                x: 0.0,
                z: 3.556,
                roll: 0.0,
            })
            .unwrap();

        assert!((out.dy - 17.47).abs() < 0.02, "dy = {}", out.dy);
        assert!(out.dx.abs() < 1e-9);
    }

    #[test]
    fn scenario_4_aim_with_roll() {
        let t = transform();
        let baseline = t
            .solve(AimInputs {
                x: 0.0,
                z: 3.556,
                roll: 0.0,
            })
            .unwrap();
        let rolled = t
            .solve(AimInputs {
                x: 0.0,
                z: 3.556,
                roll: 5f64.to_radians(),
            })
            .unwrap();

        let delta = baseline.dy - rolled.dy;
        assert!((delta - 5.00).abs() < 0.02, "delta = {}", delta);
    }

    #[test]
    fn dy_decreases_monotonically_with_distance_when_level() {
        let t = transform();
        let distances = [1.0, 2.0, 3.0, 5.0, 10.0, 20.0];
        let mut last = f64::INFINITY;
        for &z in &distances {
            let out = t
                .solve(AimInputs {
                    x: 0.0,
                    z,
                    roll: 0.0,
                })
                .unwrap();
            assert!(out.dy.abs() < last, "dy did not shrink at z={}", z);
            last = out.dy.abs();
        }
    }

    #[test]
    fn yaw_is_zero_when_on_centerline() {
        let t = transform();
        let out = t
            .solve(AimInputs {
                x: 0.0,
                z: 5.0,
                roll: 0.0,
            })
            .unwrap();
        assert_eq!(out.dx, 0.0);
    }

    #[test]
    fn positive_lateral_offset_gives_positive_yaw_with_positive_sign() {
        let t = transform();
        let out = t
            .solve(AimInputs {
                x: 1.0,
                z: 5.0,
                roll: 0.0,
            })
            .unwrap();
        assert!(out.dx > 0.0);
    }
}
