//! Deterrence Pattern Engine (C8): computes the four perimeter corners of a
//! square deterrence sweep around a ground target and maps them to mirror
//! positions via the aim transform. Grounded on
//! `original_source/Laser/DeterrencePattern.py`'s corner geometry.

use crate::aim::{AimInputs, AimTransform};
use crate::error::AimError;

/// Tuning for one pattern run: side length of the square, traversal speed,
/// and dwell per corner. Units follow the motion controller's own (mm/s,
/// seconds); this crate does not interpret them further.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternConfig {
    pub side_m: f64,
    pub speed: f64,
    pub dwell_s: f64,
}

/// Four mirror positions and the timing to move between them, ready to hand
/// to the motion controller as a `pattern_define` primitive (§4.8 step 3).
/// This crate only computes the data; `pattern_define`/`pattern_start`/
/// `pattern_stop` as wire messages are a server concern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternDefinition {
    /// Four corners in command-unit (dx, dy), counter-clockwise from
    /// near-left.
    pub corners: [(f64, f64); 4],
    pub speed: f64,
    pub dwell_s: f64,
}

/// Compute the four ground-plane corners of a square centered on the
/// target at forward distance `z`, counter-clockwise from near-left, then
/// map each through `transform` to mirror deltas.
///
/// Corners (ground x, z), side `s`, half `h = s/2`:
/// 1. near-left:  (x − h, z − h)
/// 2. near-right: (x + h, z − h)
/// 3. far-right:  (x + h, z + h)
/// 4. far-left:   (x − h, z + h)
/// counter-clockwise from near-left means traversal order near-left,
/// far-left, far-right, near-right.
pub fn define_pattern(
    transform: &AimTransform,
    target_x: f64,
    target_z: f64,
    roll: f64,
    config: &PatternConfig,
) -> Result<PatternDefinition, AimError> {
    let h = config.side_m / 2.0;

    let ground_corners = [
        (target_x - h, target_z - h), // near-left
        (target_x - h, target_z + h), // far-left
        (target_x + h, target_z + h), // far-right
        (target_x + h, target_z - h), // near-right
    ];

    let mut corners = [(0.0, 0.0); 4];
    for (i, &(x, z)) in ground_corners.iter().enumerate() {
        let z = z.max(f64::EPSILON);
        let deltas = transform.solve(AimInputs { x, z, roll })?;
        corners[i] = (deltas.dx, deltas.dy);
    }

    Ok(PatternDefinition {
        corners,
        speed: config.speed,
        dwell_s: config.dwell_s,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aim::AxisCalibration;

    fn transform() -> AimTransform {
        let s = 720.0 / (2.0 * std::f64::consts::PI);
        AimTransform {
            laser_height_m: 1.119,
            x_axis: AxisCalibration { scale: s, sign: 1.0 },
            y_axis: AxisCalibration { scale: s, sign: 1.0 },
        }
    }

    #[test]
    fn produces_four_distinct_corners() {
        let t = transform();
        let cfg = PatternConfig {
            side_m: 1.0,
            speed: 50.0,
            dwell_s: 0.5,
        };
        let def = define_pattern(&t, 0.0, 5.0, 0.0, &cfg).unwrap();
        for i in 0..4 {
            for j in (i + 1)..4 {
                assert_ne!(def.corners[i], def.corners[j]);
            }
        }
        assert_eq!(def.speed, 50.0);
        assert_eq!(def.dwell_s, 0.5);
    }

    #[test]
    fn near_left_is_left_and_near_relative_to_near_right() {
        let t = transform();
        let cfg = PatternConfig {
            side_m: 2.0,
            speed: 10.0,
            dwell_s: 1.0,
        };
        let def = define_pattern(&t, 0.0, 5.0, 0.0, &cfg).unwrap();
        let near_left_dx = def.corners[0].0;
        let near_right_dx = def.corners[3].0;
        assert!(near_left_dx < near_right_dx);
    }

    #[test]
    fn rejects_target_closer_than_half_the_side() {
        let t = transform();
        let cfg = PatternConfig {
            side_m: 10.0,
            speed: 10.0,
            dwell_s: 1.0,
        };
        // near corners would land at z = 1.0 - 5.0 = -4.0, clamped to
        // epsilon rather than producing an invalid target.
        assert!(define_pattern(&t, 0.0, 1.0, 0.0, &cfg).is_ok());
    }
}
