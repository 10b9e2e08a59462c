//! Distance Model (C2): a monotone piecewise-linear map between image-row
//! pixel and ground distance, built from a [`crate::calibration::Calibration`].

use crate::calibration::CalibrationPoint;
use crate::error::CalibrationError;

/// A loaded, validated row↔distance interpolator. Construction sorts by row
/// and verifies strict monotonicity; there is no extrapolation past the
/// calibrated domain, only clamping.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceModel {
    rows: Vec<f32>,
    distances: Vec<f32>,
}

impl DistanceModel {
    /// Load a distance model from calibration points. Points are sorted
    /// ascending by row; the corresponding distances must then be strictly
    /// monotone (increasing or decreasing) or the calibration is rejected.
    pub fn load(points: &[CalibrationPoint]) -> Result<Self, CalibrationError> {
        if points.len() < 2 {
            return Err(CalibrationError::TooFewPoints {
                required: 2,
                actual: points.len(),
            });
        }

        let mut sorted: Vec<CalibrationPoint> = points.to_vec();
        sorted.sort_by_key(|p| p.row_pixel);

        for w in sorted.windows(2) {
            if w[0].row_pixel == w[1].row_pixel {
                return Err(CalibrationError::DuplicateRow {
                    row: w[0].row_pixel,
                });
            }
        }

        let increasing = sorted.windows(2).all(|w| w[0].distance < w[1].distance);
        let decreasing = sorted.windows(2).all(|w| w[0].distance > w[1].distance);
        if !increasing && !decreasing {
            return Err(CalibrationError::NotMonotone);
        }

        let rows = sorted.iter().map(|p| p.row_pixel as f32).collect();
        let distances = sorted.iter().map(|p| p.distance).collect();

        Ok(DistanceModel { rows, distances })
    }

    /// Ground distance for a given image row, clamped to the calibrated
    /// domain and linearly interpolated within it.
    pub fn distance_of(&self, row: f32) -> f32 {
        interpolate(&self.rows, &self.distances, row)
    }

    /// Inverse of [`Self::distance_of`]: the image row for a given ground
    /// distance, via the reversed arrays.
    pub fn row_of(&self, distance: f32) -> f32 {
        interpolate(&self.distances, &self.rows, distance)
    }
}

/// Linear interpolation of `ys` as a function of `xs`, clamped at both ends.
/// `xs` must be sorted ascending or descending; `ys` need not be monotone
/// here (the inverse lookup passes already-monotone distances as `xs`).
fn interpolate(xs: &[f32], ys: &[f32], x: f32) -> f32 {
    let ascending = xs.first().unwrap() < xs.last().unwrap();

    let clamped = if ascending {
        x.clamp(*xs.first().unwrap(), *xs.last().unwrap())
    } else {
        x.clamp(*xs.last().unwrap(), *xs.first().unwrap())
    };

    for w in 0..xs.len() - 1 {
        let (x0, x1) = (xs[w], xs[w + 1]);
        let within = if ascending {
            clamped >= x0 && clamped <= x1
        } else {
            clamped <= x0 && clamped >= x1
        };
        if within {
            let (y0, y1) = (ys[w], ys[w + 1]);
            if (x1 - x0).abs() < f32::EPSILON {
                return y0;
            }
            let t = (clamped - x0) / (x1 - x0);
            return y0 + t * (y1 - y0);
        }
    }

    // clamped equals the last knot exactly
    *ys.last().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points() -> Vec<CalibrationPoint> {
        vec![
            CalibrationPoint::new(100, 10.0),
            CalibrationPoint::new(200, 20.0),
            CalibrationPoint::new(300, 30.0),
            CalibrationPoint::new(400, 40.0),
            CalibrationPoint::new(500, 50.0),
            CalibrationPoint::new(600, 60.0),
        ]
    }

    #[test]
    fn rejects_too_few_points() {
        let err = DistanceModel::load(&[CalibrationPoint::new(1, 1.0)]).unwrap_err();
        assert_eq!(
            err,
            CalibrationError::TooFewPoints {
                required: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn rejects_non_monotone() {
        let pts = vec![
            CalibrationPoint::new(100, 10.0),
            CalibrationPoint::new(200, 5.0),
            CalibrationPoint::new(300, 30.0),
        ];
        assert_eq!(
            DistanceModel::load(&pts).unwrap_err(),
            CalibrationError::NotMonotone
        );
    }

    #[test]
    fn rejects_duplicate_rows() {
        let pts = vec![CalibrationPoint::new(100, 10.0), CalibrationPoint::new(100, 20.0)];
        assert_eq!(
            DistanceModel::load(&pts).unwrap_err(),
            CalibrationError::DuplicateRow { row: 100 }
        );
    }

    #[test]
    fn scenario_6_calibration_round_trip() {
        let model = DistanceModel::load(&points()).unwrap();

        assert_eq!(model.distance_of(250.0), 15.0);
        assert_eq!(model.row_of(45.0), 450.0);
        assert_eq!(model.distance_of(50.0), 10.0); // clamped
        assert_eq!(model.row_of(70.0), 600.0); // clamped
    }

    #[test]
    fn round_trip_property_in_range() {
        let model = DistanceModel::load(&points()).unwrap();
        for &(row, distance) in &[(100.0, 10.0), (300.0, 30.0), (600.0, 60.0)] {
            assert_eq!(model.distance_of(row), distance);
            assert_eq!(model.row_of(distance), row);
        }
    }

    #[test]
    fn monotone_for_decreasing_calibration() {
        // Some cameras yield decreasing distance with increasing row.
        let pts = vec![
            CalibrationPoint::new(100, 60.0),
            CalibrationPoint::new(200, 50.0),
            CalibrationPoint::new(300, 40.0),
        ];
        let model = DistanceModel::load(&pts).unwrap();
        assert_eq!(model.distance_of(150.0), 55.0);
        assert_eq!(model.distance_of(50.0), 60.0); // clamped to first
    }
}
