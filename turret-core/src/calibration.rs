//! Calibration data model shared by the Distance Model (C2) and the
//! interactive calibration capture flow (C10).

use serde::{Deserialize, Serialize};

use crate::distance::DistanceModel;
use crate::error::{CalibrationError, CaptureError};

/// Minimum number of clicks required before a capture session can be saved
/// (§4.10).
pub const MIN_CAPTURE_POINTS: usize = 6;

/// Current on-disk schema version for [`CalibrationRecord`].
pub const SCHEMA_VERSION: &str = "1";

/// One (row_pixel, distance) sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub row_pixel: i32,
    pub distance: f32,
}

impl CalibrationPoint {
    pub fn new(row_pixel: i32, distance: f32) -> Self {
        CalibrationPoint { row_pixel, distance }
    }
}

/// A validated, ready-to-use calibration: an ordered, non-empty set of at
/// least two points with strictly monotone distances. Wraps a
/// [`DistanceModel`] so callers get `distance_of`/`row_of` directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    points: Vec<CalibrationPoint>,
    model: DistanceModel,
}

impl Calibration {
    pub fn load(points: &[CalibrationPoint]) -> Result<Self, CalibrationError> {
        let model = DistanceModel::load(points)?;
        let mut sorted = points.to_vec();
        sorted.sort_by_key(|p| p.row_pixel);
        Ok(Calibration {
            points: sorted,
            model,
        })
    }

    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    pub fn distance_of(&self, row: f32) -> f32 {
        self.model.distance_of(row)
    }

    pub fn row_of(&self, distance: f32) -> f32 {
        self.model.row_of(distance)
    }
}

/// Capture resolution metadata, recorded alongside a calibration so a later
/// reload can detect a camera resolution change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureResolution {
    pub width: u32,
    pub height: u32,
}

/// Metadata attached to a saved calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationMetadata {
    pub source: String,
    pub capture_resolution: CaptureResolution,
    /// Seconds since Unix epoch at capture time.
    pub captured_at: u64,
}

/// Optional post-save verification sample: a (row, expected distance) pair
/// checked against the saved model, for operator confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerificationSample {
    pub row_pixel: i32,
    pub expected_distance: f32,
}

/// Optional coverage statistics: the range of rows actually seen in live
/// detections, so an operator can be warned when detections fall outside
/// the calibrated domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageStats {
    pub min_row_seen: f32,
    pub max_row_seen: f32,
}

/// The full persisted document for one named calibration (§6 "Persisted
/// state", §3 "SUPPLEMENTED FEATURES"). `turret-server::storage` is
/// responsible for the on-disk map of name → record; this struct is one
/// entry in that map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub name: String,
    pub schema_version: String,
    pub metadata: CalibrationMetadata,
    pub points: Vec<CalibrationPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_results: Option<Vec<VerificationSample>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_coverage: Option<CoverageStats>,
}

impl CalibrationRecord {
    pub fn new(name: impl Into<String>, metadata: CalibrationMetadata, points: Vec<CalibrationPoint>) -> Self {
        CalibrationRecord {
            name: name.into(),
            schema_version: SCHEMA_VERSION.to_string(),
            metadata,
            points,
            test_results: None,
            detection_coverage: None,
        }
    }

    /// Build the validated interpolator for this record.
    pub fn calibration(&self) -> Result<Calibration, CalibrationError> {
        Calibration::load(&self.points)
    }
}

/// Accumulates clicked (row, distance) points during an interactive
/// calibration session (C10). Pure state; the actual click/typed-input
/// source is out of scope and lives in `turret-server`.
#[derive(Debug, Clone, Default)]
pub struct CaptureSession {
    points: Vec<CalibrationPoint>,
}

impl CaptureSession {
    pub fn new() -> Self {
        CaptureSession::default()
    }

    /// Record one click/typed sample. Does not validate monotonicity; that
    /// check happens at save time so an operator can correct a bad click.
    pub fn add_point(&mut self, row_pixel: i32, distance: f32) {
        self.points.push(CalibrationPoint::new(row_pixel, distance));
    }

    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    /// Validate and build a savable record. Requires at least
    /// [`MIN_CAPTURE_POINTS`] points with strictly monotone distances.
    pub fn finish(
        &self,
        name: impl Into<String>,
        metadata: CalibrationMetadata,
    ) -> Result<CalibrationRecord, CaptureError> {
        if self.points.len() < MIN_CAPTURE_POINTS {
            return Err(CaptureError::NotEnoughPoints {
                required: MIN_CAPTURE_POINTS,
                actual: self.points.len(),
            });
        }

        // Validates monotonicity as a side effect; discard the model, keep
        // only the confirmation that the points are sound.
        Calibration::load(&self.points)?;

        Ok(CalibrationRecord::new(name, metadata, self.points.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> CalibrationMetadata {
        CalibrationMetadata {
            source: "manual".to_string(),
            capture_resolution: CaptureResolution {
                width: 640,
                height: 480,
            },
            captured_at: 0,
        }
    }

    #[test]
    fn capture_session_requires_minimum_points() {
        let mut session = CaptureSession::new();
        for row in [100, 200, 300, 400] {
            session.add_point(row, row as f32 / 10.0);
        }
        let err = session.finish("test", metadata()).unwrap_err();
        assert_eq!(
            err,
            CaptureError::NotEnoughPoints {
                required: MIN_CAPTURE_POINTS,
                actual: 4
            }
        );
    }

    #[test]
    fn capture_session_finishes_with_enough_monotone_points() {
        let mut session = CaptureSession::new();
        for row in [100, 200, 300, 400, 500, 600] {
            session.add_point(row, row as f32 / 10.0);
        }
        let record = session.finish("backyard", metadata()).unwrap();
        assert_eq!(record.points.len(), 6);
        assert_eq!(record.schema_version, SCHEMA_VERSION);
        assert!(record.calibration().is_ok());
    }

    #[test]
    fn capture_session_rejects_non_monotone_at_finish() {
        let mut session = CaptureSession::new();
        session.add_point(100, 10.0);
        session.add_point(200, 5.0);
        session.add_point(300, 30.0);
        session.add_point(400, 40.0);
        session.add_point(500, 50.0);
        session.add_point(600, 60.0);
        assert!(matches!(
            session.finish("bad", metadata()),
            Err(CaptureError::Calibration(CalibrationError::NotMonotone))
        ));
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = CalibrationRecord::new(
            "backyard",
            metadata(),
            vec![
                CalibrationPoint::new(100, 10.0),
                CalibrationPoint::new(200, 20.0),
            ],
        );
        let json = serde_json::to_string(&record).unwrap();
        let back: CalibrationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
