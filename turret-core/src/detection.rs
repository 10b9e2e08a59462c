//! The shared detection value produced by the vision pipeline (C5) and
//! consumed by the tracking controller, the safety state machine, and the
//! distance model.

use serde::{Deserialize, Serialize};

/// Default staleness threshold: a Detection older than this is treated as
/// `has_target = false` regardless of its content.
pub const DEFAULT_STALE_SECS: f64 = 0.5;

/// What kind of object a detection identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionClass {
    None,
    Bird,
    Human,
}

impl Default for DetectionClass {
    fn default() -> Self {
        DetectionClass::None
    }
}

/// Axis-aligned bounding box in pixel coordinates, 0-based, Y increasing
/// downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    /// Pixel center of the box.
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Bottom row of the box (the ground contact point used by the distance
    /// model), since Y increases downward.
    pub fn bottom_row(&self) -> f32 {
        self.y1.max(self.y2)
    }

    /// Intersection-over-union against another box, used by the tiled
    /// inference merge.
    pub fn iou(&self, other: &BBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let iw = (ix2 - ix1).max(0.0);
        let ih = (iy2 - iy1).max(0.0);
        let intersection = iw * ih;
        if intersection <= 0.0 {
            return 0.0;
        }

        let area_self = (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0);
        let area_other = (other.x2 - other.x1).max(0.0) * (other.y2 - other.y1).max(0.0);
        let union = area_self + area_other - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// One observation from the vision producer. Produced by C5; consumed
/// everywhere. Readers must apply the staleness rule themselves (or call
/// [`Detection::with_staleness`]), since the age depends on the reader's
/// clock reading, not the producer's.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Seconds since an arbitrary monotonic epoch shared by producer and
    /// readers (never wall-clock, so it is immune to clock adjustment).
    pub timestamp: f64,
    pub has_target: bool,
    pub class: DetectionClass,
    pub bbox: Option<BBox>,
    pub center: Option<(f32, f32)>,
    pub confidence: f32,
}

impl Default for Detection {
    fn default() -> Self {
        Detection {
            timestamp: 0.0,
            has_target: false,
            class: DetectionClass::None,
            bbox: None,
            center: None,
            confidence: 0.0,
        }
    }
}

impl Detection {
    /// Construct the canonical "nothing seen" detection at a given time.
    pub fn empty(now: f64) -> Self {
        Detection {
            timestamp: now,
            ..Detection::default()
        }
    }

    /// Returns a copy of this detection, forced to `has_target = false` if
    /// it is older than `stale_secs` as measured from `now`. This is the
    /// staleness rule every reader must apply (§3 Detection).
    pub fn with_staleness(&self, now: f64, stale_secs: f64) -> Self {
        if now - self.timestamp > stale_secs {
            Detection {
                has_target: false,
                ..*self
            }
        } else {
            *self
        }
    }

    pub fn is_bird(&self, conf_gate: f32) -> bool {
        self.has_target && self.class == DetectionClass::Bird && self.confidence >= conf_gate
    }

    pub fn is_human(&self, conf_gate: f32) -> bool {
        self.has_target && self.class == DetectionClass::Human && self.confidence >= conf_gate
    }
}

/// A single-region detector output before tiled-inference merging. The
/// detector itself is out of scope (§1); this is the shape it is assumed to
/// produce per tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub class: DetectionClass,
    pub bbox: BBox,
    pub confidence: f32,
}

/// Greedy IoU-based suppression across tiles (§4.5, §9 "tiled inference
/// merging"): sort by confidence descending, keep a box only if it does not
/// overlap a higher-confidence, already-kept box by more than `iou_threshold`.
/// The highest-confidence surviving detection becomes the reported target.
pub fn merge_tiled_detections(
    mut raw: Vec<RawDetection>,
    iou_threshold: f32,
) -> Option<RawDetection> {
    raw.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());

    let mut kept: Vec<RawDetection> = Vec::new();
    for candidate in raw {
        let suppressed = kept
            .iter()
            .any(|k| k.bbox.iou(&candidate.bbox) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }

    kept.into_iter().next()
}
