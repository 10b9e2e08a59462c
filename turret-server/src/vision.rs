//! Vision Producer (C5): a single-writer task that pulls frames, runs
//! detection (optionally tiled), and publishes the latest [`Detection`] for
//! any number of readers. The detector itself is out of scope (§1); callers
//! plug one in via [`DetectorSource`], the same trait-as-seam pattern
//! `mayara_core::io::IoProvider` uses to keep the core platform-independent.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle};

use turret_core::detection::{merge_tiled_detections, RawDetection};
use turret_core::{BBox, Detection, DetectionClass};

/// One camera frame. Dimensions only; pixel payload format is left to the
/// detector implementation.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
}

/// The pluggable detector seam. A real model or a test double implements
/// this; the vision producer only calls `detect`.
pub trait DetectorSource: Send {
    fn detect(&mut self, frame: &Frame) -> Vec<RawDetection>;
}

/// Optional tiling: subdivides a frame into overlapping regions before
/// detection, merging per-region results by area-overlap suppression. A
/// detector that already handles full frames can skip this and call
/// [`DetectorSource::detect`] directly through [`TiledDetector`]'s
/// pass-through `tile_count == 1` case.
#[derive(Debug, Clone, Copy)]
pub struct TilingConfig {
    pub tile_count_x: u32,
    pub tile_count_y: u32,
    pub overlap_px: u32,
    pub iou_threshold: f32,
}

fn tile_frame(frame: &Frame, tiling: &TilingConfig) -> Vec<BBox> {
    let tw = frame.width as f32 / tiling.tile_count_x as f32;
    let th = frame.height as f32 / tiling.tile_count_y as f32;
    let overlap = tiling.overlap_px as f32;

    let mut tiles = Vec::new();
    for ty in 0..tiling.tile_count_y {
        for tx in 0..tiling.tile_count_x {
            let x1 = (tx as f32 * tw - overlap).max(0.0);
            let y1 = (ty as f32 * th - overlap).max(0.0);
            let x2 = ((tx + 1) as f32 * tw + overlap).min(frame.width as f32);
            let y2 = ((ty + 1) as f32 * th + overlap).min(frame.height as f32);
            tiles.push(BBox { x1, y1, x2, y2 });
        }
    }
    tiles
}

/// Runs a detector over a frame, tiling first if `tiling` is configured with
/// more than one tile, and merges per-tile detections by greedy IoU
/// suppression (§4.5).
pub fn run_tiled_detection(
    detector: &mut dyn DetectorSource,
    frame: &Frame,
    tiling: Option<&TilingConfig>,
) -> Option<RawDetection> {
    let Some(tiling) = tiling else {
        return merge_tiled_detections(detector.detect(frame), 0.3);
    };

    if tiling.tile_count_x <= 1 && tiling.tile_count_y <= 1 {
        return merge_tiled_detections(detector.detect(frame), tiling.iou_threshold);
    }

    let mut raw = Vec::new();
    for tile in tile_frame(frame, tiling) {
        let sub = Frame {
            width: (tile.x2 - tile.x1) as u32,
            height: (tile.y2 - tile.y1) as u32,
            data: frame.data.clone(),
        };
        for mut detection in detector.detect(&sub) {
            // Translate tile-local coordinates back into frame space.
            detection.bbox.x1 += tile.x1;
            detection.bbox.x2 += tile.x1;
            detection.bbox.y1 += tile.y1;
            detection.bbox.y2 += tile.y1;
            raw.push(detection);
        }
    }

    merge_tiled_detections(raw, tiling.iou_threshold)
}

/// A single writer/multi-reader slot. The producer overwrites it every
/// frame; readers apply staleness themselves via [`latest_detection`].
#[derive(Clone)]
pub struct DetectionSlot {
    inner: Arc<Mutex<Detection>>,
    monotonic_start: Instant,
}

impl DetectionSlot {
    pub fn new() -> Self {
        let monotonic_start = Instant::now();
        DetectionSlot {
            inner: Arc::new(Mutex::new(Detection::empty(0.0))),
            monotonic_start,
        }
    }

    fn now_secs(&self) -> f64 {
        self.monotonic_start.elapsed().as_secs_f64()
    }

    fn write(&self, detection: Detection) {
        *self.inner.lock().unwrap() = detection;
    }

    /// Snapshot the latest detection, applying the staleness rule in place
    /// (§4.5 "if older than T_stale, the snapshot is rewritten... before
    /// return").
    pub fn latest_detection(&self, stale_secs: f64) -> Detection {
        let now = self.now_secs();
        self.inner.lock().unwrap().with_staleness(now, stale_secs)
    }
}

impl Default for DetectionSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Pulls frames from `source`, detects, and overwrites `slot` in a loop.
/// Any producer-side fault is caught and turned into a stale/no-target
/// detection rather than propagated (§7 DetectorFault): the main loop
/// naturally falls back to SEARCH once the slot goes stale.
pub async fn run_vision_producer(
    subsys: SubsystemHandle,
    mut frame_source: impl FnMut() -> Option<Frame> + Send + 'static,
    mut detector: Box<dyn DetectorSource>,
    tiling: Option<TilingConfig>,
    bird_class_confidence_gate: f32,
    slot: DetectionSlot,
    tick_interval: Duration,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            _ = subsys.on_shutdown_requested() => return Ok(()),
            _ = tokio::time::sleep(tick_interval) => {}
        }

        let Some(frame) = frame_source() else {
            continue; // no new frame yet; keep the existing slot value
        };

        let now = slot.now_secs();
        let detection = match run_tiled_detection(detector.as_mut(), &frame, tiling.as_ref()) {
            Some(raw) => Detection {
                timestamp: now,
                has_target: true,
                class: raw.class,
                bbox: Some(raw.bbox),
                center: Some(raw.bbox.center()),
                confidence: raw.confidence,
            },
            None => Detection::empty(now),
        };

        if detection.class == DetectionClass::Bird && detection.confidence < bird_class_confidence_gate {
            slot.write(Detection::empty(now));
        } else {
            slot.write(detection);
        }
    }
}

/// Spawn the producer as a named subsystem, matching the task-per-subsystem
/// shape used throughout `turret-server`.
pub fn spawn_vision_producer(
    subsys: &SubsystemHandle,
    frame_source: impl FnMut() -> Option<Frame> + Send + 'static,
    detector: Box<dyn DetectorSource>,
    tiling: Option<TilingConfig>,
    bird_class_confidence_gate: f32,
    slot: DetectionSlot,
    tick_interval: Duration,
) {
    subsys.start(SubsystemBuilder::new("VisionProducer", move |s| {
        run_vision_producer(
            s,
            frame_source,
            detector,
            tiling,
            bird_class_confidence_gate,
            slot,
            tick_interval,
        )
    }));
}
