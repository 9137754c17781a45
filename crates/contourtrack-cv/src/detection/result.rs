//! Per-frame detection values

use crate::bbox::BBox;
use opencv::core::Mat;
use serde::Serialize;
use std::time::SystemTime;

/// How a detection was obtained: controller and kernel choices for the frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionDiagnostics {
    /// Bounding-box area over working-frame area
    pub bbox_ratio: f64,
    pub t1: f64,
    pub t2: f64,
    pub search_iterations: u32,
    pub converged: bool,
    pub used_rescue: bool,
    /// Colour mask coverage in percent, absent when the gate is disabled
    pub color_cover_pct: Option<f64>,
    pub color_used: bool,
    pub close_k: i32,
    pub dilate_k: i32,
    pub border_margin: i32,
}

/// Best contour of one frame
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    /// Source-frame pixels
    pub bbox: BBox,
    /// Normalised to [0, 1] x [0, 1] of the source frame
    pub center: (f64, f64),
    pub score: f64,
    pub fill_ratio: f64,
    /// Edge density ("life") of the accepted edge pass
    pub edge_density: f64,
    pub diagnostics: DetectionDiagnostics,
    #[serde(skip)]
    pub overlay: Option<Mat>,
    pub timestamp: SystemTime,
}

impl DetectionResult {
    /// Equality of everything the pipeline computes, ignoring the overlay
    /// image and the timestamp
    pub fn same_detection(&self, other: &DetectionResult) -> bool {
        self.bbox == other.bbox
            && self.center == other.center
            && self.score == other.score
            && self.fill_ratio == other.fill_ratio
            && self.edge_density == other.edge_density
            && self.diagnostics == other.diagnostics
    }
}
