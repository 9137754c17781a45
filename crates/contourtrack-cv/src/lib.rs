//! Contourtrack Computer Vision Library
//!
//! Adaptive contour detection and two-tier temporal tracking on OpenCV
//! frames: an edge stage with a closed-loop threshold search, a morphology
//! kernel search, weighted contour scoring and a BIG/SMALL tracker with
//! hysteresis and ROI narrowing.

pub mod bbox;
pub mod detection;
pub mod edges;
pub mod morphology;
pub mod selection;
pub mod tracking;
pub mod utils;

// Re-export commonly used types
pub use bbox::BBox;
pub use detection::{ContourDetector, DetectionDiagnostics, DetectionResult};
pub use edges::{EdgeExtraction, EdgeExtractor};
pub use morphology::{MorphologyRefiner, RefinedMask};
pub use selection::{Candidate, ContourFeatures, ContourSelector, SelectedContour};
pub use tracking::{DetectorState, PipelineKind, Slot, TemporalTracker, TrackOutput, VisionContext};

pub use contourtrack_core::{ProcessingProfile, TrackerConfig};

// Error handling
pub type Result<T> = anyhow::Result<T>;

/// Core traits for the CV system
pub mod traits {
    use super::*;
    use opencv::core::Mat;

    /// A per-frame detector the tracker can drive
    pub trait FrameDetector {
        fn detect(&self, frame: &Mat) -> Result<Option<DetectionResult>>;

        /// Detect with the search restricted to `region` (frame pixels).
        /// Results stay in full-frame coordinates. The default blacks out
        /// everything outside the region and runs a full-frame search.
        fn detect_in(&self, frame: &Mat, region: BBox) -> Result<Option<DetectionResult>> {
            let masked = crate::utils::ImageUtils::keep_region(frame, region.to_rect())?;
            self.detect(&masked)
        }

        fn profile(&self) -> &ProcessingProfile;

        /// Swap in a new profile; an invalid one leaves the old in place
        fn replace_profile(&mut self, profile: ProcessingProfile) -> Result<()>;

        fn set_overlay(&mut self, _enabled: bool) {}
    }
}
