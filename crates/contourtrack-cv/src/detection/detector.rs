//! Single-frame contour detector

use super::overlay::{draw_detection, OverlayLabel};
use super::result::{DetectionDiagnostics, DetectionResult};
use crate::bbox::BBox;
use crate::edges::EdgeExtractor;
use crate::morphology::{MorphologyRefiner, RefinedMask};
use crate::selection::{ContourSelector, SelectedContour};
use crate::traits::FrameDetector;
use crate::utils::{ImageUtils, MaskUtils};
use crate::Result;
use anyhow::Context;
use contourtrack_core::ProcessingProfile;
use opencv::{
    core::{Mat, Size},
    prelude::*,
};
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

/// Edge extraction, morphology search and contour selection under one
/// profile. Holds no per-frame state.
pub struct ContourDetector {
    tag: String,
    profile: ProcessingProfile,
    draw_overlay: bool,
}

impl ContourDetector {
    /// Create a detector; the profile is validated first
    pub fn new(tag: impl Into<String>, profile: ProcessingProfile) -> Result<Self> {
        profile.validate()?;
        Ok(Self {
            tag: tag.into(),
            profile,
            draw_overlay: false,
        })
    }

    pub fn with_overlay(mut self, enabled: bool) -> Self {
        self.draw_overlay = enabled;
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Detect from an image file
    pub fn detect_from_file<P: AsRef<Path>>(&self, image_path: P) -> Result<Option<DetectionResult>> {
        let frame = ImageUtils::load_bgr(&image_path)
            .with_context(|| format!("Failed to load image: {:?}", image_path.as_ref()))?;
        self.detect_from_mat(&frame)
    }

    /// Detect from image::RgbImage
    pub fn detect_from_rgb_image(&self, rgb_image: &image::RgbImage) -> Result<Option<DetectionResult>> {
        let frame = ImageUtils::rgb_to_mat(rgb_image)?;
        self.detect_from_mat(&frame)
    }

    /// Core detection from an OpenCV Mat (gray, BGR or BGRA, 8-bit)
    pub fn detect_from_mat(&self, frame: &Mat) -> Result<Option<DetectionResult>> {
        self.run(frame, None)
    }

    /// Detect with the search restricted to `region` (source pixels).
    ///
    /// Edges outside the region are dropped at working resolution; areas,
    /// aspect ratios and the centre distance are still measured against the
    /// whole frame, so the geometry filters behave as in a global search.
    pub fn detect_in_region(&self, frame: &Mat, region: BBox) -> Result<Option<DetectionResult>> {
        self.run(frame, Some(region))
    }

    fn run(&self, frame: &Mat, region: Option<BBox>) -> Result<Option<DetectionResult>> {
        let source = Size::new(frame.cols(), frame.rows());
        let mut edges = EdgeExtractor::extract(frame, &self.profile)?;
        if let Some(region) = region {
            let (w, h) = (edges.mask.cols(), edges.mask.rows());
            let window = region
                .scale(w as f64 / source.width.max(1) as f64, h as f64 / source.height.max(1) as f64)
                .clamp_to(w, h);
            edges.mask = MaskUtils::keep_region(&edges.mask, window.to_rect())?;
        }
        let prepared = MorphologyRefiner::prepare(&edges.mask, &self.profile)?;

        let margin = self.profile.proc.border_margin as i32;
        let (mut refined, mut selected) = self.search_and_select(&prepared, margin, source)?;
        if selected.is_none() && margin > 0 {
            debug!(tag = %self.tag, margin, "nothing selected, retrying without border margin");
            (refined, selected) = self.search_and_select(&prepared, 0, source)?;
        }

        let Some(selected) = selected else {
            return Ok(None);
        };

        let features = selected.candidate.features;
        let overlay = if self.draw_overlay {
            let label = OverlayLabel {
                tag: &self.tag,
                fill: features.fill,
                bbox_ratio: features.bbox_ratio,
                score: selected.candidate.score,
            };
            Some(draw_detection(frame, &selected.bbox, &label)?)
        } else {
            None
        };

        Ok(Some(DetectionResult {
            bbox: selected.bbox,
            center: selected.center,
            score: selected.candidate.score,
            fill_ratio: features.fill,
            edge_density: edges.life,
            diagnostics: DetectionDiagnostics {
                bbox_ratio: features.bbox_ratio,
                t1: edges.search.t1,
                t2: edges.search.t2,
                search_iterations: edges.search.iterations,
                converged: edges.search.converged,
                used_rescue: edges.used_rescue,
                color_cover_pct: edges.color.map(|c| c.cover_pct),
                color_used: edges.color.is_some_and(|c| c.used),
                close_k: refined.close_k,
                dilate_k: refined.dilate_k,
                border_margin: refined.border_margin,
            },
            overlay,
            timestamp: SystemTime::now(),
        }))
    }

    fn search_and_select(
        &self,
        prepared: &Mat,
        margin: i32,
        source: Size,
    ) -> Result<(RefinedMask, Option<SelectedContour>)> {
        let refined = MorphologyRefiner::search(prepared, &self.profile, margin)?;
        let selected = ContourSelector::select(&refined.mask, &self.profile, source)?;
        Ok((refined, selected))
    }
}

impl FrameDetector for ContourDetector {
    fn detect(&self, frame: &Mat) -> Result<Option<DetectionResult>> {
        self.detect_from_mat(frame)
    }

    fn detect_in(&self, frame: &Mat, region: BBox) -> Result<Option<DetectionResult>> {
        self.detect_in_region(frame, region)
    }

    fn profile(&self) -> &ProcessingProfile {
        &self.profile
    }

    fn replace_profile(&mut self, profile: ProcessingProfile) -> Result<()> {
        profile.validate()?;
        self.profile = profile;
        Ok(())
    }

    fn set_overlay(&mut self, enabled: bool) {
        self.draw_overlay = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contourtrack_core::ConfigError;
    use opencv::core::{Rect, Scalar, CV_8UC3};
    use opencv::imgproc;

    fn square_profile() -> ProcessingProfile {
        let mut profile = ProcessingProfile::default();
        profile.canny.rescue_life_min = 0.0;
        profile.morph.close_min = 1;
        profile.morph.dil_min = 1;
        profile.premorph.bottom_margin_pct = 0.0;
        profile.geo.bbox_min = 0.01;
        profile.geo.bbox_max = 0.5;
        profile.geo.fill_min = 0.5;
        profile.geo.fill_max = 1.0;
        profile
    }

    fn square_frame() -> Result<Mat> {
        let mut frame = Mat::new_rows_cols_with_default(240, 320, CV_8UC3, Scalar::all(0.0))?;
        imgproc::rectangle(
            &mut frame,
            Rect::new(120, 80, 80, 80),
            Scalar::all(255.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )?;
        Ok(frame)
    }

    #[test]
    fn test_detector_creation() -> Result<()> {
        let detector = ContourDetector::new("big", ProcessingProfile::big())?;
        assert_eq!(detector.tag(), "big");
        Ok(())
    }

    #[test]
    fn test_invalid_profile_is_rejected() {
        let mut profile = ProcessingProfile::default();
        profile.canny.max_iter = 0;
        let err = ContourDetector::new("big", profile).err().expect("invalid profile");
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn test_square_is_found() -> Result<()> {
        let detector = ContourDetector::new("big", square_profile())?.with_overlay(true);
        let result = detector.detect(&square_frame()?)?.expect("square detected");

        let b = result.bbox;
        assert!((b.x - 120).abs() <= 4 && (b.y - 80).abs() <= 4);
        assert!((b.width - 80).abs() <= 6 && (b.height - 80).abs() <= 6);
        assert!((result.center.0 - 0.5).abs() < 0.03);
        assert!((0.0..=1.0).contains(&result.edge_density));
        assert!(result.overlay.is_some());
        Ok(())
    }

    #[test]
    fn test_region_search_keeps_full_frame_geometry() -> Result<()> {
        let detector = ContourDetector::new("big", square_profile())?;
        let frame = square_frame()?;
        let global = detector.detect(&frame)?.expect("square detected");

        let windowed = detector
            .detect_in_region(&frame, BBox::new(100, 60, 120, 120))?
            .expect("square inside window");
        assert!(windowed.same_detection(&global));

        assert!(detector.detect_in_region(&frame, BBox::new(0, 0, 60, 60))?.is_none());
        Ok(())
    }

    #[test]
    fn test_blank_frame_yields_none() -> Result<()> {
        let detector = ContourDetector::new("big", ProcessingProfile::big())?;
        let frame = Mat::new_rows_cols_with_default(240, 320, CV_8UC3, Scalar::all(30.0))?;
        assert!(detector.detect(&frame)?.is_none());
        Ok(())
    }

    #[test]
    fn test_rgb_image_detection() -> Result<()> {
        let detector = ContourDetector::new("small", ProcessingProfile::small())?;
        let rgb_image = image::RgbImage::new(100, 100);
        let _result = detector.detect_from_rgb_image(&rgb_image)?;
        Ok(())
    }

    #[test]
    fn test_replace_profile_validates() -> Result<()> {
        let mut detector = ContourDetector::new("big", ProcessingProfile::big())?;
        let mut bad = ProcessingProfile::small();
        bad.proc.blur_k = 4;
        assert!(detector.replace_profile(bad).is_err());
        assert_eq!(detector.profile(), &ProcessingProfile::big());

        detector.replace_profile(ProcessingProfile::small())?;
        assert_eq!(detector.profile(), &ProcessingProfile::small());
        Ok(())
    }
}
