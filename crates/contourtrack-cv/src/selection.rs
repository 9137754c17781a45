//! Geometric filtering and weighted scoring of contours

use crate::bbox::BBox;
use crate::utils::{Contour, MaskUtils};
use crate::Result;
use contourtrack_core::{GeoFilters, ProcessingProfile, Weights};
use opencv::{
    core::{Mat, Point, Size, Vector},
    imgproc,
    prelude::*,
};
use serde::Serialize;
use std::f64::consts::PI;

/// Normalised shape features of one contour at working resolution
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContourFeatures {
    /// Contour area over frame area
    pub area_norm: f64,
    /// Contour area over bounding-box area
    pub fill: f64,
    /// Contour area over convex-hull area
    pub solidity: f64,
    /// `4 pi A / P^2`, capped at 1
    pub circularity: f64,
    pub rectangularity: f64,
    pub aspect_ratio: f64,
    /// 1 for a square box, falling linearly to 0 at the aspect bounds
    pub ar_score: f64,
    /// Bounding-box area over frame area
    pub bbox_ratio: f64,
    /// Centroid distance from the frame centre over the half-diagonal
    pub dist_from_center: f64,
}

/// A contour that passed every filter, with its score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    /// Position in the contour list of the mask
    pub index: usize,
    /// Bounding box at working resolution
    pub proc_bbox: BBox,
    pub features: ContourFeatures,
    pub score: f64,
}

/// Best candidate mapped back to the source frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedContour {
    pub candidate: Candidate,
    /// Bounding box in source-frame pixels
    pub bbox: BBox,
    /// Box centre normalised to [0, 1] x [0, 1]
    pub center: (f64, f64),
}

pub struct ContourSelector;

impl ContourSelector {
    /// Pick the highest-scoring plausible contour of `mask`.
    ///
    /// `frame_size` is the source frame size the result is mapped to. Ties
    /// keep the earlier contour.
    pub fn select(mask: &Mat, profile: &ProcessingProfile, frame_size: Size) -> Result<Option<SelectedContour>> {
        let mut best: Option<Candidate> = None;
        for candidate in Self::candidates(mask, profile)? {
            if best.as_ref().is_none_or(|b| candidate.score > b.score) {
                best = Some(candidate);
            }
        }

        let Some(candidate) = best else {
            return Ok(None);
        };

        let sx = frame_size.width as f64 / mask.cols().max(1) as f64;
        let sy = frame_size.height as f64 / mask.rows().max(1) as f64;
        let bbox = candidate
            .proc_bbox
            .scale(sx, sy)
            .clamp_to(frame_size.width, frame_size.height);
        let (cx, cy) = bbox.center();
        let center = (
            (cx / frame_size.width.max(1) as f64).clamp(0.0, 1.0),
            (cy / frame_size.height.max(1) as f64).clamp(0.0, 1.0),
        );

        Ok(Some(SelectedContour { candidate, bbox, center }))
    }

    /// Every external contour of `mask` that survives the geometry filters,
    /// scored, in contour order
    pub fn candidates(mask: &Mat, profile: &ProcessingProfile) -> Result<Vec<Candidate>> {
        let frame_w = mask.cols() as f64;
        let frame_h = mask.rows() as f64;
        let contours = MaskUtils::external_contours(mask)?;

        let mut out = Vec::new();
        for (index, contour) in contours.iter().enumerate() {
            let Some((proc_bbox, features)) = Self::features(&contour, frame_w, frame_h, &profile.geo)? else {
                continue;
            };
            if !Self::passes(&features, &profile.geo) {
                continue;
            }
            let score = Self::score(&features, &profile.weights);
            out.push(Candidate {
                index,
                proc_bbox,
                features,
                score,
            });
        }
        Ok(out)
    }

    /// Shape features of one contour; `None` for degenerate contours
    pub fn features(
        contour: &Contour,
        frame_w: f64,
        frame_h: f64,
        geo: &GeoFilters,
    ) -> Result<Option<(BBox, ContourFeatures)>> {
        let frame_area = frame_w * frame_h;
        let area = imgproc::contour_area(contour, false)?;
        let perimeter = imgproc::arc_length(contour, true)?;
        let bbox = BBox::from_rect(imgproc::bounding_rect(contour)?);

        let mut hull = Vector::<Point>::new();
        imgproc::convex_hull(contour, &mut hull, false, true)?;
        let hull_area = imgproc::contour_area(&hull, false)?;

        if area <= 0.0 || perimeter <= 0.0 || hull_area <= 0.0 || bbox.is_empty() || frame_area <= 0.0 {
            return Ok(None);
        }

        let m = imgproc::moments(contour, false)?;
        let (cx, cy) = if m.m00 != 0.0 {
            (m.m10 / m.m00, m.m01 / m.m00)
        } else {
            bbox.center()
        };
        let half_w = frame_w / 2.0;
        let half_h = frame_h / 2.0;
        let dist_from_center = (cx - half_w).hypot(cy - half_h) / half_w.hypot(half_h);

        let aspect_ratio = bbox.aspect_ratio();
        let rectangularity = area / bbox.area();

        Ok(Some((
            bbox,
            ContourFeatures {
                area_norm: area / frame_area,
                fill: rectangularity,
                solidity: area / hull_area,
                circularity: (4.0 * PI * area / (perimeter * perimeter)).min(1.0),
                rectangularity,
                aspect_ratio,
                ar_score: ar_score(aspect_ratio, geo),
                bbox_ratio: bbox.area() / frame_area,
                dist_from_center,
            },
        )))
    }

    /// Hard geometry filters; a failing contour is never scored
    pub fn passes(f: &ContourFeatures, geo: &GeoFilters) -> bool {
        (geo.ar_min..=geo.ar_max).contains(&f.aspect_ratio)
            && (geo.bbox_min..=geo.bbox_max).contains(&f.bbox_ratio)
            && f.bbox_ratio <= geo.bbox_hard_cap
            && (geo.fill_min..=geo.fill_max).contains(&f.fill)
            && f.area_norm >= geo.min_area_frac
    }

    pub fn score(f: &ContourFeatures, w: &Weights) -> f64 {
        w.area * f.area_norm
            + w.fill * f.fill
            + w.solidity * f.solidity
            + w.circular * f.circularity
            + w.rect * f.rectangularity
            + w.ar * f.ar_score
            - f.dist_from_center * w.center_bias * w.dist
    }
}

fn ar_score(ar: f64, geo: &GeoFilters) -> f64 {
    let span = (1.0 - geo.ar_min).max(geo.ar_max - 1.0);
    if span <= 0.0 {
        return if ar == 1.0 { 1.0 } else { 0.0 };
    }
    (1.0 - (ar - 1.0).abs() / span).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Rect, Scalar};

    fn permissive() -> ProcessingProfile {
        let mut profile = ProcessingProfile::default();
        profile.geo = GeoFilters {
            ar_min: 0.2,
            ar_max: 5.0,
            bbox_min: 0.001,
            bbox_max: 0.9,
            bbox_hard_cap: 0.9,
            fill_min: 0.3,
            fill_max: 1.0,
            min_area_frac: 0.0,
        };
        profile
    }

    fn mask_with(rects: &[Rect]) -> Result<Mat> {
        let mut mask = MaskUtils::zeros(120, 160)?;
        for rect in rects {
            imgproc::rectangle(&mut mask, *rect, Scalar::all(255.0), imgproc::FILLED, imgproc::LINE_8, 0)?;
        }
        Ok(mask)
    }

    #[test]
    fn test_ar_score_peaks_at_square() {
        let geo = GeoFilters::default();
        assert_eq!(ar_score(1.0, &geo), 1.0);
        assert!(ar_score(1.6, &geo) < 1.0);
        assert_eq!(ar_score(2.2, &geo), 0.0);
        assert_eq!(ar_score(4.0, &geo), 0.0);
    }

    #[test]
    fn test_square_features() -> Result<()> {
        let mask = mask_with(&[Rect::new(60, 40, 41, 41)])?;
        let candidates = ContourSelector::candidates(&mask, &permissive())?;
        assert_eq!(candidates.len(), 1);

        let f = candidates[0].features;
        assert!((f.solidity - 1.0).abs() < 1e-9);
        assert!(f.fill > 0.9 && f.fill <= 1.0);
        assert!(f.circularity <= 1.0);
        assert!(f.dist_from_center < 0.01);
        assert_eq!(candidates[0].proc_bbox, BBox::new(60, 40, 41, 41));
        Ok(())
    }

    #[test]
    fn test_filters_drop_violating_contours() -> Result<()> {
        // A thin bar violates the aspect bounds of the default profile
        let mask = mask_with(&[Rect::new(10, 10, 120, 4), Rect::new(60, 40, 41, 41)])?;
        let mut profile = permissive();
        profile.geo.ar_max = 2.2;

        let candidates = ContourSelector::candidates(&mask, &profile)?;
        assert_eq!(candidates.len(), 1);
        assert!(candidates.iter().all(|c| ContourSelector::passes(&c.features, &profile.geo)));
        Ok(())
    }

    #[test]
    fn test_centre_bias_prefers_central_blob() -> Result<()> {
        let mask = mask_with(&[Rect::new(2, 2, 30, 30), Rect::new(65, 45, 30, 30)])?;
        let mut profile = permissive();
        profile.weights.dist = 1.0;
        profile.weights.center_bias = 1.0;

        let selected = ContourSelector::select(&mask, &profile, Size::new(160, 120))?.expect("two squares");
        assert_eq!(selected.candidate.proc_bbox, BBox::new(65, 45, 30, 30));
        Ok(())
    }

    #[test]
    fn test_selection_maps_to_source_frame() -> Result<()> {
        let mask = mask_with(&[Rect::new(60, 40, 40, 40)])?;
        let selected = ContourSelector::select(&mask, &permissive(), Size::new(320, 240))?.expect("square");
        assert_eq!(selected.bbox, BBox::new(120, 80, 80, 80));
        assert!((selected.center.0 - 0.5).abs() < 1e-9);
        assert!((selected.center.1 - 0.5).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_empty_mask_selects_nothing() -> Result<()> {
        let mask = MaskUtils::zeros(120, 160)?;
        assert!(ContourSelector::select(&mask, &permissive(), Size::new(160, 120))?.is_none());
        Ok(())
    }
}
