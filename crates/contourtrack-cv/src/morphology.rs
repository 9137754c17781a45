//! Mask cleanup and the close/dilate kernel search

use crate::bbox::BBox;
use crate::utils::MaskUtils;
use crate::Result;
use anyhow::Context;
use contourtrack_core::{GeoFilters, MorphConfig, ProcessingProfile};
use opencv::{
    core::{self, Mat, Point, Size},
    imgproc,
    prelude::*,
};
use serde::Serialize;
use tracing::debug;

/// Shape metrics of the largest blob in a refined mask
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BlobMetrics {
    /// Contour area over bounding-box area
    pub fill: f64,
    /// Bounding-box area over frame area
    pub bbox_ratio: f64,
    pub bbox: BBox,
}

/// Mask produced by the kernel search together with the kernels chosen
#[derive(Debug)]
pub struct RefinedMask {
    pub mask: Mat,
    pub close_k: i32,
    pub dilate_k: i32,
    /// Border margin cleared before the search
    pub border_margin: i32,
    /// `None` when the mask holds no contour at all
    pub metrics: Option<BlobMetrics>,
    /// True when the metrics fell inside both target bands
    pub met_targets: bool,
}

pub struct MorphologyRefiner;

impl MorphologyRefiner {
    /// Prepare and search at the profile's border margin
    pub fn refine(mask: &Mat, profile: &ProcessingProfile) -> Result<RefinedMask> {
        let prepared = Self::prepare(mask, profile)?;
        Self::search(&prepared, profile, profile.proc.border_margin as i32)
    }

    /// Floor suppression, despeckling and optional region filling
    pub fn prepare(mask: &Mat, profile: &ProcessingProfile) -> Result<Mat> {
        let cfg = &profile.premorph;
        let mut cleared = mask.try_clone().context("Failed to copy edge mask")?;
        let bottom_rows = (cleared.rows() as f64 * cfg.bottom_margin_pct).round() as i32;
        MaskUtils::clear_bottom_rows(&mut cleared, bottom_rows)?;

        let clean = MaskUtils::despeckle(&cleared, cfg.min_blob_px)?;
        if cfg.fill_from_edges {
            MaskUtils::fill_external_contours(&clean)
        } else {
            Ok(clean)
        }
    }

    /// Walk the kernel grid in ascending order, close-major.
    ///
    /// Returns the first pair whose largest blob sits inside both target
    /// bands, otherwise the pair closest to them.
    pub fn search(prepared: &Mat, profile: &ProcessingProfile, margin: i32) -> Result<RefinedMask> {
        let mut base = prepared.try_clone().context("Failed to copy prepared mask")?;
        MaskUtils::clear_border(&mut base, margin)?;

        let frame_area = (base.rows() as f64) * (base.cols() as f64);
        let geo = &profile.geo;
        let open_kernel = match profile.morph.open_k {
            k if k > 1 => Some(rect_kernel(k as i32)?),
            _ => None,
        };

        let mut best: Option<(f64, RefinedMask)> = None;
        for (close_k, dilate_k) in Self::kernel_grid(&profile.morph) {
            let mask = Self::apply_pair(&base, open_kernel.as_ref(), close_k, dilate_k)?;
            let metrics = Self::measure(&mask, frame_area)?;
            let distance = metrics.map_or(f64::INFINITY, |m| band_distance(&m, geo));

            let refined = RefinedMask {
                mask,
                close_k,
                dilate_k,
                border_margin: margin,
                metrics,
                met_targets: distance == 0.0,
            };
            if refined.met_targets {
                return Ok(refined);
            }
            if best.as_ref().is_none_or(|(d, _)| distance < *d) {
                best = Some((distance, refined));
            }
        }

        match best {
            Some((distance, refined)) => {
                debug!(
                    close_k = refined.close_k,
                    dilate_k = refined.dilate_k,
                    distance,
                    "no kernel pair met the geometry targets, keeping the closest"
                );
                Ok(refined)
            }
            // Empty grid only happens with steps == 0, which validation rejects
            None => Ok(RefinedMask {
                mask: base,
                close_k: 1,
                dilate_k: 1,
                border_margin: margin,
                metrics: None,
                met_targets: false,
            }),
        }
    }

    /// Ascending close-major `(close_k, dilate_k)` pairs
    pub fn kernel_grid(cfg: &MorphConfig) -> Vec<(i32, i32)> {
        let closes = odd_steps(cfg.close_min, cfg.close_max, cfg.steps);
        let dilates = odd_steps(cfg.dil_min, cfg.dil_max, cfg.steps);
        closes
            .iter()
            .flat_map(|&c| dilates.iter().map(move |&d| (c, d)))
            .collect()
    }

    fn apply_pair(base: &Mat, open_kernel: Option<&Mat>, close_k: i32, dilate_k: i32) -> Result<Mat> {
        let anchor = Point::new(-1, -1);
        let border = imgproc::morphology_default_border_value()?;

        let opened;
        let src = match open_kernel {
            Some(kernel) => {
                let mut out = Mat::default();
                imgproc::morphology_ex(base, &mut out, imgproc::MORPH_OPEN, kernel, anchor, 1, core::BORDER_CONSTANT, border)
                    .context("Opening failed")?;
                opened = out;
                &opened
            }
            None => base,
        };

        let mut closed = Mat::default();
        imgproc::morphology_ex(src, &mut closed, imgproc::MORPH_CLOSE, &rect_kernel(close_k)?, anchor, 1, core::BORDER_CONSTANT, border)
            .context("Closing failed")?;

        let mut dilated = Mat::default();
        imgproc::dilate(&closed, &mut dilated, &rect_kernel(dilate_k)?, anchor, 1, core::BORDER_CONSTANT, border)
            .context("Dilation failed")?;
        Ok(dilated)
    }

    fn measure(mask: &Mat, frame_area: f64) -> Result<Option<BlobMetrics>> {
        let Some(contour) = MaskUtils::largest_contour(mask)? else {
            return Ok(None);
        };
        let bbox = BBox::from_rect(imgproc::bounding_rect(&contour)?);
        if bbox.is_empty() || frame_area <= 0.0 {
            return Ok(None);
        }
        let area = imgproc::contour_area(&contour, false)?;
        Ok(Some(BlobMetrics {
            fill: area / bbox.area(),
            bbox_ratio: bbox.area() / frame_area,
            bbox,
        }))
    }
}

fn rect_kernel(k: i32) -> Result<Mat> {
    imgproc::get_structuring_element(imgproc::MORPH_RECT, Size::new(k, k), Point::new(-1, -1))
        .context("Failed to build structuring element")
}

/// `steps` evenly spaced odd sizes over `[lo, hi]`, deduplicated
fn odd_steps(lo: u32, hi: u32, steps: u32) -> Vec<i32> {
    let (lo, hi) = (lo.max(1) as f64, hi.max(1) as f64);
    let mut sizes: Vec<i32> = (0..steps)
        .map(|i| {
            let t = if steps > 1 { i as f64 / (steps - 1) as f64 } else { 0.0 };
            let k = (lo + t * (hi - lo)).round() as i32;
            if k % 2 == 0 { k + 1 } else { k }
        })
        .collect();
    sizes.dedup();
    sizes
}

/// Summed distance of fill and bbox ratio from their target bands
fn band_distance(m: &BlobMetrics, geo: &GeoFilters) -> f64 {
    outside(m.fill, geo.fill_min, geo.fill_max) + outside(m.bbox_ratio, geo.bbox_min, geo.bbox_max)
}

fn outside(x: f64, lo: f64, hi: f64) -> f64 {
    if x < lo {
        lo - x
    } else if x > hi {
        x - hi
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Rect, Scalar};

    fn outlined_square() -> Result<Mat> {
        let mut mask = MaskUtils::zeros(120, 160)?;
        imgproc::rectangle(&mut mask, Rect::new(55, 35, 50, 50), Scalar::all(255.0), 1, imgproc::LINE_8, 0)?;
        Ok(mask)
    }

    #[test]
    fn test_odd_steps_are_odd_sorted_and_unique() {
        assert_eq!(odd_steps(3, 21, 5), vec![3, 9, 13, 17, 21]);
        assert_eq!(odd_steps(3, 5, 5), vec![3, 5]);
        assert_eq!(odd_steps(7, 15, 1), vec![7]);
        assert!(odd_steps(1, 7, 4).windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_grid_is_close_major() {
        let cfg = MorphConfig {
            close_min: 3,
            close_max: 5,
            dil_min: 1,
            dil_max: 3,
            steps: 2,
            open_k: 0,
        };
        assert_eq!(
            MorphologyRefiner::kernel_grid(&cfg),
            vec![(3, 1), (3, 3), (5, 1), (5, 3)]
        );
    }

    #[test]
    fn test_prepare_fills_outline_and_clears_floor() -> Result<()> {
        let mut mask = outlined_square()?;
        imgproc::rectangle(&mut mask, Rect::new(0, 110, 160, 10), Scalar::all(255.0), imgproc::FILLED, imgproc::LINE_8, 0)?;
        let profile = ProcessingProfile::default();

        let prepared = MorphologyRefiner::prepare(&mask, &profile)?;
        assert_eq!(*prepared.at_2d::<u8>(60, 80)?, 255);
        assert_eq!(*prepared.at_2d::<u8>(115, 10)?, 0);
        Ok(())
    }

    #[test]
    fn test_search_stops_inside_targets() -> Result<()> {
        let mut profile = ProcessingProfile::default();
        profile.geo.bbox_min = 0.10;
        profile.geo.bbox_max = 0.30;
        profile.geo.fill_min = 0.60;
        profile.geo.fill_max = 1.0;
        let prepared = MorphologyRefiner::prepare(&outlined_square()?, &profile)?;

        let refined = MorphologyRefiner::search(&prepared, &profile, 6)?;
        assert!(refined.met_targets);
        assert_eq!((refined.close_k, refined.dilate_k), (3, 3));
        let metrics = refined.metrics.expect("square survives");
        assert!(metrics.fill > 0.9);
        Ok(())
    }

    #[test]
    fn test_search_falls_back_to_closest_pair() -> Result<()> {
        let mut profile = ProcessingProfile::default();
        profile.geo.bbox_min = 0.9;
        profile.geo.bbox_max = 0.95;
        let prepared = MorphologyRefiner::prepare(&outlined_square()?, &profile)?;

        let refined = MorphologyRefiner::search(&prepared, &profile, 0)?;
        assert!(!refined.met_targets);
        assert!(refined.metrics.is_some());
        // Closing leaves a solid blob unchanged, so the smallest close wins the tie
        assert_eq!(refined.close_k, 3);
        assert_eq!(refined.dilate_k, 15);
        Ok(())
    }

    #[test]
    fn test_empty_mask_yields_no_metrics() -> Result<()> {
        let profile = ProcessingProfile::default();
        let refined = MorphologyRefiner::refine(&MaskUtils::zeros(120, 160)?, &profile)?;
        assert!(refined.metrics.is_none());
        assert!(!refined.met_targets);
        Ok(())
    }
}
