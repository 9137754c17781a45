//! Colour gate: a chroma mask merged with the edge mask

use crate::utils::MaskUtils;
use crate::Result;
use anyhow::Context;
use contourtrack_core::{ColorGateConfig, ColorMode, CombineMode};
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
};
use serde::Serialize;
use tracing::debug;

/// What the colour gate did on one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorGateOutcome {
    /// Colour mask coverage, percent of the working frame
    pub cover_pct: f64,
    /// False when the coverage fell outside the configured band
    pub used: bool,
}

pub struct ColorGate;

impl ColorGate {
    /// Compute the raw colour mask of a BGR working frame
    pub fn mask(bgr: &Mat, cfg: &ColorGateConfig) -> Result<Mat> {
        match cfg.mode {
            ColorMode::LabBg => Self::lab_background_mask(bgr, cfg.lab.ab_thresh),
            ColorMode::Hsv => Self::hsv_range_mask(bgr, cfg.hsv.lo, cfg.hsv.hi),
        }
    }

    /// Gate `edges` with the colour mask, or pass them through when the mask
    /// coverage is implausible for this frame
    pub fn apply(edges: &Mat, bgr: &Mat, cfg: &ColorGateConfig) -> Result<(Mat, ColorGateOutcome)> {
        let color = Self::mask(bgr, cfg)?;
        let cover_pct = 100.0 * MaskUtils::coverage(&color)?;

        if cover_pct < cfg.min_cover_pct || cover_pct > cfg.max_cover_pct {
            debug!(cover_pct, "colour mask coverage out of band, gate skipped");
            let passthrough = edges.try_clone().context("Failed to copy edge mask")?;
            return Ok((passthrough, ColorGateOutcome { cover_pct, used: false }));
        }

        let mut combined = Mat::default();
        match cfg.combine {
            CombineMode::Or => core::bitwise_or(edges, &color, &mut combined, &core::no_array())?,
            CombineMode::And => core::bitwise_and(edges, &color, &mut combined, &core::no_array())?,
        }
        Ok((combined, ColorGateOutcome { cover_pct, used: true }))
    }

    /// Pixels whose (a, b) chroma is further than `ab_thresh` from the
    /// frame's median chroma
    fn lab_background_mask(bgr: &Mat, ab_thresh: f64) -> Result<Mat> {
        let mut lab = Mat::default();
        imgproc::cvt_color(bgr, &mut lab, imgproc::COLOR_BGR2Lab, 0)
            .context("Lab conversion failed")?;

        let pixels = lab.data_bytes()?;
        let mut hist_a = [0usize; 256];
        let mut hist_b = [0usize; 256];
        for px in pixels.chunks_exact(3) {
            hist_a[px[1] as usize] += 1;
            hist_b[px[2] as usize] += 1;
        }
        let count = pixels.len() / 3;
        let a0 = histogram_median(&hist_a, count);
        let b0 = histogram_median(&hist_b, count);

        let mut mask = MaskUtils::zeros(bgr.rows(), bgr.cols())?;
        let thresh_sq = ab_thresh * ab_thresh;
        for (dst, px) in mask.data_bytes_mut()?.iter_mut().zip(pixels.chunks_exact(3)) {
            let da = px[1] as f64 - a0;
            let db = px[2] as f64 - b0;
            if da * da + db * db > thresh_sq {
                *dst = 255;
            }
        }
        Ok(mask)
    }

    /// Pixels inside the inclusive HSV box `[lo, hi]`
    fn hsv_range_mask(bgr: &Mat, lo: [u8; 3], hi: [u8; 3]) -> Result<Mat> {
        let mut hsv = Mat::default();
        imgproc::cvt_color(bgr, &mut hsv, imgproc::COLOR_BGR2HSV, 0)
            .context("HSV conversion failed")?;

        let mut mask = MaskUtils::zeros(bgr.rows(), bgr.cols())?;
        let pixels = hsv.data_bytes()?;
        for (dst, px) in mask.data_bytes_mut()?.iter_mut().zip(pixels.chunks_exact(3)) {
            let inside = (0..3).all(|c| lo[c] <= px[c] && px[c] <= hi[c]);
            if inside {
                *dst = 255;
            }
        }
        Ok(mask)
    }
}

/// Median of `count` 8-bit samples; even counts average the middle pair
fn histogram_median(hist: &[usize; 256], count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let nth = |rank: usize| -> usize {
        let mut seen = 0;
        for (value, &n) in hist.iter().enumerate() {
            seen += n;
            if seen > rank {
                return value;
            }
        }
        255
    };
    if count % 2 == 1 {
        nth(count / 2) as f64
    } else {
        (nth(count / 2 - 1) + nth(count / 2)) as f64 / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Rect, Scalar, CV_8UC3};

    /// Gray frame with a saturated orange patch
    fn orange_patch_frame() -> Result<Mat> {
        let mut frame = Mat::new_rows_cols_with_default(40, 40, CV_8UC3, Scalar::all(128.0))?;
        imgproc::rectangle(
            &mut frame,
            Rect::new(10, 10, 10, 10),
            Scalar::new(0.0, 128.0, 255.0, 0.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )?;
        Ok(frame)
    }

    #[test]
    fn test_histogram_median() {
        let mut hist = [0usize; 256];
        hist[3] = 2;
        hist[9] = 1;
        assert_eq!(histogram_median(&hist, 3), 3.0);
        hist[11] = 1;
        assert_eq!(histogram_median(&hist, 4), 6.0);
    }

    #[test]
    fn test_lab_mask_marks_off_background_chroma() -> Result<()> {
        let frame = orange_patch_frame()?;
        let mask = ColorGate::mask(&frame, &ColorGateConfig::default())?;
        assert_eq!(*mask.at_2d::<u8>(15, 15)?, 255);
        assert_eq!(*mask.at_2d::<u8>(30, 30)?, 0);
        assert_eq!(core::count_non_zero(&mask)?, 100);
        Ok(())
    }

    #[test]
    fn test_hsv_mask_selects_hue_band() -> Result<()> {
        let frame = orange_patch_frame()?;
        let cfg = ColorGateConfig {
            mode: ColorMode::Hsv,
            ..ColorGateConfig::default()
        };
        let mask = ColorGate::mask(&frame, &cfg)?;
        assert_eq!(core::count_non_zero(&mask)?, 100);
        Ok(())
    }

    #[test]
    fn test_out_of_band_coverage_is_ignored() -> Result<()> {
        let frame = orange_patch_frame()?;
        let edges = MaskUtils::zeros(40, 40)?;
        let cfg = ColorGateConfig {
            enabled: true,
            min_cover_pct: 20.0,
            ..ColorGateConfig::default()
        };
        let (gated, outcome) = ColorGate::apply(&edges, &frame, &cfg)?;
        assert!(!outcome.used);
        assert!((outcome.cover_pct - 6.25).abs() < 1e-9);
        assert_eq!(core::count_non_zero(&gated)?, 0);
        Ok(())
    }

    #[test]
    fn test_and_combination_intersects() -> Result<()> {
        let frame = orange_patch_frame()?;
        let mut edges = MaskUtils::zeros(40, 40)?;
        imgproc::rectangle(&mut edges, Rect::new(0, 0, 15, 40), Scalar::all(255.0), imgproc::FILLED, imgproc::LINE_8, 0)?;
        let cfg = ColorGateConfig {
            enabled: true,
            combine: CombineMode::And,
            ..ColorGateConfig::default()
        };
        let (gated, outcome) = ColorGate::apply(&edges, &frame, &cfg)?;
        assert!(outcome.used);
        assert_eq!(core::count_non_zero(&gated)?, 50);
        Ok(())
    }
}
