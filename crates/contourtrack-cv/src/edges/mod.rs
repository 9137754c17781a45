//! Edge extraction with a closed-loop threshold search
//!
//! The Canny thresholds are driven by edge density: too few edge pixels
//! lower `t1`, too many raise it, proportionally to the error. A frame that
//! stays nearly edgeless is rescued with an adaptive-threshold mask, and an
//! optional colour gate is merged on top.

pub mod color;

pub use color::{ColorGate, ColorGateOutcome};

use crate::utils::{ImageUtils, MaskUtils};
use crate::Result;
use anyhow::Context;
use contourtrack_core::{CannyConfig, ProcessingProfile};
use opencv::{
    core::{self, Mat, Size},
    imgproc,
    prelude::*,
};
use serde::Serialize;
use tracing::debug;

/// Bounds applied to `t1` after every controller step
const T1_FLOOR: f64 = 1.0;
const T1_CEIL: f64 = 220.0;

const RESCUE_BLOCK: i32 = 11;
const RESCUE_OFFSET: f64 = 2.0;

/// Outcome of the threshold controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdSearch {
    /// Thresholds that produced the returned edges
    pub t1: f64,
    pub t2: f64,
    /// Edge passes run
    pub iterations: u32,
    /// True when the density landed inside `[life_min, life_max]`
    pub converged: bool,
}

/// Edge mask for one frame at working resolution
#[derive(Debug)]
pub struct EdgeExtraction {
    /// Edges, rescue mask and colour gate combined
    pub mask: Mat,
    /// Resized BGR frame the mask was computed from
    pub proc_bgr: Mat,
    /// Edge density of the accepted Canny pass, in [0, 1]
    pub life: f64,
    pub search: ThresholdSearch,
    pub used_rescue: bool,
    /// `None` when the gate is disabled
    pub color: Option<ColorGateOutcome>,
}

pub struct EdgeExtractor;

impl EdgeExtractor {
    /// Run the full edge stage on a source frame
    pub fn extract(frame: &Mat, profile: &ProcessingProfile) -> Result<EdgeExtraction> {
        let proc_bgr = Self::to_working_resolution(frame, profile)?;
        let gray = Self::blurred_gray(&proc_bgr, profile.proc.blur_k)?;

        let (mut mask, life, search) = Self::auto_canny(&gray, &profile.canny)?;

        let used_rescue = life < profile.canny.rescue_life_min;
        if used_rescue {
            debug!(life, "edge density below rescue floor, adding adaptive threshold");
            let rescue = Self::rescue_mask(&gray)?;
            let mut merged = Mat::default();
            core::bitwise_or(&mask, &rescue, &mut merged, &core::no_array())?;
            mask = merged;
        }

        let mut color = None;
        if profile.color_gate.enabled {
            let (gated, outcome) = ColorGate::apply(&mask, &proc_bgr, &profile.color_gate)?;
            mask = gated;
            color = Some(outcome);
        }

        Ok(EdgeExtraction {
            mask,
            proc_bgr,
            life,
            search,
            used_rescue,
            color,
        })
    }

    /// BGR frame resized to `proc_w x proc_h`
    pub fn to_working_resolution(frame: &Mat, profile: &ProcessingProfile) -> Result<Mat> {
        let bgr = ImageUtils::to_bgr(frame)?;
        let target = Size::new(profile.proc.proc_w as i32, profile.proc.proc_h as i32);
        if bgr.cols() == target.width && bgr.rows() == target.height {
            return Ok(bgr);
        }

        let mut resized = Mat::default();
        imgproc::resize(&bgr, &mut resized, target, 0.0, 0.0, imgproc::INTER_AREA)
            .context("Failed to resize frame to working resolution")?;
        Ok(resized)
    }

    fn blurred_gray(bgr: &Mat, blur_k: u32) -> Result<Mat> {
        let mut gray = Mat::default();
        imgproc::cvt_color(bgr, &mut gray, imgproc::COLOR_BGR2GRAY, 0)
            .context("Failed to convert to grayscale")?;
        if blur_k <= 1 {
            return Ok(gray);
        }

        let k = blur_k as i32;
        let mut blurred = Mat::default();
        imgproc::gaussian_blur(&gray, &mut blurred, Size::new(k, k), 0.0, 0.0, core::BORDER_DEFAULT)
            .context("Gaussian blur failed")?;
        Ok(blurred)
    }

    /// Proportional search for a Canny threshold pair that yields an edge
    /// density inside the target band.
    ///
    /// Runs at most `max_iter` passes and accepts the last one when the
    /// band is never reached.
    pub fn auto_canny(gray: &Mat, cfg: &CannyConfig) -> Result<(Mat, f64, ThresholdSearch)> {
        let mut t1 = cfg.t1_init.clamp(T1_FLOOR, T1_CEIL);
        let mut edges = Mat::default();
        let mut life = 0.0;
        let mut search = ThresholdSearch {
            t1,
            t2: 0.0,
            iterations: 0,
            converged: false,
        };

        for _ in 0..cfg.max_iter {
            let t2 = (cfg.t2_ratio * t1).clamp(0.0, 255.0);
            let mut pass = Mat::default();
            imgproc::canny(gray, &mut pass, t1, t2, 3, false).context("Canny failed")?;
            life = MaskUtils::coverage(&pass)?;
            edges = pass;

            search.t1 = t1;
            search.t2 = t2;
            search.iterations += 1;

            if life < cfg.life_min {
                t1 = (t1 - cfg.kp * (cfg.life_min - life)).clamp(T1_FLOOR, T1_CEIL);
            } else if life > cfg.life_max {
                t1 = (t1 + cfg.kp * (life - cfg.life_max)).clamp(T1_FLOOR, T1_CEIL);
            } else {
                search.converged = true;
                break;
            }
        }

        if !search.converged {
            debug!(
                life,
                t1 = search.t1,
                iterations = search.iterations,
                "edge threshold search did not converge"
            );
        }
        Ok((edges, life, search))
    }

    /// Inverted adaptive mean threshold: dark detail on a lighter local
    /// background becomes foreground
    fn rescue_mask(gray: &Mat) -> Result<Mat> {
        let mut rescue = Mat::default();
        imgproc::adaptive_threshold(
            gray,
            &mut rescue,
            255.0,
            imgproc::ADAPTIVE_THRESH_MEAN_C,
            imgproc::THRESH_BINARY_INV,
            RESCUE_BLOCK,
            RESCUE_OFFSET,
        )
        .context("Adaptive threshold failed")?;
        Ok(rescue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Rect, Scalar, CV_8UC1, CV_8UC3};

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
    fn test_working_resolution_matches_profile() -> Result<()> {
        let profile = ProcessingProfile::default();
        let proc = EdgeExtractor::to_working_resolution(&square_frame()?, &profile)?;
        assert_eq!((proc.cols(), proc.rows()), (160, 120));
        Ok(())
    }

    #[test]
    fn test_uniform_frame_never_errors() -> Result<()> {
        let frame = Mat::new_rows_cols_with_default(120, 160, CV_8UC1, Scalar::all(90.0))?;
        let profile = ProcessingProfile::default();
        let out = EdgeExtractor::extract(&frame, &profile)?;
        assert_eq!(out.life, 0.0);
        assert!(!out.search.converged);
        assert!(out.used_rescue);
        assert_eq!(out.search.iterations, profile.canny.max_iter);
        Ok(())
    }

    #[test]
    fn test_threshold_stays_clamped() -> Result<()> {
        let frame = Mat::new_rows_cols_with_default(120, 160, CV_8UC1, Scalar::all(90.0))?;
        let cfg = CannyConfig {
            kp: 1e6,
            max_iter: 3,
            ..CannyConfig::default()
        };
        let (_, _, search) = EdgeExtractor::auto_canny(&frame, &cfg)?;
        assert_eq!(search.t1, T1_FLOOR);
        assert!(search.t2 <= 255.0);
        Ok(())
    }

    #[test]
    fn test_square_edges_have_density_in_unit_range() -> Result<()> {
        let profile = ProcessingProfile::default();
        let out = EdgeExtractor::extract(&square_frame()?, &profile)?;
        assert!((0.0..=1.0).contains(&out.life));
        assert!(out.life > 0.0);
        assert!(out.color.is_none());
        assert_eq!((out.mask.cols(), out.mask.rows()), (160, 120));
        Ok(())
    }
}
