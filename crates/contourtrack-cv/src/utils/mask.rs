//! Binary mask helpers (8-bit, 0 = background, 255 = foreground)

use crate::Result;
use anyhow::Context;
use opencv::{
    core::{self, Mat, Point, Rect, Scalar, Vector, CV_8UC1},
    imgproc,
    prelude::*,
};

pub type Contour = Vector<Point>;

pub struct MaskUtils;

impl MaskUtils {
    /// Black mask of the given size
    pub fn zeros(rows: i32, cols: i32) -> Result<Mat> {
        Mat::new_rows_cols_with_default(rows, cols, CV_8UC1, Scalar::all(0.0))
            .context("Failed to allocate mask")
    }

    /// Mask that is 255 inside `region` and 0 elsewhere
    pub fn stencil(rows: i32, cols: i32, region: Rect) -> Result<Mat> {
        let mut stencil = Self::zeros(rows, cols)?;
        imgproc::rectangle(&mut stencil, region, Scalar::all(255.0), imgproc::FILLED, imgproc::LINE_8, 0)
            .context("Failed to draw region stencil")?;
        Ok(stencil)
    }

    /// Copy of `mask` with everything outside `region` cleared
    pub fn keep_region(mask: &Mat, region: Rect) -> Result<Mat> {
        let stencil = Self::stencil(mask.rows(), mask.cols(), region)?;
        let mut out = Mat::default();
        core::bitwise_and(mask, &stencil, &mut out, &core::no_array())
            .context("Failed to restrict mask to region")?;
        Ok(out)
    }

    /// Fraction of non-zero pixels, in [0, 1]
    pub fn coverage(mask: &Mat) -> Result<f64> {
        let total = mask.total();
        if total == 0 {
            return Ok(0.0);
        }
        let on = core::count_non_zero(mask)?;
        Ok(on as f64 / total as f64)
    }

    /// Clear the last `rows` rows
    pub fn clear_bottom_rows(mask: &mut Mat, rows: i32) -> Result<()> {
        let (height, width) = (mask.rows(), mask.cols());
        let rows = rows.clamp(0, height);
        if rows == 0 {
            return Ok(());
        }
        let start = ((height - rows) * width) as usize;
        mask.data_bytes_mut()?[start..].fill(0);
        Ok(())
    }

    /// Clear a `margin`-pixel frame around the border
    pub fn clear_border(mask: &mut Mat, margin: i32) -> Result<()> {
        if margin <= 0 {
            return Ok(());
        }
        let (height, width) = (mask.rows() as usize, mask.cols() as usize);
        let m = (margin as usize).min(height).min(width);
        let data = mask.data_bytes_mut()?;
        for (row, line) in data.chunks_exact_mut(width).enumerate() {
            if row < m || row >= height - m {
                line.fill(0);
            } else {
                line[..m].fill(0);
                line[width - m..].fill(0);
            }
        }
        Ok(())
    }

    /// Remove 8-connected components smaller than `min_px`
    pub fn despeckle(mask: &Mat, min_px: u32) -> Result<Mat> {
        if min_px == 0 {
            return mask.try_clone().context("Failed to copy mask");
        }

        let mut labels = Mat::default();
        let mut stats = Mat::default();
        let mut centroids = Mat::default();
        let count = imgproc::connected_components_with_stats(
            mask,
            &mut labels,
            &mut stats,
            &mut centroids,
            8,
            core::CV_32S,
        )
        .context("Connected components failed")?;

        let mut keep = vec![false; count.max(0) as usize];
        for label in 1..count {
            let area = *stats.at_2d::<i32>(label, imgproc::CC_STAT_AREA)?;
            keep[label as usize] = area >= min_px as i32;
        }

        let mut out = Self::zeros(mask.rows(), mask.cols())?;
        let labels = labels.data_typed::<i32>()?;
        for (dst, &label) in out.data_bytes_mut()?.iter_mut().zip(labels) {
            if label > 0 && keep[label as usize] {
                *dst = 255;
            }
        }
        Ok(out)
    }

    pub fn external_contours(mask: &Mat) -> Result<Vector<Contour>> {
        let mut contours = Vector::<Contour>::new();
        imgproc::find_contours(
            mask,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )
        .context("Contour extraction failed")?;
        Ok(contours)
    }

    /// Redraw every external contour as a solid region
    pub fn fill_external_contours(mask: &Mat) -> Result<Mat> {
        let contours = Self::external_contours(mask)?;
        let mut filled = Self::zeros(mask.rows(), mask.cols())?;
        if contours.is_empty() {
            return Ok(filled);
        }
        imgproc::draw_contours(
            &mut filled,
            &contours,
            -1,
            Scalar::all(255.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            &Mat::default(),
            i32::MAX,
            Point::new(0, 0),
        )
        .context("Contour fill failed")?;
        Ok(filled)
    }

    /// External contour with the largest area; the first one wins ties
    pub fn largest_contour(mask: &Mat) -> Result<Option<Contour>> {
        let mut best: Option<(f64, Contour)> = None;
        for contour in Self::external_contours(mask)?.iter() {
            let area = imgproc::contour_area(&contour, false)?;
            if best.as_ref().is_none_or(|(best_area, _)| area > *best_area) {
                best = Some((area, contour));
            }
        }
        Ok(best.map(|(_, contour)| contour))
    }
}
