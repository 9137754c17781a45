//! Frame conversions between the `image` crate and OpenCV

use super::mask::MaskUtils;
use crate::Result;
use anyhow::Context;
use opencv::{
    core::{self, Mat, Rect, Scalar},
    imgcodecs,
    imgproc,
    prelude::*,
};
use std::path::Path;
use thiserror::Error;

/// Frames the engine cannot interpret
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is empty")]
    Empty,

    #[error("unsupported pixel depth {0} (expected 8-bit)")]
    UnsupportedDepth(i32),

    #[error("unsupported channel count {0}")]
    UnsupportedChannels(i32),
}

/// Image utility functions for frame intake and artifact output
pub struct ImageUtils;

impl ImageUtils {
    /// Normalise an 8-bit gray, BGR or BGRA frame to a 3-channel BGR Mat
    pub fn to_bgr(frame: &Mat) -> Result<Mat> {
        if frame.empty() {
            return Err(FrameError::Empty.into());
        }
        if frame.depth() != core::CV_8U {
            return Err(FrameError::UnsupportedDepth(frame.depth()).into());
        }

        let code = match frame.channels() {
            3 => return frame.try_clone().context("Failed to copy frame"),
            1 => imgproc::COLOR_GRAY2BGR,
            4 => imgproc::COLOR_BGRA2BGR,
            n => return Err(FrameError::UnsupportedChannels(n).into()),
        };

        let mut bgr = Mat::default();
        imgproc::cvt_color(frame, &mut bgr, code, 0).context("Failed to convert frame to BGR")?;
        Ok(bgr)
    }

    /// Convert image::RgbImage to a BGR Mat
    pub fn rgb_to_mat(rgb_image: &image::RgbImage) -> Result<Mat> {
        let rgb = Mat::from_slice(rgb_image.as_raw())?
            .reshape(3, rgb_image.height() as i32)?
            .try_clone()?;

        let mut bgr = Mat::default();
        imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)
            .context("Failed to convert RGB image to OpenCV Mat")?;
        Ok(bgr)
    }

    /// Convert a gray, BGR or BGRA Mat to image::RgbImage
    pub fn mat_to_rgb(mat: &Mat) -> Result<image::RgbImage> {
        let bgr = Self::to_bgr(mat)?;
        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)
            .context("Failed to convert OpenCV Mat to RGB")?;

        let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
        let bytes = rgb.data_bytes()?.to_vec();
        image::RgbImage::from_raw(width, height, bytes)
            .context("Mat buffer does not match its dimensions")
    }

    /// Copy of `frame` with every pixel outside `region` set to black
    pub fn keep_region(frame: &Mat, region: Rect) -> Result<Mat> {
        let stencil = MaskUtils::stencil(frame.rows(), frame.cols(), region)?;
        let mut out = Mat::new_rows_cols_with_default(frame.rows(), frame.cols(), frame.typ(), Scalar::all(0.0))
            .context("Failed to allocate masked frame")?;
        frame
            .copy_to_masked(&mut out, &stencil)
            .context("Failed to mask frame outside region")?;
        Ok(out)
    }

    /// Load an image file as a BGR Mat
    pub fn load_bgr<P: AsRef<Path>>(path: P) -> Result<Mat> {
        let img = image::open(&path)
            .with_context(|| format!("Failed to open image: {:?}", path.as_ref()))?
            .to_rgb8();

        Self::rgb_to_mat(&img)
    }

    /// Save a Mat through the image crate, falling back to OpenCV codecs
    pub fn save<P: AsRef<Path>>(mat: &Mat, path: P) -> Result<()> {
        match Self::mat_to_rgb(mat) {
            Ok(rgb_image) => rgb_image
                .save(&path)
                .with_context(|| format!("Failed to save image: {:?}", path.as_ref())),
            Err(_) => {
                let path_str = path.as_ref().to_string_lossy();
                imgcodecs::imwrite(&path_str, mat, &core::Vector::new())
                    .with_context(|| format!("Failed to save image: {}", path_str))?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_32FC1, CV_8UC1, CV_8UC4};

    #[test]
    fn test_rgb_to_mat_swaps_channels() -> Result<()> {
        let mut rgb_img = image::RgbImage::new(4, 3);
        rgb_img.put_pixel(1, 2, image::Rgb([10, 20, 30]));

        let mat = ImageUtils::rgb_to_mat(&rgb_img)?;
        assert_eq!((mat.cols(), mat.rows(), mat.channels()), (4, 3, 3));
        let px = mat.at_2d::<core::Vec3b>(2, 1)?;
        assert_eq!((px[0], px[1], px[2]), (30, 20, 10));

        let back = ImageUtils::mat_to_rgb(&mat)?;
        assert_eq!(back.get_pixel(1, 2), &image::Rgb([10, 20, 30]));
        Ok(())
    }

    #[test]
    fn test_to_bgr_accepts_gray_and_bgra() -> Result<()> {
        let gray = Mat::new_rows_cols_with_default(10, 12, CV_8UC1, Scalar::all(77.0))?;
        let bgr = ImageUtils::to_bgr(&gray)?;
        assert_eq!(bgr.channels(), 3);
        assert_eq!(bgr.at_2d::<core::Vec3b>(5, 5)?[1], 77);

        let bgra = Mat::new_rows_cols_with_default(10, 12, CV_8UC4, Scalar::all(9.0))?;
        assert_eq!(ImageUtils::to_bgr(&bgra)?.channels(), 3);
        Ok(())
    }

    #[test]
    fn test_keep_region_blacks_out_the_rest() -> Result<()> {
        let frame = Mat::new_rows_cols_with_default(40, 50, core::CV_8UC3, Scalar::all(90.0))?;
        let masked = ImageUtils::keep_region(&frame, Rect::new(10, 10, 20, 10))?;
        assert_eq!((masked.cols(), masked.rows(), masked.typ()), (50, 40, frame.typ()));
        assert_eq!(masked.at_2d::<core::Vec3b>(15, 15)?[2], 90);
        assert_eq!(masked.at_2d::<core::Vec3b>(0, 0)?[0], 0);
        assert_eq!(masked.at_2d::<core::Vec3b>(25, 15)?[1], 0);
        Ok(())
    }

    #[test]
    fn test_to_bgr_rejects_float_and_empty() -> Result<()> {
        let float = Mat::new_rows_cols_with_default(4, 4, CV_32FC1, Scalar::all(0.5))?;
        let err = ImageUtils::to_bgr(&float).unwrap_err();
        assert!(err.downcast_ref::<FrameError>().is_some());

        let err = ImageUtils::to_bgr(&Mat::default()).unwrap_err();
        assert_eq!(err.downcast_ref::<FrameError>(), Some(&FrameError::Empty));
        Ok(())
    }
}
