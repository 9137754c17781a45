//! Debug rendering of a detection on the source frame

use crate::bbox::BBox;
use crate::utils::ImageUtils;
use crate::Result;
use opencv::{
    core::{Mat, Point, Scalar},
    imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8},
    prelude::*,
};

const BOX_COLOR: (f64, f64, f64) = (0.0, 255.0, 0.0);
const CENTER_COLOR: (f64, f64, f64) = (0.0, 0.0, 255.0);

fn bgr((b, g, r): (f64, f64, f64)) -> Scalar {
    Scalar::new(b, g, r, 0.0)
}

/// Values printed next to the box
pub struct OverlayLabel<'a> {
    pub tag: &'a str,
    pub fill: f64,
    pub bbox_ratio: f64,
    pub score: f64,
}

/// Copy of `frame` with the box, its centre and a label drawn on it
pub fn draw_detection(frame: &Mat, bbox: &BBox, label: &OverlayLabel) -> Result<Mat> {
    let mut output = ImageUtils::to_bgr(frame)?;
    let thickness = (output.cols().max(output.rows()) / 200).max(1);

    imgproc::rectangle(&mut output, bbox.to_rect(), bgr(BOX_COLOR), thickness, LINE_8, 0)?;

    let (cx, cy) = bbox.center();
    imgproc::circle(
        &mut output,
        Point::new(cx.round() as i32, cy.round() as i32),
        thickness + 2,
        bgr(CENTER_COLOR),
        -1,
        LINE_8,
        0,
    )?;

    let text = format!(
        "{} fill={:.2} bbox={:.2} score={:.2}",
        label.tag, label.fill, label.bbox_ratio, label.score
    );
    let baseline = (bbox.y - 6).max(12);
    imgproc::put_text(
        &mut output,
        &text,
        Point::new(bbox.x.max(2), baseline),
        FONT_HERSHEY_SIMPLEX,
        0.4,
        bgr(BOX_COLOR),
        1,
        LINE_8,
        false,
    )?;
    Ok(output)
}
