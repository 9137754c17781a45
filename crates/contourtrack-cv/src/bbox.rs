//! Bounding boxes and region-of-interest arithmetic
//!
//! Boxes are integer pixel rectangles. They move between two coordinate
//! spaces: the working resolution of a detector and the full source frame.

use opencv::core::Rect;
use serde::{Deserialize, Serialize};

/// Axis-aligned pixel rectangle `(x, y, width, height)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create from OpenCV Rect
    pub fn from_rect(rect: Rect) -> Self {
        Self::new(rect.x, rect.y, rect.width, rect.height)
    }

    /// Convert to OpenCV Rect
    pub fn to_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn area(&self) -> f64 {
        self.width.max(0) as f64 * self.height.max(0) as f64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Geometric centre in (sub)pixel coordinates
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// Width over height, with the height floored at one pixel
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / (self.height.max(1) as f64)
    }

    /// Scale every coordinate, rounding to the nearest pixel
    pub fn scale(&self, sx: f64, sy: f64) -> Self {
        let x0 = (self.x as f64 * sx).round() as i32;
        let y0 = (self.y as f64 * sy).round() as i32;
        let x1 = ((self.x + self.width) as f64 * sx).round() as i32;
        let y1 = ((self.y + self.height) as f64 * sy).round() as i32;
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Intersection with the `width x height` frame
    pub fn clamp_to(&self, width: i32, height: i32) -> Self {
        let x0 = self.x.clamp(0, width);
        let y0 = self.y.clamp(0, height);
        let x1 = (self.x + self.width).clamp(0, width);
        let y1 = (self.y + self.height).clamp(0, height);
        Self::new(x0, y0, (x1 - x0).max(0), (y1 - y0).max(0))
    }

    /// Grow the box about its centre by `factor` and clip it to the frame.
    ///
    /// Used to derive the search window around a locked detection.
    pub fn expand(&self, factor: f64, frame_width: i32, frame_height: i32) -> Self {
        let pad_w = ((factor - 1.0).max(0.0) * self.width as f64 / 2.0) as i32;
        let pad_h = ((factor - 1.0).max(0.0) * self.height as f64 / 2.0) as i32;
        Self::new(
            self.x - pad_w,
            self.y - pad_h,
            self.width + 2 * pad_w,
            self.height + 2 * pad_h,
        )
        .clamp_to(frame_width, frame_height)
    }

    /// Calculate intersection over union (IoU) with another box
    pub fn iou(&self, other: &BBox) -> f64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = ((x2 - x1) * (y2 - y1)) as f64;
        let union = self.area() + other.area() - intersection;

        intersection / union
    }
}

impl From<Rect> for BBox {
    fn from(rect: Rect) -> Self {
        Self::from_rect(rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_iou() {
        let box1 = BBox::new(0, 0, 10, 10);
        let box2 = BBox::new(5, 5, 10, 10);

        let iou = box1.iou(&box2);
        assert!(iou > 0.0 && iou < 1.0);
        assert_eq!(box1.iou(&BBox::new(20, 20, 5, 5)), 0.0);
    }

    #[test]
    fn test_scale_round_trip_to_source() {
        let proc_box = BBox::new(60, 40, 40, 40);
        assert_eq!(proc_box.scale(2.0, 2.0), BBox::new(120, 80, 80, 80));
        assert_eq!(proc_box.scale(0.5, 0.5), BBox::new(30, 20, 20, 20));
    }

    #[test]
    fn test_expand_is_centred_and_clamped() {
        let b = BBox::new(40, 40, 20, 10);
        let roi = b.expand(2.0, 200, 200);
        assert_eq!(roi, BBox::new(30, 35, 40, 20));
        assert_eq!(roi.center(), b.center());

        let corner = BBox::new(0, 0, 20, 20).expand(3.0, 50, 50);
        assert_eq!(corner, BBox::new(0, 0, 40, 40));
    }

    #[test]
    fn test_expand_factor_one_is_identity() {
        let b = BBox::new(10, 12, 30, 14);
        assert_eq!(b.expand(1.0, 100, 100), b);
    }

    #[test]
    fn test_clamp_outside_frame_is_empty() {
        let b = BBox::new(120, 10, 10, 10).clamp_to(100, 100);
        assert!(b.is_empty());
    }
}
