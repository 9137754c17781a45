//! Utility modules

pub mod image;
pub mod mask;

pub use image::{FrameError, ImageUtils};
pub use mask::{Contour, MaskUtils};
