//! Single-frame detection

pub mod detector;
pub mod overlay;
pub mod result;

pub use detector::ContourDetector;
pub use result::{DetectionDiagnostics, DetectionResult};
