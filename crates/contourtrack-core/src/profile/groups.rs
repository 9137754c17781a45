//! Parameter groups of a processing profile

use serde::{Deserialize, Serialize};

/// Working resolution and pre-filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcConfig {
    pub proc_w: u32,
    pub proc_h: u32,
    /// Gaussian kernel size (odd, 1 disables blurring)
    pub blur_k: u32,
    /// Pixels cleared around the border before the morphology search
    pub border_margin: u32,
}

impl Default for ProcConfig {
    fn default() -> Self {
        Self {
            proc_w: 160,
            proc_h: 120,
            blur_k: 5,
            border_margin: 6,
        }
    }
}

/// Proportional auto-threshold search for the edge detector.
///
/// `life_*` values are edge densities, i.e. fractions of the working frame
/// classified as edge pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CannyConfig {
    pub t1_init: f64,
    pub t2_ratio: f64,
    pub life_min: f64,
    pub life_max: f64,
    pub rescue_life_min: f64,
    pub kp: f64,
    pub max_iter: u32,
}

impl Default for CannyConfig {
    fn default() -> Self {
        Self {
            t1_init: 50.0,
            t2_ratio: 2.5,
            life_min: 0.05,
            life_max: 0.10,
            rescue_life_min: 0.03,
            kp: 400.0,
            max_iter: 25,
        }
    }
}

/// How the colour mask is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    /// Lab (a, b) distance from the frame's median chroma
    LabBg,
    /// Fixed HSV range
    Hsv,
}

/// How the colour mask is merged with the edge mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombineMode {
    #[serde(alias = "OR")]
    Or,
    #[serde(alias = "AND")]
    And,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabGate {
    pub ab_thresh: f64,
}

impl Default for LabGate {
    fn default() -> Self {
        Self { ab_thresh: 22.0 }
    }
}

/// Inclusive HSV bounds in OpenCV 8-bit units (H in 0..=179)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HsvGate {
    pub lo: [u8; 3],
    pub hi: [u8; 3],
}

impl Default for HsvGate {
    fn default() -> Self {
        Self {
            lo: [5, 80, 40],
            hi: [30, 255, 255],
        }
    }
}

/// Optional colour gate applied on top of the edge mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorGateConfig {
    pub enabled: bool,
    pub mode: ColorMode,
    pub combine: CombineMode,
    pub lab: LabGate,
    pub hsv: HsvGate,
    /// Coverage bounds in percent of the working frame
    pub min_cover_pct: f64,
    pub max_cover_pct: f64,
}

impl Default for ColorGateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: ColorMode::LabBg,
            combine: CombineMode::Or,
            lab: LabGate::default(),
            hsv: HsvGate::default(),
            min_cover_pct: 0.5,
            max_cover_pct: 60.0,
        }
    }
}

/// Kernel ranges walked by the morphology search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MorphConfig {
    pub close_min: u32,
    pub close_max: u32,
    pub dil_min: u32,
    pub dil_max: u32,
    pub steps: u32,
    /// Opening kernel applied before close/dilate, 0 disables it
    pub open_k: u32,
}

impl Default for MorphConfig {
    fn default() -> Self {
        Self {
            close_min: 3,
            close_max: 21,
            dil_min: 3,
            dil_max: 15,
            steps: 5,
            open_k: 0,
        }
    }
}

/// Mask cleanup before the morphology search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreMorphConfig {
    /// Fraction of rows cleared at the bottom of the frame (floor suppression)
    pub bottom_margin_pct: f64,
    pub min_blob_px: u32,
    pub fill_from_edges: bool,
}

impl Default for PreMorphConfig {
    fn default() -> Self {
        Self {
            bottom_margin_pct: 0.2,
            min_blob_px: 100,
            fill_from_edges: true,
        }
    }
}

/// Geometric plausibility bounds, all relative to the working frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeoFilters {
    pub ar_min: f64,
    pub ar_max: f64,
    pub bbox_min: f64,
    pub bbox_max: f64,
    pub bbox_hard_cap: f64,
    pub fill_min: f64,
    pub fill_max: f64,
    pub min_area_frac: f64,
}

impl Default for GeoFilters {
    fn default() -> Self {
        Self {
            ar_min: 0.40,
            ar_max: 2.20,
            bbox_min: 0.18,
            bbox_max: 0.35,
            bbox_hard_cap: 0.50,
            fill_min: 0.60,
            fill_max: 0.95,
            min_area_frac: 0.03,
        }
    }
}

/// Score weights. Sign matters: negative weights penalise a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Weights {
    pub area: f64,
    pub fill: f64,
    pub solidity: f64,
    pub circular: f64,
    pub rect: f64,
    pub ar: f64,
    pub center_bias: f64,
    pub dist: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            area: 0.35,
            fill: 0.15,
            solidity: 0.20,
            circular: 0.10,
            rect: 0.15,
            ar: 0.10,
            center_bias: 0.25,
            dist: 0.20,
        }
    }
}
