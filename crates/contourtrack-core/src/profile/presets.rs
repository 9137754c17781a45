//! Built-in profiles for the BIG/SMALL detector slots

use super::{
    ColorGateConfig, ColorMode, CombineMode, GeoFilters, HsvGate, MorphConfig, PreMorphConfig,
    ProcessingProfile,
};

impl ProcessingProfile {
    /// Near, large objects: the default tuning
    pub fn big() -> Self {
        Self::default()
    }

    /// Distant or small objects: lower area bounds and finer kernels
    pub fn small() -> Self {
        Self {
            morph: MorphConfig {
                close_min: 3,
                close_max: 11,
                dil_min: 1,
                dil_max: 7,
                steps: 4,
                open_k: 0,
            },
            premorph: PreMorphConfig {
                bottom_margin_pct: 0.15,
                min_blob_px: 30,
                fill_from_edges: true,
            },
            geo: GeoFilters {
                ar_min: 0.40,
                ar_max: 2.20,
                bbox_min: 0.02,
                bbox_max: 0.18,
                bbox_hard_cap: 0.25,
                fill_min: 0.55,
                fill_max: 0.95,
                min_area_frac: 0.005,
            },
            ..Self::default()
        }
    }

    /// Names accepted by [`ProcessingProfile::preset`]
    pub const PRESETS: [&'static str; 4] = ["big", "small", "face-big", "face-small"];

    /// Built-in profile by name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "big" => Some(Self::big()),
            "small" => Some(Self::small()),
            "face-big" | "face_big" => Some(Self::face_big()),
            "face-small" | "face_small" => Some(Self::face_small()),
            _ => None,
        }
    }

    /// Close-range faces: skin-tone HSV gate, near-square shapes
    pub fn face_big() -> Self {
        Self {
            color_gate: skin_gate(),
            geo: GeoFilters {
                ar_min: 0.55,
                ar_max: 1.45,
                bbox_min: 0.08,
                bbox_max: 0.40,
                bbox_hard_cap: 0.55,
                fill_min: 0.55,
                fill_max: 0.95,
                min_area_frac: 0.02,
            },
            ..Self::default()
        }
    }

    /// Faces further away from the camera
    pub fn face_small() -> Self {
        let small = Self::small();
        Self {
            color_gate: skin_gate(),
            geo: GeoFilters {
                ar_min: 0.55,
                ar_max: 1.45,
                bbox_min: 0.01,
                bbox_max: 0.10,
                bbox_hard_cap: 0.15,
                fill_min: 0.50,
                fill_max: 0.95,
                min_area_frac: 0.004,
            },
            ..small
        }
    }
}

fn skin_gate() -> ColorGateConfig {
    ColorGateConfig {
        enabled: true,
        mode: ColorMode::Hsv,
        combine: CombineMode::Or,
        hsv: HsvGate {
            lo: [0, 48, 80],
            hi: [20, 255, 255],
        },
        min_cover_pct: 0.5,
        max_cover_pct: 45.0,
        ..ColorGateConfig::default()
    }
}
