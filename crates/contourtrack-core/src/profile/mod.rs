//! Processing profiles
//!
//! A [`ProcessingProfile`] holds every numeric knob of one contour detector.
//! Profiles are validated once when they are built or loaded; the engine
//! treats them as immutable afterwards.

mod groups;
mod presets;

pub use groups::{
    CannyConfig, ColorGateConfig, ColorMode, CombineMode, GeoFilters, HsvGate, LabGate,
    MorphConfig, PreMorphConfig, ProcConfig, Weights,
};

use crate::error::{ensure, ConfigError};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Largest accepted working-frame side, in pixels
pub const MAX_PROC_DIM: u32 = 8192;

/// Largest accepted blur or morphology kernel size
pub const MAX_KERNEL: u32 = 255;

/// Complete parameter set of one contour detector
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingProfile {
    pub proc: ProcConfig,
    pub canny: CannyConfig,
    pub color_gate: ColorGateConfig,
    pub morph: MorphConfig,
    pub premorph: PreMorphConfig,
    pub geo: GeoFilters,
    pub weights: Weights,
}

impl ProcessingProfile {
    /// Parse and validate a JSON profile
    pub fn from_json_str(json: &str) -> Result<Self> {
        let profile: ProcessingProfile = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Read, parse and validate a JSON profile file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Working-frame pixel count
    pub fn proc_area(&self) -> f64 {
        self.proc.proc_w as f64 * self.proc.proc_h as f64
    }

    /// Check every range and sign invariant of the profile
    pub fn validate(&self) -> Result<()> {
        self.validate_proc()?;
        self.validate_canny()?;
        self.validate_color_gate()?;
        self.validate_morph()?;
        self.validate_premorph()?;
        self.validate_geo()?;
        self.validate_weights()
    }

    fn validate_proc(&self) -> Result<()> {
        let p = &self.proc;
        ensure(
            p.proc_w > 0 && p.proc_w <= MAX_PROC_DIM,
            "proc.proc_w",
            format!("must lie in 1..={MAX_PROC_DIM}, got {}", p.proc_w),
        )?;
        ensure(
            p.proc_h > 0 && p.proc_h <= MAX_PROC_DIM,
            "proc.proc_h",
            format!("must lie in 1..={MAX_PROC_DIM}, got {}", p.proc_h),
        )?;
        ensure(
            p.blur_k >= 1 && p.blur_k % 2 == 1 && p.blur_k <= MAX_KERNEL,
            "proc.blur_k",
            format!("must be an odd size in 1..={MAX_KERNEL}, got {}", p.blur_k),
        )?;
        ensure(
            p.border_margin.saturating_mul(2) < p.proc_w.min(p.proc_h),
            "proc.border_margin",
            "must leave part of the working frame uncleared",
        )
    }

    fn validate_canny(&self) -> Result<()> {
        let c = &self.canny;
        ensure(
            c.t1_init > 0.0 && c.t1_init <= 255.0,
            "canny.t1_init",
            format!("must be in (0, 255], got {}", c.t1_init),
        )?;
        ensure(c.t2_ratio > 0.0 && c.t2_ratio.is_finite(), "canny.t2_ratio", "must be positive")?;
        ensure(
            c.life_min >= 0.0 && c.life_max <= 1.0,
            "canny.life_min",
            "edge density bounds must lie in [0, 1]",
        )?;
        ensure(
            c.life_min < c.life_max,
            "canny.life_max",
            format!("life_min ({}) must be below life_max ({})", c.life_min, c.life_max),
        )?;
        ensure(
            (0.0..=1.0).contains(&c.rescue_life_min),
            "canny.rescue_life_min",
            "must lie in [0, 1]",
        )?;
        ensure(c.kp > 0.0 && c.kp.is_finite(), "canny.kp", "must be positive")?;
        ensure(c.max_iter >= 1, "canny.max_iter", "must be at least 1")
    }

    fn validate_color_gate(&self) -> Result<()> {
        let g = &self.color_gate;
        ensure(
            g.lab.ab_thresh >= 0.0 && g.lab.ab_thresh.is_finite(),
            "color_gate.lab.ab_thresh",
            "must be non-negative",
        )?;
        ensure(
            g.hsv.lo.iter().zip(g.hsv.hi.iter()).all(|(lo, hi)| lo <= hi),
            "color_gate.hsv",
            format!("lo {:?} must not exceed hi {:?}", g.hsv.lo, g.hsv.hi),
        )?;
        ensure(g.hsv.hi[0] <= 179, "color_gate.hsv.hi", "hue is limited to 0..=179")?;
        ensure(
            g.min_cover_pct >= 0.0 && g.min_cover_pct <= g.max_cover_pct && g.max_cover_pct <= 100.0,
            "color_gate.min_cover_pct",
            format!(
                "coverage bounds must satisfy 0 <= {} <= {} <= 100",
                g.min_cover_pct, g.max_cover_pct
            ),
        )
    }

    fn validate_morph(&self) -> Result<()> {
        let m = &self.morph;
        ensure(m.close_min >= 1, "morph.close_min", "must be at least 1")?;
        ensure(
            m.close_min <= m.close_max,
            "morph.close_max",
            format!("close_min ({}) exceeds close_max ({})", m.close_min, m.close_max),
        )?;
        ensure(m.close_max <= MAX_KERNEL, "morph.close_max", format!("must not exceed {MAX_KERNEL}"))?;
        ensure(m.dil_min >= 1, "morph.dil_min", "must be at least 1")?;
        ensure(
            m.dil_min <= m.dil_max,
            "morph.dil_max",
            format!("dil_min ({}) exceeds dil_max ({})", m.dil_min, m.dil_max),
        )?;
        ensure(m.dil_max <= MAX_KERNEL, "morph.dil_max", format!("must not exceed {MAX_KERNEL}"))?;
        ensure(m.open_k <= MAX_KERNEL, "morph.open_k", format!("must not exceed {MAX_KERNEL}"))?;
        ensure(m.steps >= 1, "morph.steps", "must be at least 1")
    }

    fn validate_premorph(&self) -> Result<()> {
        let p = &self.premorph;
        ensure(
            p.bottom_margin_pct >= 0.0 && p.bottom_margin_pct < 1.0,
            "premorph.bottom_margin_pct",
            format!("must lie in [0, 1), got {}", p.bottom_margin_pct),
        )?;
        ensure(
            p.min_blob_px <= MAX_PROC_DIM * MAX_PROC_DIM,
            "premorph.min_blob_px",
            format!("cannot exceed the largest working frame, got {}", p.min_blob_px),
        )
    }

    fn validate_geo(&self) -> Result<()> {
        let g = &self.geo;
        ensure(
            g.ar_min > 0.0 && g.ar_min <= g.ar_max && g.ar_max.is_finite(),
            "geo.ar_min",
            format!("aspect bounds must satisfy 0 < {} <= {}", g.ar_min, g.ar_max),
        )?;
        ensure(
            g.bbox_min >= 0.0 && g.bbox_min <= g.bbox_max && g.bbox_max <= 1.0,
            "geo.bbox_min",
            format!("bbox bounds must satisfy 0 <= {} <= {} <= 1", g.bbox_min, g.bbox_max),
        )?;
        ensure(
            g.bbox_hard_cap > 0.0 && g.bbox_hard_cap <= 1.0,
            "geo.bbox_hard_cap",
            "must lie in (0, 1]",
        )?;
        ensure(
            g.fill_min >= 0.0 && g.fill_min <= g.fill_max && g.fill_max <= 1.0,
            "geo.fill_min",
            format!("fill bounds must satisfy 0 <= {} <= {} <= 1", g.fill_min, g.fill_max),
        )?;
        ensure(
            (0.0..=1.0).contains(&g.min_area_frac),
            "geo.min_area_frac",
            "must lie in [0, 1]",
        )
    }

    fn validate_weights(&self) -> Result<()> {
        let w = &self.weights;
        let all = [
            ("weights.area", w.area),
            ("weights.fill", w.fill),
            ("weights.solidity", w.solidity),
            ("weights.circular", w.circular),
            ("weights.rect", w.rect),
            ("weights.ar", w.ar),
            ("weights.center_bias", w.center_bias),
            ("weights.dist", w.dist),
        ];
        for (field, value) in all {
            ensure(value.is_finite(), field, "must be a finite number")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_profile_is_valid() -> Result<()> {
        ProcessingProfile::default().validate()
    }

    #[test]
    fn test_inverted_life_band_is_rejected() {
        let mut profile = ProcessingProfile::default();
        profile.canny.life_min = 0.2;
        profile.canny.life_max = 0.1;
        match profile.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "canny.life_max"),
            other => panic!("expected invalid life band, got {:?}", other),
        }
    }

    #[test]
    fn test_even_blur_kernel_is_rejected() {
        let mut profile = ProcessingProfile::default();
        profile.proc.blur_k = 4;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_oversized_values_are_rejected_at_load() {
        let mut profile = ProcessingProfile::default();
        profile.proc.proc_w = 3_000_000_000;
        match profile.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "proc.proc_w"),
            other => panic!("expected oversized width to fail, got {:?}", other),
        }

        let mut profile = ProcessingProfile::default();
        profile.premorph.min_blob_px = u32::MAX;
        match profile.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "premorph.min_blob_px"),
            other => panic!("expected oversized blob floor to fail, got {:?}", other),
        }

        let mut profile = ProcessingProfile::default();
        profile.morph.dil_max = MAX_KERNEL + 2;
        assert!(profile.validate().is_err());

        let json = r#"{ "proc": { "proc_h": 4294967295 } }"#;
        assert!(ProcessingProfile::from_json_str(json).is_err());

        let mut profile = ProcessingProfile::default();
        profile.proc.proc_w = MAX_PROC_DIM;
        profile.premorph.min_blob_px = MAX_PROC_DIM * MAX_PROC_DIM;
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_range_pairs_are_checked() {
        let mut profile = ProcessingProfile::default();
        profile.morph.close_min = 9;
        profile.morph.close_max = 5;
        assert!(profile.validate().is_err());

        let mut profile = ProcessingProfile::default();
        profile.geo.fill_min = 0.9;
        profile.geo.fill_max = 0.5;
        assert!(profile.validate().is_err());

        let mut profile = ProcessingProfile::default();
        profile.color_gate.hsv.lo = [40, 0, 0];
        profile.color_gate.hsv.hi = [30, 255, 255];
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_nan_weight_is_rejected() {
        let mut profile = ProcessingProfile::default();
        profile.weights.solidity = f64::NAN;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_partial_json_takes_defaults() -> Result<()> {
        let profile = ProcessingProfile::from_json_str(
            r#"{ "canny": { "t1_init": 80.0 }, "color_gate": { "enabled": true, "mode": "hsv", "combine": "AND" } }"#,
        )?;
        assert_eq!(profile.canny.t1_init, 80.0);
        assert_eq!(profile.canny.max_iter, CannyConfig::default().max_iter);
        assert_eq!(profile.color_gate.mode, ColorMode::Hsv);
        assert_eq!(profile.color_gate.combine, CombineMode::And);
        Ok(())
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = ProcessingProfile::from_json_str(r#"{ "canny": { "t1": 80.0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_file_fails_at_load() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, r#"{{ "canny": {{ "max_iter": 0 }} }}"#)?;
        let err = ProcessingProfile::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "canny.max_iter", .. }));
        Ok(())
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = ProcessingProfile::from_json_file("/nonexistent/profile.json").unwrap_err();
        assert!(err.to_string().contains("profile.json"));
    }

    #[test]
    fn test_json_round_trip_preserves_profile() -> Result<()> {
        let profile = ProcessingProfile::small();
        let back = ProcessingProfile::from_json_str(&profile.to_json_string()?)?;
        assert_eq!(profile, back);
        Ok(())
    }
}
