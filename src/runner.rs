//! Command implementations for the contourtrack CLI

use anyhow::{bail, Context};
use contourtrack_core::{ProcessingProfile, TrackerConfig};
use contourtrack_cv::{
    tracking::Slot, utils::ImageUtils, ContourDetector, PipelineKind, Result, VisionContext,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct TrackArgs {
    pub images: Vec<PathBuf>,
    pub kind: PipelineKind,
    pub big: Option<PathBuf>,
    pub small: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub overlay_dir: Option<PathBuf>,
}

fn load_profile(path: &Path) -> Result<ProcessingProfile> {
    ProcessingProfile::from_json_file(path)
        .with_context(|| format!("Invalid profile: {}", path.display()))
}

pub fn detect(image: &Path, profile: Option<&Path>, out: Option<&Path>, overlay: Option<&Path>) -> Result<()> {
    let profile = match profile {
        Some(path) => load_profile(path)?,
        None => ProcessingProfile::big(),
    };
    let detector = ContourDetector::new(Slot::Big.as_str(), profile)?.with_overlay(overlay.is_some());

    info!("Detecting in {}", image.display());
    let result = detector.detect_from_file(image)?;
    match &result {
        Some(r) => info!(score = r.score, "contour found at {:?}", r.bbox),
        None => warn!("no plausible contour in {}", image.display()),
    }

    let json = serde_json::to_string_pretty(&result).context("Failed to serialize detection")?;
    match out {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write JSON to: {:?}", path))?;
            info!("Results written to {}", path.display());
        }
        None => println!("{json}"),
    }

    if let (Some(path), Some(frame)) = (overlay, result.as_ref().and_then(|r| r.overlay.as_ref())) {
        ImageUtils::save(frame, path)?;
        info!("Overlay saved to {}", path.display());
    }
    Ok(())
}

pub fn track(args: &TrackArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => TrackerConfig::from_json_file(path)
            .with_context(|| format!("Invalid tracker config: {}", path.display()))?,
        None => TrackerConfig::default(),
    };
    config.return_overlay = config.return_overlay || args.overlay_dir.is_some();

    let mut ctx = VisionContext::with_defaults(config)?;
    ctx.select(args.kind);
    let tracker = ctx.tracker_mut(args.kind);
    if let Some(path) = &args.big {
        tracker.replace_profile(Slot::Big, load_profile(path)?)?;
    }
    if let Some(path) = &args.small {
        tracker.replace_profile(Slot::Small, load_profile(path)?)?;
    }

    if let Some(dir) = &args.overlay_dir {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    for (index, path) in args.images.iter().enumerate() {
        let frame = ImageUtils::load_bgr(path)?;
        let output = ctx.process(&frame)?;
        let tracker = ctx.tracker(args.kind);

        let line = serde_json::json!({
            "frame": index,
            "image": path.to_string_lossy(),
            "output": &output,
            "big": tracker.state(Slot::Big),
            "small": tracker.state(Slot::Small),
        });
        println!("{line}");

        if let (Some(dir), Some(image)) = (
            &args.overlay_dir,
            output.as_ref().and_then(|o| o.detection.overlay.as_ref()),
        ) {
            ImageUtils::save(image, dir.join(format!("frame_{index:04}.png")))?;
        }
    }
    Ok(())
}

pub fn show_profile(preset: &str) -> Result<()> {
    let Some(profile) = ProcessingProfile::preset(preset) else {
        bail!(
            "unknown preset '{preset}', expected one of: {}",
            ProcessingProfile::PRESETS.join(", ")
        );
    };
    println!("{}", profile.to_json_string()?);
    Ok(())
}

pub fn check_profile(path: &Path) -> Result<()> {
    let profile = load_profile(path)?;
    info!(
        proc_w = profile.proc.proc_w,
        proc_h = profile.proc.proc_h,
        "{} is valid",
        path.display()
    );
    println!("ok");
    Ok(())
}
