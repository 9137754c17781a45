//! Two-tier temporal tracker
//!
//! Two detectors run on every frame: BIG tuned for near, large targets and
//! SMALL for distant ones. Each slot keeps its own smoothed score and lock
//! latch; a locked slot searches only inside a window around its last box.

use super::state::{DetectorState, Transition};
use crate::detection::overlay::{draw_detection, OverlayLabel};
use crate::detection::{ContourDetector, DetectionResult};
use crate::traits::FrameDetector;
use crate::Result;
use contourtrack_core::{ProcessingProfile, TrackerConfig};
use opencv::{core::Mat, prelude::*};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Big,
    Small,
}

impl Slot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Big => "big",
            Slot::Small => "small",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result published for one frame
#[derive(Debug, Clone, Serialize)]
pub struct TrackOutput {
    pub detection: DetectionResult,
    pub slot: Slot,
    /// False for a low-confidence pick made while neither slot is locked
    pub locked: bool,
}

struct SlotEntry<D> {
    detector: D,
    state: DetectorState,
}

pub struct TemporalTracker<D: FrameDetector = ContourDetector> {
    config: TrackerConfig,
    big: SlotEntry<D>,
    small: SlotEntry<D>,
    last_output: Option<TrackOutput>,
}

impl TemporalTracker<ContourDetector> {
    /// Tracker over two contour detectors built from the given profiles
    pub fn new(big: ProcessingProfile, small: ProcessingProfile, config: TrackerConfig) -> Result<Self> {
        let big = ContourDetector::new(Slot::Big.to_string(), big)?;
        let small = ContourDetector::new(Slot::Small.to_string(), small)?;
        Self::with_detectors(big, small, config)
    }
}

impl<D: FrameDetector> TemporalTracker<D> {
    pub fn with_detectors(big: D, small: D, config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            big: SlotEntry {
                detector: big,
                state: DetectorState::default(),
            },
            small: SlotEntry {
                detector: small,
                state: DetectorState::default(),
            },
            last_output: None,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn state(&self, slot: Slot) -> &DetectorState {
        &self.entry(slot).state
    }

    pub fn detector(&self, slot: Slot) -> &D {
        &self.entry(slot).detector
    }

    pub fn last_output(&self) -> Option<&TrackOutput> {
        self.last_output.as_ref()
    }

    /// Process one frame: search each slot, update its state, then pick
    /// the result to publish
    pub fn update(&mut self, frame: &Mat) -> Result<Option<TrackOutput>> {
        let (frame_w, frame_h) = (frame.cols(), frame.rows());

        let big = Self::step(&mut self.big, Slot::Big, frame, &self.config)?;
        let small = Self::step(&mut self.small, Slot::Small, frame, &self.config)?;

        let pick = if self.big.state.active && big.is_some() {
            big.map(|d| (d, Slot::Big, true))
        } else if self.small.state.active && small.is_some() {
            small.map(|d| (d, Slot::Small, true))
        } else {
            match (big, small) {
                (Some(b), Some(s)) if s.score > b.score => Some((s, Slot::Small, false)),
                (Some(b), _) => Some((b, Slot::Big, false)),
                (None, Some(s)) => Some((s, Slot::Small, false)),
                (None, None) => None,
            }
        };

        let output = match pick {
            Some((mut detection, slot, locked)) => {
                if self.config.return_overlay {
                    let label = OverlayLabel {
                        tag: if locked { slot.as_str() } else { "least-bad" },
                        fill: detection.fill_ratio,
                        bbox_ratio: detection.diagnostics.bbox_ratio,
                        score: detection.score,
                    };
                    detection.overlay = Some(draw_detection(frame, &detection.bbox, &label)?);
                }
                Some(TrackOutput {
                    detection,
                    slot,
                    locked,
                })
            }
            None => None,
        };

        debug!(frame_w, frame_h, published = output.is_some(), "tracker frame done");
        self.last_output = output.clone();
        Ok(output)
    }

    /// Search one slot, globally or inside its ROI, and fold the outcome
    /// into its state
    fn step(
        entry: &mut SlotEntry<D>,
        slot: Slot,
        frame: &Mat,
        config: &TrackerConfig,
    ) -> Result<Option<DetectionResult>> {
        let (frame_w, frame_h) = (frame.cols(), frame.rows());
        // The window was taken on an earlier frame, which may have been larger
        let window = entry.state.search_roi(config).map(|roi| roi.clamp_to(frame_w, frame_h));
        let detection = match window {
            Some(roi) if !roi.is_empty() => entry.detector.detect_in(frame, roi)?,
            Some(roi) => {
                debug!(%slot, ?roi, frame_w, frame_h, "search window outside frame, searching globally");
                entry.detector.detect(frame)?
            }
            None => entry.detector.detect(frame)?,
        };

        let observed = detection.as_ref().map(|d| (d.bbox, d.score));
        match entry.state.observe(observed, config, frame_w, frame_h) {
            Transition::Locked => info!(%slot, ema = entry.state.score_ema, "lock acquired"),
            Transition::Released => info!(%slot, ema = entry.state.score_ema, "lock released"),
            Transition::Lost => info!(
                %slot,
                misses = entry.state.miss_count,
                "lock lost after consecutive misses, back to global search"
            ),
            Transition::Unchanged => {}
        }
        Ok(detection)
    }

    /// Swap a slot's profile between frames; its tracking state is kept
    pub fn replace_profile(&mut self, slot: Slot, profile: ProcessingProfile) -> Result<()> {
        self.entry_mut(slot).detector.replace_profile(profile)?;
        info!(%slot, "profile replaced");
        Ok(())
    }

    pub fn replace_config(&mut self, config: TrackerConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        info!("tracker config replaced");
        Ok(())
    }

    /// Forget every lock, ROI and smoothed score
    pub fn reset(&mut self) {
        self.big.state = DetectorState::default();
        self.small.state = DetectorState::default();
        self.last_output = None;
    }

    fn entry(&self, slot: Slot) -> &SlotEntry<D> {
        match slot {
            Slot::Big => &self.big,
            Slot::Small => &self.small,
        }
    }

    fn entry_mut(&mut self, slot: Slot) -> &mut SlotEntry<D> {
        match slot {
            Slot::Big => &mut self.big,
            Slot::Small => &mut self.small,
        }
    }
}
