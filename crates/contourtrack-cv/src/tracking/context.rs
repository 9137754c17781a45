//! Pipeline selection: one tracker per target kind, one active at a time

use super::tracker::{TemporalTracker, TrackOutput};
use crate::detection::ContourDetector;
use crate::traits::FrameDetector;
use crate::Result;
use contourtrack_core::{ProcessingProfile, TrackerConfig};
use opencv::core::Mat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    #[default]
    Object,
    /// Skin-tone gated contours
    Face,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineKind::Object => f.write_str("object"),
            PipelineKind::Face => f.write_str("face"),
        }
    }
}

impl FromStr for PipelineKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "object" => Ok(PipelineKind::Object),
            "face" => Ok(PipelineKind::Face),
            other => Err(format!("unknown pipeline '{other}' (expected object or face)")),
        }
    }
}

/// Owns the trackers of every pipeline and routes frames to the active one.
///
/// Contexts share nothing with each other.
pub struct VisionContext<D: FrameDetector = ContourDetector> {
    object: TemporalTracker<D>,
    face: TemporalTracker<D>,
    active: PipelineKind,
}

impl VisionContext<ContourDetector> {
    /// Built-in profiles for both pipelines under one tracker config
    pub fn with_defaults(config: TrackerConfig) -> Result<Self> {
        let object = TemporalTracker::new(ProcessingProfile::big(), ProcessingProfile::small(), config.clone())?;
        let face = TemporalTracker::new(ProcessingProfile::face_big(), ProcessingProfile::face_small(), config)?;
        Ok(Self::new(object, face))
    }
}

impl<D: FrameDetector> VisionContext<D> {
    pub fn new(object: TemporalTracker<D>, face: TemporalTracker<D>) -> Self {
        Self {
            object,
            face,
            active: PipelineKind::default(),
        }
    }

    pub fn active_kind(&self) -> PipelineKind {
        self.active
    }

    /// Switch pipelines. The newly selected tracker starts from a clean state.
    pub fn select(&mut self, kind: PipelineKind) {
        if kind == self.active {
            return;
        }
        info!(from = %self.active, to = %kind, "pipeline switched");
        self.active = kind;
        self.tracker_mut(kind).reset();
    }

    /// Run the active pipeline on one frame
    pub fn process(&mut self, frame: &Mat) -> Result<Option<TrackOutput>> {
        self.tracker_mut(self.active).update(frame)
    }

    pub fn tracker(&self, kind: PipelineKind) -> &TemporalTracker<D> {
        match kind {
            PipelineKind::Object => &self.object,
            PipelineKind::Face => &self.face,
        }
    }

    pub fn tracker_mut(&mut self, kind: PipelineKind) -> &mut TemporalTracker<D> {
        match kind {
            PipelineKind::Object => &mut self.object,
            PipelineKind::Face => &mut self.face,
        }
    }
}
