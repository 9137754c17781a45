//! Temporal tracking across frames

pub mod context;
pub mod state;
pub mod tracker;

pub use context::{PipelineKind, VisionContext};
pub use state::{DetectorState, Transition};
pub use tracker::{Slot, TemporalTracker, TrackOutput};
