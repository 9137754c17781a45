//! Contourtrack core data
//!
//! Immutable configuration for the contour detection and tracking engine:
//! processing profiles, tracker knobs and their validation.

pub mod error;
pub mod profile;
pub mod tracking;

pub use error::ConfigError;
pub use profile::{
    CannyConfig, ColorGateConfig, ColorMode, CombineMode, GeoFilters, HsvGate, LabGate,
    MorphConfig, PreMorphConfig, ProcConfig, ProcessingProfile, Weights,
};
pub use tracking::TrackerConfig;

pub type Result<T> = std::result::Result<T, ConfigError>;
