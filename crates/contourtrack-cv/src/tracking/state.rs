//! Per-slot tracking state: smoothed score, lock latch, misses and ROI

use crate::bbox::BBox;
use contourtrack_core::TrackerConfig;
use serde::Serialize;

/// Lock change caused by one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Locked,
    /// Smoothed score fell below the release threshold
    Released,
    /// Too many consecutive misses
    Lost,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectorState {
    pub last_bbox: Option<BBox>,
    pub score_ema: f64,
    /// Hysteresis latch
    pub active: bool,
    pub miss_count: u32,
    /// Search window derived from the last detection
    pub roi: Option<BBox>,
}

impl DetectorState {
    /// Region the next search should be restricted to, if any
    pub fn search_roi(&self, config: &TrackerConfig) -> Option<BBox> {
        if !(self.active && config.use_roi) {
            return None;
        }
        self.roi.filter(|roi| !roi.is_empty())
    }

    /// Fold one frame's outcome into the state.
    ///
    /// `detection` is the box (full-frame pixels) and score of this frame's
    /// result. Order: moving average, then hysteresis, then miss handling.
    pub fn observe(
        &mut self,
        detection: Option<(BBox, f64)>,
        config: &TrackerConfig,
        frame_w: i32,
        frame_h: i32,
    ) -> Transition {
        let was_active = self.active;
        let score = detection.map_or(0.0, |(_, score)| score);
        self.score_ema = config.alpha * score + (1.0 - config.alpha) * self.score_ema;

        if self.score_ema >= config.on_th {
            self.active = true;
        } else if self.active && self.score_ema < config.off_th {
            self.active = false;
        }

        match detection {
            Some((bbox, _)) => {
                self.miss_count = 0;
                self.last_bbox = Some(bbox);
                self.roi = Some(bbox.expand(config.roi_factor, frame_w, frame_h));
            }
            None => {
                self.miss_count = self.miss_count.saturating_add(1);
                if self.miss_count >= config.miss_m {
                    self.roi = None;
                    if self.active {
                        self.active = false;
                        return Transition::Lost;
                    }
                }
            }
        }

        match (was_active, self.active) {
            (false, true) => Transition::Locked,
            (true, false) => Transition::Released,
            _ => Transition::Unchanged,
        }
    }
}
