//! Confidence-adaptive exponential smoothing, one memory per track.
//!
//! Low-confidence joints move with a smaller gain, so noise is damped hardest
//! exactly where the detector is least sure.

use crate::config::SmoothingConfig;
use crate::landmark::Landmark;
use crate::tracker::JointMemory;

pub fn adaptive_gain(confidence: f32, cfg: &SmoothingConfig) -> f32 {
    (cfg.min_gain + cfg.confidence_gain * confidence)
        .max(cfg.min_gain)
        .min(cfg.max_gain)
}

/// Smooths `landmarks` against `memory` and records every result.
/// A joint without history passes through untouched.
pub fn smooth(
    landmarks: Vec<Landmark>,
    memory: &mut JointMemory,
    cfg: &SmoothingConfig,
) -> Vec<Landmark> {
    landmarks
        .into_iter()
        .map(|lm| {
            let position = match memory.get(lm.id) {
                Some(prev) => {
                    let a = adaptive_gain(lm.confidence, cfg);
                    prev + (lm.position - prev) * a
                }
                None => lm.position,
            };
            memory.insert(lm.id, position);
            Landmark { position, ..lm }
        })
        .collect()
}
