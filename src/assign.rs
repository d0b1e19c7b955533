//! Detection-to-track assignment for at most two hands.
//!
//! Cardinality is fixed at two, so the optimal matching is found by comparing
//! the only two permutations directly.

use log::trace;

use crate::config::TrackingConfig;
use crate::landmark::{JointId, Point2D, RawObservation};
use crate::tracker::{Signature, TRACK_COUNT, TrackId, TrackStore};

const WRIST_WEIGHT: f32 = 0.55;
const PALM_WEIGHT: f32 = 0.30;
const DIR_WEIGHT: f32 = 0.15;

/// Derives the assignment signature, or `None` when the wrist is too weak.
pub fn signature(obs: &RawObservation, min_confidence: f32) -> Option<Signature> {
    let wrist = obs.confident(JointId::Wrist, min_confidence)?.position();

    let mut sum = Point2D::ZERO;
    let mut count = 0usize;
    for id in JointId::METACARPALS {
        if let Some(j) = obs.confident(id, min_confidence) {
            sum = sum + j.position();
            count += 1;
        }
    }
    let palm = if count > 0 {
        sum * (1.0 / count as f32)
    } else {
        wrist
    };

    let dir = obs
        .confident(JointId::IndexMcp, min_confidence)
        .map_or(Point2D::ZERO, |index| index.position() - wrist);

    Some(Signature { wrist, palm, dir })
}

#[derive(Debug, Clone, Copy)]
pub struct Detection<'a> {
    pub observation: &'a RawObservation,
    pub signature: Signature,
}

/// Keeps the first two observations and drops those without a usable wrist.
pub fn collect_detections<'a>(
    observations: &'a [RawObservation],
    cfg: &TrackingConfig,
) -> Vec<Detection<'a>> {
    observations
        .iter()
        .take(TRACK_COUNT)
        .filter_map(|observation| {
            let sig = signature(observation, cfg.min_signature_confidence);
            if sig.is_none() {
                trace!("discarding detection without a confident wrist");
            }
            sig.map(|signature| Detection {
                observation,
                signature,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assignment {
    pub track: TrackId,
    pub detection: usize,
}

pub struct Assigner<'a> {
    tracks: &'a TrackStore,
    cfg: &'a TrackingConfig,
}

impl<'a> Assigner<'a> {
    pub fn new(tracks: &'a TrackStore, cfg: &'a TrackingConfig) -> Self {
        Self { tracks, cfg }
    }

    pub fn cost(&self, track: TrackId, sig: &Signature) -> f32 {
        let st = self.tracks.get(track);
        if !st.active {
            return self.cfg.inactive_cost;
        }
        WRIST_WEIGHT * st.last_wrist.distance(sig.wrist)
            + PALM_WEIGHT * st.last_palm.distance(sig.palm)
            + DIR_WEIGHT * st.last_dir.distance(sig.dir)
    }

    /// Lower-cost track; ties go to the first track.
    pub fn cheapest_track(&self, sig: &Signature) -> TrackId {
        let c0 = self.cost(TrackId::FIRST, sig);
        let c1 = self.cost(TrackId::SECOND, sig);
        if c0 <= c1 {
            TrackId::FIRST
        } else {
            TrackId::SECOND
        }
    }

    /// Single-detection fallback that respects which tracks are active.
    pub fn best_track(&self, sig: &Signature) -> TrackId {
        let a0 = self.tracks.is_active(TrackId::FIRST);
        let a1 = self.tracks.is_active(TrackId::SECOND);
        match (a0, a1) {
            (true, true) => self.cheapest_track(sig),
            (true, false) => self.accept_or_route(TrackId::FIRST, sig),
            (false, true) => self.accept_or_route(TrackId::SECOND, sig),
            (false, false) => TrackId::FIRST,
        }
    }

    fn accept_or_route(&self, active: TrackId, sig: &Signature) -> TrackId {
        if self.cost(active, sig) <= self.cfg.max_match_distance {
            active
        } else {
            active.other()
        }
    }

    pub fn assign(&self, dets: &[Detection<'_>]) -> Vec<Assignment> {
        let pairs: Vec<Assignment> = match dets {
            [] => return Vec::new(),
            [d0] => {
                let track = if self.cfg.gate_single_detection {
                    self.best_track(&d0.signature)
                } else {
                    self.cheapest_track(&d0.signature)
                };
                vec![Assignment {
                    track,
                    detection: 0,
                }]
            }
            [d0, d1, ..] => {
                let (t0, t1) = (TrackId::FIRST, TrackId::SECOND);
                let identity = self.cost(t0, &d0.signature) + self.cost(t1, &d1.signature);
                let swapped = self.cost(t1, &d0.signature) + self.cost(t0, &d1.signature);
                trace!("assignment costs: identity={identity:.4} swapped={swapped:.4}");
                if identity <= swapped {
                    vec![
                        Assignment {
                            track: t0,
                            detection: 0,
                        },
                        Assignment {
                            track: t1,
                            detection: 1,
                        },
                    ]
                } else {
                    vec![
                        Assignment {
                            track: t1,
                            detection: 0,
                        },
                        Assignment {
                            track: t0,
                            detection: 1,
                        },
                    ]
                }
            }
        };

        let limit = 3.0 * self.cfg.max_match_distance;
        pairs
            .into_iter()
            .map(|a| {
                let sig = &dets[a.detection].signature;
                if self.cost(a.track, sig) > limit {
                    let track = self.best_track(sig);
                    trace!(
                        "detection {} too far from track {}, rerouted to {track}",
                        a.detection, a.track
                    );
                    Assignment { track, ..a }
                } else {
                    a
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::RawJoint;
    use std::time::Duration;

    fn hand_at(x: f32, y: f32) -> RawObservation {
        RawObservation::new()
            .with(JointId::Wrist, RawJoint::new(x, y, 0.9))
            .with(JointId::IndexMcp, RawJoint::new(x + 0.02, y + 0.10, 0.9))
            .with(JointId::MiddleMcp, RawJoint::new(x, y + 0.11, 0.9))
            .with(JointId::RingMcp, RawJoint::new(x - 0.02, y + 0.10, 0.9))
            .with(JointId::LittleMcp, RawJoint::new(x - 0.04, y + 0.08, 0.9))
    }

    fn sig_at(x: f32, y: f32) -> Signature {
        signature(&hand_at(x, y), 0.10).unwrap()
    }

    #[test]
    fn signature_averages_confident_metacarpals() {
        let obs = RawObservation::new()
            .with(JointId::Wrist, RawJoint::new(0.5, 0.5, 0.9))
            .with(JointId::IndexMcp, RawJoint::new(0.6, 0.7, 0.9))
            .with(JointId::LittleMcp, RawJoint::new(0.4, 0.7, 0.9))
            .with(JointId::RingMcp, RawJoint::new(0.0, 0.0, 0.05));
        let sig = signature(&obs, 0.10).unwrap();
        assert_eq!(sig.wrist, Point2D::new(0.5, 0.5));
        assert!((sig.palm.x - 0.5).abs() < 1e-6);
        assert!((sig.palm.y - 0.7).abs() < 1e-6);
        assert!((sig.dir.x - 0.1).abs() < 1e-6);
        assert!((sig.dir.y - 0.2).abs() < 1e-6);
    }

    #[test]
    fn signature_falls_back_to_wrist() {
        let obs = RawObservation::new().with(JointId::Wrist, RawJoint::new(0.3, 0.4, 0.5));
        let sig = signature(&obs, 0.10).unwrap();
        assert_eq!(sig.palm, sig.wrist);
        assert_eq!(sig.dir, Point2D::ZERO);
    }

    #[test]
    fn weak_wrist_has_no_signature() {
        let obs = RawObservation::new().with(JointId::Wrist, RawJoint::new(0.3, 0.4, 0.09));
        assert!(signature(&obs, 0.10).is_none());
        assert!(signature(&RawObservation::new(), 0.10).is_none());
    }

    #[test]
    fn only_first_two_observations_participate() {
        let cfg = TrackingConfig::default();
        let weak = RawObservation::new().with(JointId::Wrist, RawJoint::new(0.1, 0.1, 0.01));
        let obs = vec![hand_at(0.2, 0.2), weak, hand_at(0.8, 0.2)];
        let dets = collect_detections(&obs, &cfg);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].signature.wrist, Point2D::new(0.2, 0.2));
    }

    #[test]
    fn lone_detection_defaults_to_first_track() {
        let store = TrackStore::new();
        let cfg = TrackingConfig::default();
        let obs = [hand_at(0.7, 0.7)];
        let dets = collect_detections(&obs, &cfg);
        let out = Assigner::new(&store, &cfg).assign(&dets);
        assert_eq!(
            out,
            vec![Assignment {
                track: TrackId::FIRST,
                detection: 0
            }]
        );
    }

    #[test]
    fn lone_detection_takes_lower_cost_track() {
        let mut store = TrackStore::new();
        let cfg = TrackingConfig::default();
        store.mark_active(TrackId::FIRST, sig_at(0.2, 0.2), Duration::ZERO);
        store.mark_active(TrackId::SECOND, sig_at(0.8, 0.2), Duration::ZERO);

        let obs = [hand_at(0.78, 0.22)];
        let dets = collect_detections(&obs, &cfg);
        let assigner = Assigner::new(&store, &cfg);
        let out = assigner.assign(&dets);
        assert_eq!(out[0].track, TrackId::SECOND);

        let sig = dets[0].signature;
        assert!(assigner.cost(TrackId::SECOND, &sig) < assigner.cost(TrackId::FIRST, &sig));
    }

    #[test]
    fn lone_detection_prefers_empty_slot_over_distant_track() {
        let mut store = TrackStore::new();
        let cfg = TrackingConfig::default();
        store.mark_active(TrackId::FIRST, sig_at(0.2, 0.2), Duration::ZERO);

        let obs = [hand_at(0.5, 0.2)];
        let dets = collect_detections(&obs, &cfg);
        let out = Assigner::new(&store, &cfg).assign(&dets);
        assert_eq!(out[0].track, TrackId::SECOND);
    }

    #[test]
    fn gated_lone_detection_keeps_nearby_active_track() {
        let mut store = TrackStore::new();
        let cfg = TrackingConfig {
            gate_single_detection: true,
            ..TrackingConfig::default()
        };
        store.mark_active(TrackId::FIRST, sig_at(0.2, 0.2), Duration::ZERO);

        // cost ≈ 0.085: above the inactive cost, inside max_match_distance
        let obs = [hand_at(0.3, 0.2)];
        let dets = collect_detections(&obs, &cfg);
        let assigner = Assigner::new(&store, &cfg);
        assert!(assigner.cost(TrackId::FIRST, &dets[0].signature) > cfg.inactive_cost);
        assert_eq!(assigner.assign(&dets)[0].track, TrackId::FIRST);

        // far away: routed to the empty slot
        let obs = [hand_at(0.9, 0.9)];
        let dets = collect_detections(&obs, &cfg);
        assert_eq!(assigner.assign(&dets)[0].track, TrackId::SECOND);
    }

    #[test]
    fn two_detections_pick_cheaper_permutation() {
        let mut store = TrackStore::new();
        let cfg = TrackingConfig::default();
        store.mark_active(TrackId::FIRST, sig_at(0.2, 0.3), Duration::ZERO);
        store.mark_active(TrackId::SECOND, sig_at(0.8, 0.3), Duration::ZERO);

        // listed right hand first
        let obs = [hand_at(0.79, 0.31), hand_at(0.21, 0.29)];
        let dets = collect_detections(&obs, &cfg);
        let assigner = Assigner::new(&store, &cfg);
        let out = assigner.assign(&dets);

        assert_eq!(out[0].track, TrackId::SECOND);
        assert_eq!(out[1].track, TrackId::FIRST);

        let total = |a: &[Assignment]| -> f32 {
            a.iter()
                .map(|p| assigner.cost(p.track, &dets[p.detection].signature))
                .sum()
        };
        let other = [
            Assignment {
                track: TrackId::FIRST,
                detection: 0,
            },
            Assignment {
                track: TrackId::SECOND,
                detection: 1,
            },
        ];
        assert!(total(&out) <= total(&other));
    }

    #[test]
    fn tie_keeps_identity_pairing() {
        let store = TrackStore::new();
        let cfg = TrackingConfig::default();
        let obs = [hand_at(0.8, 0.5), hand_at(0.2, 0.5)];
        let dets = collect_detections(&obs, &cfg);
        let out = Assigner::new(&store, &cfg).assign(&dets);
        assert_eq!(out[0].track, TrackId::FIRST);
        assert_eq!(out[1].track, TrackId::SECOND);
    }

    #[test]
    fn far_pairing_is_rerouted() {
        let mut store = TrackStore::new();
        let cfg = TrackingConfig::default();
        store.mark_active(TrackId::FIRST, sig_at(0.0, 0.0), Duration::ZERO);
        store.mark_active(TrackId::SECOND, sig_at(1.0, 0.0), Duration::ZERO);

        let obs = [hand_at(0.0, 0.0), hand_at(0.1, 0.9)];
        let dets = collect_detections(&obs, &cfg);
        let assigner = Assigner::new(&store, &cfg);

        // identity pairing wins, but puts the second detection > 3 × max_match_distance
        // away from the second track
        let far = dets[1].signature;
        assert!(assigner.cost(TrackId::SECOND, &far) > 3.0 * cfg.max_match_distance);

        let out = assigner.assign(&dets);
        assert_eq!(out[0].track, TrackId::FIRST);
        assert_eq!(out[1].track, TrackId::FIRST);
    }
}
