//! Per-frame orchestration: assignment → smoothing → stabilization → metrics,
//! then gesture mapping and signal delivery.

use log::{error, trace};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::assign::{Assigner, collect_detections};
use crate::config::{Profile, SmoothingConfig, StabilizerConfig, TrackingConfig};
use crate::gestures::{ControlUpdate, GestureMapper};
use crate::landmark::{HandPose, RawObservation};
use crate::metrics::{TargetSpace, average_confidence, pinch_distance, span_distance};
use crate::signal::SignalSink;
use crate::smoothing::smooth;
use crate::stabilizer::stabilize;
use crate::tracker::TrackStore;

#[derive(Debug, Clone)]
pub struct Frame {
    pub timestamp: Duration,
    pub observations: Vec<RawObservation>,
    pub space: TargetSpace,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames: u64,
    pub observations: u64,
    pub detections: u64,
}

#[derive(Debug)]
pub struct HandTracker {
    tracking: TrackingConfig,
    smoothing: SmoothingConfig,
    stabilizer: StabilizerConfig,
    store: TrackStore,
    stats: FrameStats,
}

impl HandTracker {
    pub fn new(profile: &Profile) -> Self {
        Self {
            tracking: profile.tracking.clone(),
            smoothing: profile.smoothing.clone(),
            stabilizer: profile.stabilizer.clone(),
            store: TrackStore::new(),
            stats: FrameStats::default(),
        }
    }

    pub fn store(&self) -> &TrackStore {
        &self.store
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Processes one frame. Poses come back sorted by track id.
    pub fn process(
        &mut self,
        observations: &[RawObservation],
        now: Duration,
        space: TargetSpace,
    ) -> Vec<HandPose> {
        self.stats.frames += 1;
        self.stats.observations += observations.len() as u64;

        self.store.expire_stale(now, self.tracking.timeout());

        let detections = collect_detections(observations, &self.tracking);
        self.stats.detections += detections.len() as u64;
        if detections.is_empty() {
            return Vec::new();
        }

        let assignments = Assigner::new(&self.store, &self.tracking).assign(&detections);
        if let [a, b] = assignments.as_slice() {
            if a.track == b.track {
                trace!(
                    "frame {}: both detections routed to track {}",
                    self.stats.frames, a.track
                );
            }
        }

        let mut poses = Vec::with_capacity(assignments.len());
        for a in assignments {
            let det = &detections[a.detection];
            self.store.mark_active(a.track, det.signature, now);

            let slot = self.store.slot_mut(a.track);
            let raw = det
                .observation
                .landmarks(self.tracking.min_landmark_confidence);
            let mut landmarks = smooth(raw, &mut slot.smoothed, &self.smoothing);
            for finger in &self.stabilizer.fingers {
                landmarks = stabilize(
                    landmarks,
                    finger.chain(),
                    &mut slot.last_good,
                    &self.stabilizer,
                );
            }

            poses.push(HandPose {
                track_id: a.track,
                avg_confidence: average_confidence(&landmarks),
                pinch_distance: pinch_distance(&landmarks, space),
                span_distance: span_distance(&landmarks, space),
                landmarks,
            });
        }

        poses.sort_by_key(|p| p.track_id);
        trace!(
            "frame {}: {} pose(s), {} active track(s)",
            self.stats.frames,
            poses.len(),
            self.store.active_count()
        );
        poses
    }
}

#[derive(Debug, Clone, Default)]
pub struct PoseSnapshot {
    pub frame: u64,
    pub timestamp: Duration,
    pub hands: Vec<HandPose>,
    pub tracking_ok: bool,
}

/// Latest published pose set, shareable across threads.
///
/// Snapshots are swapped whole under the lock, so readers never see a
/// partially built frame.
#[derive(Debug, Clone, Default)]
pub struct PoseFeed {
    inner: Arc<Mutex<PoseSnapshot>>,
}

impl PoseFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: PoseSnapshot) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = snapshot;
    }

    pub fn latest(&self) -> PoseSnapshot {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameOutput {
    pub hands: Vec<HandPose>,
    pub updates: Vec<ControlUpdate>,
}

pub struct ControlPipeline<S: SignalSink> {
    tracker: HandTracker,
    mapper: GestureMapper,
    sink: S,
    feed: PoseFeed,
}

impl<S: SignalSink> ControlPipeline<S> {
    pub fn new(profile: &Profile, sink: S) -> Self {
        Self {
            tracker: HandTracker::new(profile),
            mapper: GestureMapper::new(&profile.gestures),
            sink,
            feed: PoseFeed::new(),
        }
    }

    pub fn tracker(&self) -> &HandTracker {
        &self.tracker
    }

    pub fn mapper(&self) -> &GestureMapper {
        &self.mapper
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn feed(&self) -> PoseFeed {
        self.feed.clone()
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn process_frame(&mut self, frame: &Frame) -> FrameOutput {
        let hands = self
            .tracker
            .process(&frame.observations, frame.timestamp, frame.space);

        self.feed.publish(PoseSnapshot {
            frame: self.tracker.stats().frames,
            timestamp: frame.timestamp,
            hands: hands.clone(),
            tracking_ok: !hands.is_empty(),
        });

        let updates = self.mapper.update(&hands, frame.space);
        for u in &updates {
            if let Err(e) = self.sink.push(*u) {
                error!("signal push failed for {}: {e}", u.channel);
            }
        }

        FrameOutput { hands, updates }
    }
}
