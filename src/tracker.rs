//! Fixed two-slot track registry and per-track joint memories.

use log::debug;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::landmark::{JOINT_COUNT, JointId, Point2D};

pub const TRACK_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TrackId(u8);

impl TrackId {
    pub const FIRST: TrackId = TrackId(0);
    pub const SECOND: TrackId = TrackId(1);
    pub const ALL: [TrackId; TRACK_COUNT] = [TrackId::FIRST, TrackId::SECOND];

    pub fn new(id: u8) -> Option<Self> {
        (usize::from(id) < TRACK_COUNT).then_some(TrackId(id))
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    pub fn other(self) -> TrackId {
        TrackId(1 - self.0)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compact descriptor used to compare a detection against a track.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Signature {
    pub wrist: Point2D,
    /// Mean of confident metacarpals, or the wrist.
    pub palm: Point2D,
    /// Index MCP minus wrist, zero when unavailable.
    pub dir: Point2D,
}

#[derive(Debug, Clone, Default)]
pub struct TrackState {
    pub active: bool,
    pub last_wrist: Point2D,
    pub last_palm: Point2D,
    pub last_dir: Point2D,
    pub last_seen: Duration,
}

impl TrackState {
    pub fn signature(&self) -> Signature {
        Signature {
            wrist: self.last_wrist,
            palm: self.last_palm,
            dir: self.last_dir,
        }
    }
}

/// Joint id → position memory, one entry per joint.
#[derive(Debug, Clone, Default)]
pub struct JointMemory {
    slots: [Option<Point2D>; JOINT_COUNT],
}

impl JointMemory {
    pub fn get(&self, id: JointId) -> Option<Point2D> {
        self.slots[id.index()]
    }

    pub fn insert(&mut self, id: JointId, p: Point2D) {
        self.slots[id.index()] = Some(p);
    }

    pub fn clear(&mut self) {
        self.slots = [None; JOINT_COUNT];
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrackSlot {
    pub state: TrackState,
    pub smoothed: JointMemory,
    /// Last confident position per joint, for hold and clamp.
    pub last_good: JointMemory,
}

#[derive(Debug, Default)]
pub struct TrackStore {
    slots: [TrackSlot; TRACK_COUNT],
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: TrackId) -> &TrackState {
        &self.slots[id.index()].state
    }

    pub fn slot(&self, id: TrackId) -> &TrackSlot {
        &self.slots[id.index()]
    }

    pub fn slot_mut(&mut self, id: TrackId) -> &mut TrackSlot {
        &mut self.slots[id.index()]
    }

    pub fn is_active(&self, id: TrackId) -> bool {
        self.get(id).active
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.state.active).count()
    }

    pub fn mark_active(&mut self, id: TrackId, sig: Signature, now: Duration) {
        let s = &mut self.slots[id.index()].state;
        if !s.active {
            debug!("track {id}: activated");
        }
        *s = TrackState {
            active: true,
            last_wrist: sig.wrist,
            last_palm: sig.palm,
            last_dir: sig.dir,
            last_seen: now,
        };
    }

    /// Deactivates tracks unseen for longer than `timeout` and wipes their memories.
    /// Returns how many tracks expired.
    pub fn expire_stale(&mut self, now: Duration, timeout: Duration) -> usize {
        let mut expired = 0;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if !slot.state.active {
                continue;
            }
            if now.saturating_sub(slot.state.last_seen) > timeout {
                slot.state.active = false;
                slot.smoothed.clear();
                slot.last_good.clear();
                expired += 1;
                debug!("track {i}: expired after {:?}", now - slot.state.last_seen);
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(x: f32, y: f32) -> Signature {
        Signature {
            wrist: Point2D::new(x, y),
            palm: Point2D::new(x, y + 0.1),
            dir: Point2D::new(0.0, 0.1),
        }
    }

    #[test]
    fn track_ids_are_fixed_labels() {
        assert_eq!(TrackId::new(0), Some(TrackId::FIRST));
        assert_eq!(TrackId::new(1), Some(TrackId::SECOND));
        assert_eq!(TrackId::new(2), None);
        assert_eq!(TrackId::FIRST.other(), TrackId::SECOND);
        assert_eq!(TrackId::SECOND.other(), TrackId::FIRST);
    }

    #[test]
    fn mark_active_records_signature() {
        let mut store = TrackStore::new();
        assert_eq!(store.active_count(), 0);

        store.mark_active(TrackId::SECOND, sig(0.2, 0.3), Duration::from_millis(100));
        let st = store.get(TrackId::SECOND);
        assert!(st.active);
        assert_eq!(st.signature(), sig(0.2, 0.3));
        assert_eq!(st.last_seen, Duration::from_millis(100));
        assert!(!store.is_active(TrackId::FIRST));
    }

    #[test]
    fn expiry_clears_both_memories() {
        let mut store = TrackStore::new();
        store.mark_active(TrackId::FIRST, sig(0.5, 0.5), Duration::ZERO);
        store
            .slot_mut(TrackId::FIRST)
            .smoothed
            .insert(JointId::Wrist, Point2D::new(0.5, 0.5));
        store
            .slot_mut(TrackId::FIRST)
            .last_good
            .insert(JointId::MiddlePip, Point2D::new(0.5, 0.6));

        let timeout = Duration::from_millis(800);

        // exactly at the timeout is still alive
        assert_eq!(store.expire_stale(Duration::from_millis(800), timeout), 0);
        assert!(store.is_active(TrackId::FIRST));

        assert_eq!(store.expire_stale(Duration::from_millis(801), timeout), 1);
        let slot = store.slot(TrackId::FIRST);
        assert!(!slot.state.active);
        assert!(slot.smoothed.is_empty());
        assert!(slot.last_good.is_empty());
    }

    #[test]
    fn expiry_ignores_clock_going_backwards() {
        let mut store = TrackStore::new();
        store.mark_active(TrackId::FIRST, sig(0.5, 0.5), Duration::from_secs(5));
        assert_eq!(
            store.expire_stale(Duration::from_secs(1), Duration::from_millis(800)),
            0
        );
        assert!(store.is_active(TrackId::FIRST));
    }
}
