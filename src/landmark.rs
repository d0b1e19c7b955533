//! Joint, observation and hand-pose value types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Mul, Sub};

use crate::tracker::TrackId;

pub const JOINT_COUNT: usize = 21;

/// Named hand joints in canonical order (wrist, thumb, index, middle, ring, little).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointId {
    Wrist,
    ThumbCmc,
    ThumbMp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    LittleMcp,
    LittlePip,
    LittleDip,
    LittleTip,
}

impl JointId {
    pub const ALL: [JointId; JOINT_COUNT] = [
        JointId::Wrist,
        JointId::ThumbCmc,
        JointId::ThumbMp,
        JointId::ThumbIp,
        JointId::ThumbTip,
        JointId::IndexMcp,
        JointId::IndexPip,
        JointId::IndexDip,
        JointId::IndexTip,
        JointId::MiddleMcp,
        JointId::MiddlePip,
        JointId::MiddleDip,
        JointId::MiddleTip,
        JointId::RingMcp,
        JointId::RingPip,
        JointId::RingDip,
        JointId::RingTip,
        JointId::LittleMcp,
        JointId::LittlePip,
        JointId::LittleDip,
        JointId::LittleTip,
    ];

    /// Metacarpal joints used as the palm proxy.
    pub const METACARPALS: [JointId; 4] = [
        JointId::IndexMcp,
        JointId::MiddleMcp,
        JointId::RingMcp,
        JointId::LittleMcp,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// The four long fingers, each a MCP → PIP → DIP → tip chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Finger {
    Index,
    Middle,
    Ring,
    Little,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerChain {
    pub mcp: JointId,
    pub pip: JointId,
    pub dip: JointId,
    pub tip: JointId,
}

impl Finger {
    pub fn chain(self) -> FingerChain {
        use JointId::*;
        let (mcp, pip, dip, tip) = match self {
            Finger::Index => (IndexMcp, IndexPip, IndexDip, IndexTip),
            Finger::Middle => (MiddleMcp, MiddlePip, MiddleDip, MiddleTip),
            Finger::Ring => (RingMcp, RingPip, RingDip, RingTip),
            Finger::Little => (LittleMcp, LittlePip, LittleDip, LittleTip),
        };
        FingerChain { mcp, pip, dip, tip }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const ZERO: Point2D = Point2D { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Point2D) -> f32 {
        (self - other).length()
    }

    pub fn lerp(self, other: Point2D, t: f32) -> Point2D {
        self + (other - self) * t
    }
}

impl Add for Point2D {
    type Output = Point2D;
    fn add(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2D {
    type Output = Point2D;
    fn sub(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Point2D {
    type Output = Point2D;
    fn mul(self, s: f32) -> Point2D {
        Point2D::new(self.x * s, self.y * s)
    }
}

/// One joint sample. Equality and hashing go by `id` only.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Landmark {
    pub id: JointId,
    pub position: Point2D,
    pub confidence: f32,
}

impl Landmark {
    pub fn new(id: JointId, position: Point2D, confidence: f32) -> Self {
        Self {
            id,
            position,
            confidence,
        }
    }
}

impl PartialEq for Landmark {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Landmark {}

impl Hash for Landmark {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawJoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

impl RawJoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }
}

/// One raw hand detection: a sparse joint map, iterated in canonical order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawObservation {
    joints: BTreeMap<JointId, RawJoint>,
}

impl RawObservation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: JointId, joint: RawJoint) -> Self {
        self.joints.insert(id, joint);
        self
    }

    pub fn insert(&mut self, id: JointId, joint: RawJoint) {
        self.joints.insert(id, joint);
    }

    pub fn get(&self, id: JointId) -> Option<&RawJoint> {
        self.joints.get(&id)
    }

    /// Joint `id` if present with confidence at or above `min_confidence`.
    pub fn confident(&self, id: JointId, min_confidence: f32) -> Option<&RawJoint> {
        self.get(id).filter(|j| j.confidence >= min_confidence)
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Landmarks with confidence at or above `min_confidence`, in canonical order.
    pub fn landmarks(&self, min_confidence: f32) -> Vec<Landmark> {
        self.joints
            .iter()
            .filter(|(_, j)| j.confidence >= min_confidence)
            .map(|(&id, j)| Landmark::new(id, j.position(), j.confidence))
            .collect()
    }
}

impl FromIterator<(JointId, RawJoint)> for RawObservation {
    fn from_iter<I: IntoIterator<Item = (JointId, RawJoint)>>(iter: I) -> Self {
        Self {
            joints: iter.into_iter().collect(),
        }
    }
}

/// A tracked hand for one frame. Built fresh every frame, never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct HandPose {
    pub track_id: TrackId,
    pub landmarks: Vec<Landmark>,
    pub avg_confidence: f32,
    /// Thumb tip to index tip, target-space pixels.
    pub pinch_distance: f32,
    /// Index tip to little tip, target-space pixels.
    pub span_distance: f32,
}

impl HandPose {
    pub fn landmark(&self, id: JointId) -> Option<&Landmark> {
        self.landmarks.iter().find(|lm| lm.id == id)
    }
}
