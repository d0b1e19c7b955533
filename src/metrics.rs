//! Derived pose metrics in the target (render / control) coordinate space.

use serde::{Deserialize, Serialize};

use crate::landmark::{JointId, Landmark, Point2D};

/// Target rectangle; normalized y = 0 maps to the bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSpace {
    pub width: f32,
    pub height: f32,
}

impl TargetSpace {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn project(&self, p: Point2D) -> Point2D {
        Point2D::new(p.x * self.width, (1.0 - p.y) * self.height)
    }
}

fn find(landmarks: &[Landmark], id: JointId) -> Option<Point2D> {
    landmarks.iter().find(|lm| lm.id == id).map(|lm| lm.position)
}

pub fn joint_distance(
    landmarks: &[Landmark],
    a: JointId,
    b: JointId,
    space: TargetSpace,
) -> Option<f32> {
    let pa = space.project(find(landmarks, a)?);
    let pb = space.project(find(landmarks, b)?);
    Some(pa.distance(pb))
}

pub fn pinch_distance(landmarks: &[Landmark], space: TargetSpace) -> f32 {
    joint_distance(landmarks, JointId::ThumbTip, JointId::IndexTip, space).unwrap_or(0.0)
}

pub fn span_distance(landmarks: &[Landmark], space: TargetSpace) -> f32 {
    joint_distance(landmarks, JointId::IndexTip, JointId::LittleTip, space).unwrap_or(0.0)
}

/// Pinch distance as a fraction of the target width.
///
/// `None` when either fingertip is missing or the width is degenerate, so a lost
/// fingertip never reads as a closed pinch.
pub fn normalized_pinch(landmarks: &[Landmark], space: TargetSpace) -> Option<f32> {
    if space.width <= 0.0 || !space.width.is_finite() {
        return None;
    }
    joint_distance(landmarks, JointId::ThumbTip, JointId::IndexTip, space)
        .map(|d| d / space.width)
}

pub fn average_confidence(landmarks: &[Landmark]) -> f32 {
    if landmarks.is_empty() {
        return 0.0;
    }
    landmarks.iter().map(|lm| lm.confidence).sum::<f32>() / landmarks.len() as f32
}
