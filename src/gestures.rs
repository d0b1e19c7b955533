//! Pinch latching and continuous control-channel mapping.

use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{ChannelConfig, GestureConfig};
use crate::landmark::HandPose;
use crate::metrics::{TargetSpace, normalized_pinch};
use crate::tracker::TrackId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Volume,
    Tone,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Volume => "volume",
            Channel::Tone => "tone",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlUpdate {
    pub channel: Channel,
    pub value: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandRole {
    Left,
    Right,
}

impl HandRole {
    pub fn track(self) -> TrackId {
        match self {
            HandRole::Left => TrackId::FIRST,
            HandRole::Right => TrackId::SECOND,
        }
    }
}

/// Hysteresis latch: engages below `on`, releases only above `off`.
#[derive(Debug, Clone)]
pub struct PinchLatch {
    on: f32,
    off: f32,
    engaged: bool,
}

impl PinchLatch {
    pub fn new(on: f32, off: f32) -> Self {
        Self {
            on,
            off,
            engaged: false,
        }
    }

    pub fn update(&mut self, normalized_pinch: f32) -> bool {
        if self.engaged {
            if normalized_pinch > self.off {
                self.engaged = false;
            }
        } else if normalized_pinch < self.on {
            self.engaged = true;
        }
        self.engaged
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }
}

pub fn shape(x: f32, exponent: f32) -> f32 {
    x.clamp(0.0, 1.0).powf(exponent)
}

/// Maps a normalized pinch into the channel range and low-passes it.
#[derive(Debug, Clone)]
pub struct ChannelMapper {
    cfg: ChannelConfig,
    value: f32,
}

impl ChannelMapper {
    pub fn new(cfg: ChannelConfig) -> Self {
        let value = cfg.initial.clamp(cfg.min, cfg.max);
        Self { cfg, value }
    }

    pub fn channel(&self) -> Channel {
        self.cfg.channel
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn target(&self, normalized_pinch: f32) -> f32 {
        let c = &self.cfg;
        let width = c.pinch_far - c.pinch_near;
        let mut t = if width > f32::EPSILON {
            1.0 - ((normalized_pinch - c.pinch_near) / width).clamp(0.0, 1.0)
        } else {
            0.0
        };
        if let Some(e) = c.shape_exponent {
            t = shape(t, e);
        }
        c.min + t * (c.max - c.min)
    }

    pub fn apply(&mut self, normalized_pinch: f32) -> f32 {
        let target = self.target(normalized_pinch);
        self.value += self.cfg.alpha * (target - self.value);
        self.value
    }
}

#[derive(Debug, Clone)]
struct HandControl {
    role: HandRole,
    latch: PinchLatch,
    mapper: ChannelMapper,
}

impl HandControl {
    fn update(&mut self, poses: &[HandPose], space: TargetSpace) -> Option<ControlUpdate> {
        let track = self.role.track();
        let pose = poses.iter().find(|p| p.track_id == track)?;
        let pinch = normalized_pinch(&pose.landmarks, space)?;

        let was = self.latch.is_engaged();
        let engaged = self.latch.update(pinch);
        if engaged != was {
            debug!(
                "{:?} hand: {} latch {}",
                self.role,
                self.mapper.channel(),
                if engaged { "engaged" } else { "released" }
            );
        }
        if !engaged {
            return None;
        }

        let value = self.mapper.apply(pinch);
        Some(ControlUpdate {
            channel: self.mapper.channel(),
            value,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GestureMapper {
    left: HandControl,
    right: HandControl,
}

impl GestureMapper {
    pub fn new(cfg: &GestureConfig) -> Self {
        let control = |role, channel: &ChannelConfig| HandControl {
            role,
            latch: PinchLatch::new(cfg.pinch_on, cfg.pinch_off),
            mapper: ChannelMapper::new(channel.clone()),
        };
        Self {
            left: control(HandRole::Left, &cfg.left),
            right: control(HandRole::Right, &cfg.right),
        }
    }

    fn control(&self, role: HandRole) -> &HandControl {
        match role {
            HandRole::Left => &self.left,
            HandRole::Right => &self.right,
        }
    }

    pub fn is_latched(&self, role: HandRole) -> bool {
        self.control(role).latch.is_engaged()
    }

    pub fn value(&self, role: HandRole) -> f32 {
        self.control(role).mapper.value()
    }

    /// One update per latched hand; absent or released hands keep their value.
    pub fn update(&mut self, poses: &[HandPose], space: TargetSpace) -> Vec<ControlUpdate> {
        [
            self.left.update(poses, space),
            self.right.update(poses, space),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
