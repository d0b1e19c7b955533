//! JSON-lines frame source and report writer.
//!
//! One frame per line:
//! `{"t": 0.033, "width": 640, "height": 480, "hands": [{"wrist": {"x": 0.5, "y": 0.5, "confidence": 0.9}}]}`
//! `width`/`height` fall back to the caller's default target space. Blank lines
//! and lines starting with `#` are skipped.

use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::gestures::ControlUpdate;
use crate::landmark::{HandPose, RawObservation};
use crate::metrics::TargetSpace;
use crate::pipeline::{ControlPipeline, Frame};
use crate::signal::SignalSink;

const CHANNEL_DEPTH: usize = 64;

#[derive(Debug, Clone, Deserialize)]
pub struct FrameRecord {
    /// Seconds since the start of the stream.
    pub t: f64,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default)]
    pub hands: Vec<RawObservation>,
}

impl FrameRecord {
    pub fn into_frame(self, line: usize, default_space: TargetSpace) -> Result<Frame> {
        let timestamp = Duration::try_from_secs_f64(self.t)
            .map_err(|_| Error::Timestamp { line, value: self.t })?;
        let space = TargetSpace::new(
            self.width.unwrap_or(default_space.width),
            self.height.unwrap_or(default_space.height),
        );
        Ok(Frame {
            timestamp,
            observations: self.hands,
            space,
        })
    }
}

/// Parses one line; `Ok(None)` for blank and comment lines.
pub fn parse_line(text: &str, line: usize, default_space: TargetSpace) -> Result<Option<Frame>> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let record: FrameRecord =
        serde_json::from_str(trimmed).map_err(|source| Error::Frame { line, source })?;
    record.into_frame(line, default_space).map(Some)
}

/// Reads frames on a background thread and hands them over in arrival order.
/// The stream ends after the first error.
pub fn spawn_reader<R>(
    reader: R,
    default_space: TargetSpace,
) -> (Receiver<Result<Frame>>, JoinHandle<()>)
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(CHANNEL_DEPTH);
    let handle = thread::spawn(move || {
        for (i, line) in reader.lines().enumerate() {
            let line_no = i + 1;
            let item = match line {
                Ok(text) => match parse_line(&text, line_no, default_space) {
                    Ok(Some(frame)) => Ok(frame),
                    Ok(None) => continue,
                    Err(e) => Err(e),
                },
                Err(e) => Err(Error::Io(e)),
            };
            let failed = item.is_err();
            if tx.send(item).is_err() || failed {
                break;
            }
        }
        debug!("replay reader finished");
    });
    (rx, handle)
}

#[derive(Debug, Serialize)]
pub struct FrameReport<'a> {
    pub t: f64,
    pub hands: &'a [HandPose],
    pub updates: &'a [ControlUpdate],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub frames: u64,
    pub updates: u64,
}

/// Runs every frame from `rx` through `pipeline`, writing one report line each.
pub fn run<S, W>(
    rx: Receiver<Result<Frame>>,
    pipeline: &mut ControlPipeline<S>,
    out: &mut W,
) -> anyhow::Result<ReplaySummary>
where
    S: SignalSink,
    W: Write,
{
    let mut summary = ReplaySummary::default();
    for item in rx {
        let frame = match item {
            Ok(frame) => frame,
            Err(e) => {
                error!("replay aborted: {e}");
                return Err(e.into());
            }
        };
        let output = pipeline.process_frame(&frame);
        summary.frames += 1;
        summary.updates += output.updates.len() as u64;

        let report = FrameReport {
            t: frame.timestamp.as_secs_f64(),
            hands: &output.hands,
            updates: &output.updates,
        };
        serde_json::to_writer(&mut *out, &report)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(summary)
}
