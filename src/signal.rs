//! Downstream consumers of control updates.

use anyhow::Result;
use log::info;

use crate::gestures::ControlUpdate;

/// Receives one scalar per latched channel per frame.
pub trait SignalSink {
    fn push(&mut self, update: ControlUpdate) -> Result<()>;
}

impl SignalSink for Vec<ControlUpdate> {
    fn push(&mut self, update: ControlUpdate) -> Result<()> {
        Vec::push(self, update);
        Ok(())
    }
}

pub struct LogSink {
    enabled: bool,
}

impl LogSink {
    pub fn new() -> Self {
        Self { enabled: true }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, en: bool) {
        self.enabled = en;
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalSink for LogSink {
    fn push(&mut self, update: ControlUpdate) -> Result<()> {
        if self.enabled {
            info!("{} = {:.4}", update.channel, update.value);
        }
        Ok(())
    }
}
