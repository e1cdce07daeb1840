use log::{debug, info};
use std::collections::BTreeMap;

use super::{Color, Level, Lines};
use crate::error::Result;

/// Stand-in for boards without GPIO. Remembers levels and logs each color.
#[derive(Debug, Default)]
pub struct SimulatedLines {
    levels: BTreeMap<u32, Level>,
}

impl SimulatedLines {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Lines for SimulatedLines {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn open_output(&mut self, pin: u32) -> Result<()> {
        debug!("[simulated] Opening line {pin} as output");
        self.levels.insert(pin, Level::High);
        Ok(())
    }

    fn write(&mut self, pin: u32, level: Level) -> Result<()> {
        self.levels.insert(pin, level);
        Ok(())
    }

    fn announce(&mut self, color: Color) {
        info!("[simulated] Setting light to: {color}");
    }

    fn release(&mut self) {
        info!("[simulated] Releasing {} lines", self.levels.len());
        self.levels.clear();
    }
}
