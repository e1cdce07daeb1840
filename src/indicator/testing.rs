//! In-memory line recorder shared by indicator and monitor tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{Color, Level, Lines};
use crate::error::{BuildLightError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Open(u32),
    Write(u32, Level),
    Release,
}

#[derive(Default)]
struct State {
    events: Vec<Event>,
    levels: HashMap<u32, Level>,
    announced: Vec<Color>,
}

/// Records every call; clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingLines {
    state: Arc<Mutex<State>>,
    fail_open: bool,
    fail_write: bool,
}

impl RecordingLines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn failing_write() -> Self {
        Self {
            fail_write: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn levels(&self, pins: &[u32]) -> Vec<Option<Level>> {
        let state = self.state.lock().unwrap();
        pins.iter().map(|pin| state.levels.get(pin).copied()).collect()
    }

    pub fn announced(&self) -> Vec<Color> {
        self.state.lock().unwrap().announced.clone()
    }

    pub fn release_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, Event::Release))
            .count()
    }
}

impl Lines for RecordingLines {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn open_output(&mut self, pin: u32) -> Result<()> {
        if self.fail_open {
            return Err(BuildLightError::HardwareUnavailable(format!(
                "no such line {pin}"
            )));
        }
        self.state.lock().unwrap().events.push(Event::Open(pin));
        Ok(())
    }

    fn write(&mut self, pin: u32, level: Level) -> Result<()> {
        if self.fail_write {
            return Err(BuildLightError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("gpio{pin}/value is read-only"),
            )));
        }
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Write(pin, level));
        state.levels.insert(pin, level);
        Ok(())
    }

    fn announce(&mut self, color: Color) {
        self.state.lock().unwrap().announced.push(color);
    }

    fn release(&mut self) {
        self.state.lock().unwrap().events.push(Event::Release);
    }
}
