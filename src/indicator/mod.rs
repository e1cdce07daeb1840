//! Three-line traffic light (red, yellow, green).
//!
//! Lines are active-low: a line driven low lights its lamp, all lines high
//! means the light is off.

mod probe;
mod simulated;
mod sysfs;

#[cfg(test)]
pub(crate) mod testing;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::IndicatorConfig;
use crate::error::{BuildLightError, Result};
use crate::status::CanonicalStatus;

pub use probe::DriverMode;

use probe::DriverChoice;
use simulated::SimulatedLines;
use sysfs::SysfsLines;

/// Startup sequence, held for one dwell period each. Ends on green.
const SELF_TEST: [Color; 4] = [Color::Off, Color::Red, Color::Yellow, Color::Green];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Off,
    Red,
    Yellow,
    Green,
    /// Red and yellow together
    Orange,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Color::Off => "OFF",
            Color::Red => "RED",
            Color::Yellow => "YELLOW",
            Color::Green => "GREEN",
            Color::Orange => "ORANGE",
        })
    }
}

/// What a canceled run shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanceledColor {
    #[default]
    Red,
    Off,
}

/// Levels of the three lines for one color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineLevels {
    pub red: Level,
    pub yellow: Level,
    pub green: Level,
}

impl Color {
    /// The status-to-color table.
    pub fn for_status(status: CanonicalStatus, canceled: CanceledColor) -> Self {
        match status {
            CanonicalStatus::Succeeded => Color::Green,
            CanonicalStatus::Failed => Color::Red,
            CanonicalStatus::Canceled => match canceled {
                CanceledColor::Red => Color::Red,
                CanceledColor::Off => Color::Off,
            },
            CanonicalStatus::PartiallySucceeded => Color::Orange,
            CanonicalStatus::InProgress => Color::Yellow,
            CanonicalStatus::OffDuty | CanonicalStatus::Unknown => Color::Off,
        }
    }

    pub fn levels(self) -> LineLevels {
        use Level::{High, Low};

        let (red, yellow, green) = match self {
            Color::Off => (High, High, High),
            Color::Red => (Low, High, High),
            Color::Yellow => (High, Low, High),
            Color::Green => (High, High, Low),
            Color::Orange => (Low, Low, High),
        };

        LineLevels { red, yellow, green }
    }
}

/// Pin numbers of the three lamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pins {
    pub red: u32,
    pub yellow: u32,
    pub green: u32,
}

/// Low-level access to digital output lines.
pub trait Lines: Send {
    /// Short name for log messages.
    fn name(&self) -> &'static str;

    fn open_output(&mut self, pin: u32) -> Result<()>;

    fn write(&mut self, pin: u32, level: Level) -> Result<()>;

    /// Called after the lines of `color` have been written.
    fn announce(&mut self, _color: Color) {}

    /// Release every line opened so far.
    fn release(&mut self);
}

/// Drives the traffic light from canonical build statuses.
///
/// Owns its lines for the lifetime of the process. They are released
/// exactly once, either by [`Indicator::dispose`] or on drop.
pub struct Indicator {
    lines: Box<dyn Lines>,
    pins: Pins,
    dwell: Duration,
    canceled: CanceledColor,
    initialized: bool,
    disposed: bool,
    color: Option<Color>,
}

impl Indicator {
    pub fn new(lines: Box<dyn Lines>, pins: Pins, dwell: Duration, canceled: CanceledColor) -> Self {
        Self {
            lines,
            pins,
            dwell,
            canceled,
            initialized: false,
            disposed: false,
            color: None,
        }
    }

    pub fn driver_name(&self) -> &'static str {
        self.lines.name()
    }

    /// Open the three lines and run the self-test sequence.
    ///
    /// # Errors
    ///
    /// `AlreadyInitialized` on a second call, `HardwareUnavailable` when a
    /// line cannot be opened or the self-test cannot drive it.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(BuildLightError::AlreadyInitialized);
        }
        self.initialized = true;

        info!("Initializing {} indicator lines", self.lines.name());

        for pin in [self.pins.red, self.pins.yellow, self.pins.green] {
            self.lines.open_output(pin).map_err(|e| {
                BuildLightError::HardwareUnavailable(format!("cannot open line {pin}: {e}"))
            })?;
        }

        for color in SELF_TEST {
            self.show(color).map_err(|e| {
                BuildLightError::HardwareUnavailable(format!("self-test cannot show {color}: {e}"))
            })?;
            tokio::time::sleep(self.dwell).await;
        }

        Ok(())
    }

    /// Show the color for `status`. Write failures are logged, not returned.
    pub fn set_color(&mut self, status: CanonicalStatus) -> Color {
        let color = Color::for_status(status, self.canceled);
        // Failed lines are logged by show
        let _ = self.show(color);
        color
    }

    /// Drive all three lines, returning the first write error.
    fn show(&mut self, color: Color) -> Result<()> {
        if self.disposed {
            warn!("Ignoring {color} on a disposed indicator");
            return Ok(());
        }

        let levels = color.levels();
        let mut outcome = Ok(());
        for (pin, level) in [
            (self.pins.red, levels.red),
            (self.pins.yellow, levels.yellow),
            (self.pins.green, levels.green),
        ] {
            if let Err(e) = self.lines.write(pin, level) {
                warn!("Failed to drive line {pin} {level:?}: {e}");
                if outcome.is_ok() {
                    outcome = Err(e);
                }
            }
        }

        debug!("Indicator set to {color}");
        self.lines.announce(color);
        self.color = Some(color);
        outcome
    }

    /// Last color shown, if any.
    pub fn color(&self) -> Option<Color> {
        self.color
    }

    /// Release the lines. Later calls do nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.lines.release();
    }
}

impl Drop for Indicator {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Build and initialize the indicator described by `config`.
///
/// The driver is chosen once here. A GPIO driver that fails to initialize
/// is released and replaced by the simulated one.
pub async fn start(config: &IndicatorConfig, force_simulated: bool) -> Indicator {
    let mode = if force_simulated {
        DriverMode::Simulated
    } else {
        config.driver
    };
    let choice = DriverChoice::select(mode, &config.model_path);

    let mut indicator = build(choice, config);
    match indicator.initialize().await {
        Ok(()) => {
            debug!("Self-test finished on {:?}", indicator.color());
            indicator
        }
        Err(e) => {
            warn!("{e}; falling back to simulated indicator");
            indicator.dispose();

            let mut fallback = build(DriverChoice::Simulated, config);
            if let Err(e) = fallback.initialize().await {
                warn!("Simulated indicator failed to initialize: {e}");
            }
            fallback
        }
    }
}

fn build(choice: DriverChoice, config: &IndicatorConfig) -> Indicator {
    let lines: Box<dyn Lines> = match choice {
        DriverChoice::Gpio => Box::new(SysfsLines::new(&config.gpio_root)),
        DriverChoice::Simulated => Box::new(SimulatedLines::new()),
    };

    let dwell = if config.skip_startup_delay {
        Duration::ZERO
    } else {
        choice.self_test_dwell()
    };

    Indicator::new(lines, config.pins(), dwell, config.canceled_color)
}
