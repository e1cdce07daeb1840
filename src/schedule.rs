use chrono::{Datelike, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{BuildLightError, Result};

/// Window of the week during which the pipeline is monitored.
///
/// An empty `days_of_week` leaves monitoring unrestricted. Otherwise the
/// hour range is half-open, `[start_hour, end_hour)`, unless
/// `end_hour_inclusive` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BusinessHours {
    #[serde(default = "default_start_hour")]
    pub start_hour: u32,

    #[serde(default = "default_end_hour")]
    pub end_hour: u32,

    /// Weekday names, e.g. "Monday" or "mon"; matched case-insensitively
    #[serde(default)]
    pub days_of_week: Vec<String>,

    #[serde(default)]
    pub end_hour_inclusive: bool,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start_hour: default_start_hour(),
            end_hour: default_end_hour(),
            days_of_week: Vec::new(),
            end_hour_inclusive: false,
        }
    }
}

fn default_start_hour() -> u32 {
    7
}

fn default_end_hour() -> u32 {
    18
}

impl BusinessHours {
    /// Business hours on weekdays, 07:00 to 18:00.
    pub fn weekdays() -> Self {
        Self {
            days_of_week: ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            ..Self::default()
        }
    }

    /// Returns true when `now` falls inside the window.
    pub fn is_open<T: Datelike + Timelike>(&self, now: &T) -> bool {
        if self.days_of_week.is_empty() {
            return true;
        }

        let today = now.weekday();
        if !self.days().any(|day| day == today) {
            return false;
        }

        let hour = now.hour();
        let before_end = if self.end_hour_inclusive {
            hour <= self.end_hour
        } else {
            hour < self.end_hour
        };

        self.start_hour <= hour && before_end
    }

    pub fn validate(&self) -> Result<()> {
        for (name, hour) in [("start-hour", self.start_hour), ("end-hour", self.end_hour)] {
            if hour > 23 {
                return Err(BuildLightError::Config(format!(
                    "business-hours.{name} must be between 0 and 23, got {hour}"
                )));
            }
        }

        if let Some(bad) = self
            .days_of_week
            .iter()
            .find(|day| day.trim().parse::<Weekday>().is_err())
        {
            return Err(BuildLightError::Config(format!(
                "business-hours.days-of-week contains an unknown weekday: '{bad}'"
            )));
        }

        Ok(())
    }

    fn days(&self) -> impl Iterator<Item = Weekday> + '_ {
        self.days_of_week
            .iter()
            .filter_map(|day| day.trim().parse::<Weekday>().ok())
    }
}
