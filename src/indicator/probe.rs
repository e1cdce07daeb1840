use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Which indicator driver the configuration asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverMode {
    /// Probe the device model
    #[default]
    Auto,
    Gpio,
    Simulated,
}

/// Indicator driver selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverChoice {
    Gpio,
    Simulated,
}

impl DriverChoice {
    /// Resolve `mode`, reading the device-tree model file for `Auto`.
    pub fn select(mode: DriverMode, model_path: &Path) -> Self {
        match mode {
            DriverMode::Gpio => DriverChoice::Gpio,
            DriverMode::Simulated => DriverChoice::Simulated,
            DriverMode::Auto => {
                let choice = probe(model_path);
                match choice {
                    DriverChoice::Gpio => info!("Detected Raspberry Pi - using real GPIO"),
                    DriverChoice::Simulated => {
                        info!("Non-Raspberry Pi environment detected - using simulated GPIO")
                    }
                }
                choice
            }
        }
    }

    /// How long each self-test color is held.
    pub fn self_test_dwell(self) -> Duration {
        match self {
            DriverChoice::Gpio => Duration::from_millis(500),
            DriverChoice::Simulated => Duration::from_millis(100),
        }
    }
}

/// Reads the device model; only a Linux Raspberry Pi gets real GPIO.
pub fn probe(model_path: &Path) -> DriverChoice {
    if !cfg!(target_os = "linux") {
        return DriverChoice::Simulated;
    }

    match fs::read_to_string(model_path) {
        Ok(model) if model.contains("Raspberry Pi") => DriverChoice::Gpio,
        _ => DriverChoice::Simulated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use std::io::Write;

    #[test]
    fn test_probe_raspberry_pi_model() {
        let mut model = NamedTempFile::new().unwrap();
        write!(model, "Raspberry Pi 4 Model B Rev 1.4\0").unwrap();

        let expected = if cfg!(target_os = "linux") {
            DriverChoice::Gpio
        } else {
            DriverChoice::Simulated
        };
        assert_eq!(probe(model.path()), expected);
    }

    #[test]
    fn test_probe_other_board() {
        let mut model = NamedTempFile::new().unwrap();
        write!(model, "Hardkernel ODROID-C4").unwrap();

        assert_eq!(probe(model.path()), DriverChoice::Simulated);
    }

    #[test]
    fn test_probe_missing_model_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            probe(&dir.path().join("model")),
            DriverChoice::Simulated
        );
    }

    #[test]
    fn test_explicit_mode_skips_probe() {
        let missing = Path::new("/nonexistent/device-tree/model");
        assert_eq!(DriverChoice::select(DriverMode::Gpio, missing), DriverChoice::Gpio);
        assert_eq!(
            DriverChoice::select(DriverMode::Simulated, missing),
            DriverChoice::Simulated
        );
        assert_eq!(
            DriverChoice::select(DriverMode::Auto, missing),
            DriverChoice::Simulated
        );
    }
}
