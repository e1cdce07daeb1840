use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::BuildLightError;
use crate::indicator::{CanceledColor, DriverMode, Pins};
use crate::providers::DEFAULT_BASE_URL;
use crate::schedule::BusinessHours;

const PLACEHOLDER_TOKEN: &str = "YOUR_PAT_TOKEN_HERE";

/// Configuration file structure for buildlight.
///
/// Loaded once at startup and validated before monitoring begins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Pipeline to watch and how to reach it
    #[serde(default)]
    pub azure_devops: AzureDevOpsConfig,

    /// When monitoring is active
    #[serde(default)]
    pub business_hours: BusinessHours,

    /// Traffic light hardware
    #[serde(default)]
    pub indicator: IndicatorConfig,

    /// Polling behaviour
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AzureDevOpsConfig {
    /// Organization name as it appears in dev.azure.com/{organization}
    #[serde(default)]
    pub organization: String,

    #[serde(default)]
    pub project: String,

    /// Pipeline definition id
    #[serde(default)]
    pub pipeline_id: String,

    /// Personal access token with Build (Read) scope
    #[serde(default)]
    pub personal_access_token: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndicatorConfig {
    /// auto, gpio or simulated
    #[serde(default)]
    pub driver: DriverMode,

    #[serde(default = "default_red_pin")]
    pub red_pin: u32,

    #[serde(default = "default_yellow_pin")]
    pub yellow_pin: u32,

    #[serde(default = "default_green_pin")]
    pub green_pin: u32,

    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,

    /// Device-tree model file read to detect a Raspberry Pi
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Color shown for canceled runs
    #[serde(default)]
    pub canceled_color: CanceledColor,

    /// Run the startup self-test without pauses
    #[serde(default)]
    pub skip_startup_delay: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MonitorConfig {
    /// Seconds between checks
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for AzureDevOpsConfig {
    fn default() -> Self {
        Self {
            organization: String::new(),
            project: String::new(),
            pipeline_id: String::new(),
            personal_access_token: String::new(),
            base_url: default_base_url(),
        }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            driver: DriverMode::Auto,
            red_pin: default_red_pin(),
            yellow_pin: default_yellow_pin(),
            green_pin: default_green_pin(),
            gpio_root: default_gpio_root(),
            model_path: default_model_path(),
            canceled_color: CanceledColor::Red,
            skip_startup_delay: false,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_red_pin() -> u32 {
    26
}

fn default_yellow_pin() -> u32 {
    20
}

fn default_green_pin() -> u32 {
    21
}

fn default_gpio_root() -> PathBuf {
    PathBuf::from("/sys/class/gpio")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("/proc/device-tree/model")
}

fn default_interval_secs() -> u64 {
    60
}

impl IndicatorConfig {
    pub fn pins(&self) -> Pins {
        Pins {
            red: self.red_pin,
            yellow: self.yellow_pin,
            green: self.green_pin,
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./buildlight.toml
    /// 3. ./buildlight.json
    /// 4. ./buildlight.yaml
    /// 5. ./buildlight.yml
    /// 6. `<config dir>/buildlight/config.toml`
    ///
    /// Returns default configuration if no file is found; the defaults do
    /// not pass [`Config::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        match Self::find() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// First existing file among the default locations.
    pub fn find() -> Option<PathBuf> {
        let candidates = [
            "buildlight.toml",
            "buildlight.json",
            "buildlight.yaml",
            "buildlight.yml",
        ];

        candidates
            .iter()
            .map(PathBuf::from)
            .chain(Self::user_config_path())
            .find(|path| path.exists())
    }

    /// `~/.config/buildlight/config.toml` on Linux.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("buildlight").join("config.toml"))
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Check everything the monitor relies on.
    pub fn validate(&self) -> crate::error::Result<()> {
        let azure = &self.azure_devops;
        let required = [
            ("organization", &azure.organization),
            ("project", &azure.project),
            ("pipeline-id", &azure.pipeline_id),
            ("personal-access-token", &azure.personal_access_token),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(BuildLightError::Config(format!(
                "azure-devops settings missing: {} (run `buildlight init` to create a config file)",
                missing.join(", ")
            )));
        }

        if azure.personal_access_token == PLACEHOLDER_TOKEN {
            return Err(BuildLightError::Config(format!(
                "replace '{PLACEHOLDER_TOKEN}' with your Azure DevOps personal access token"
            )));
        }

        self.business_hours.validate()?;

        if self.monitor.interval_secs == 0 {
            return Err(BuildLightError::Config(
                "monitor.interval-secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
