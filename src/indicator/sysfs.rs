use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use super::{Level, Lines};
use crate::error::{BuildLightError, Result};

/// Label prefix of the SoC pin controller, e.g. `pinctrl-bcm2711` or
/// `pinctrl-rp1`.
const PIN_CONTROLLER_LABEL: &str = "pinctrl-";

/// udev fixes the permissions of a freshly exported line asynchronously.
const EXPORT_SETTLE_ATTEMPTS: u32 = 20;
const EXPORT_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// GPIO lines through the kernel sysfs interface (`/sys/class/gpio`).
///
/// Pins are BCM numbers. They are offset by the `base` of the pin
/// controller's gpiochip, which is 0 on older kernels and e.g. 512 on 6.6+.
#[derive(Debug)]
pub struct SysfsLines {
    root: PathBuf,
    base: Option<u32>,
    opened: Vec<u32>,
    /// Lines this process exported and therefore unexports on release
    exported: Vec<u32>,
}

impl SysfsLines {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            base: None,
            opened: Vec::new(),
            exported: Vec::new(),
        }
    }

    /// Sysfs number of BCM `pin`.
    fn number(&self, pin: u32) -> u32 {
        self.base.unwrap_or(0) + pin
    }

    fn line_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{}", self.number(pin)))
    }

    fn resolve_base(&mut self) {
        if self.base.is_none() {
            let base = chip_base(&self.root).unwrap_or(0);
            debug!("Pin controller gpiochip base is {base}");
            self.base = Some(base);
        }
    }
}

/// Lowest base among the gpiochips labelled as the SoC pin controller.
fn chip_base(root: &Path) -> Option<u32> {
    let entries = fs::read_dir(root).ok()?;

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("gpiochip"))
        .filter_map(|entry| {
            let chip = entry.path();
            let label = fs::read_to_string(chip.join("label")).ok()?;
            if !label.trim().starts_with(PIN_CONTROLLER_LABEL) {
                return None;
            }
            fs::read_to_string(chip.join("base")).ok()?.trim().parse().ok()
        })
        .min()
}

/// Write `direction`, waiting out udev on a line that was just exported.
fn set_output_direction(dir: &Path, freshly_exported: bool) -> io::Result<()> {
    let path = dir.join("direction");
    let mut attempt = 1;

    loop {
        match fs::write(&path, "out") {
            Err(e)
                if freshly_exported
                    && e.kind() == io::ErrorKind::PermissionDenied
                    && attempt < EXPORT_SETTLE_ATTEMPTS =>
            {
                attempt += 1;
                thread::sleep(EXPORT_SETTLE_DELAY);
            }
            result => return result,
        }
    }
}

impl Lines for SysfsLines {
    fn name(&self) -> &'static str {
        "gpio"
    }

    fn open_output(&mut self, pin: u32) -> Result<()> {
        self.resolve_base();
        let number = self.number(pin);
        let dir = self.line_dir(pin);

        let freshly_exported = !dir.exists();
        if freshly_exported {
            fs::write(self.root.join("export"), number.to_string())?;
            self.exported.push(pin);
            if !dir.exists() {
                return Err(BuildLightError::HardwareUnavailable(format!(
                    "export did not create {}",
                    dir.display()
                )));
            }
        }

        set_output_direction(&dir, freshly_exported)?;
        self.opened.push(pin);
        debug!("Opened BCM {pin} (gpio{number}) as output");
        Ok(())
    }

    fn write(&mut self, pin: u32, level: Level) -> Result<()> {
        let value = match level {
            Level::Low => "0",
            Level::High => "1",
        };
        fs::write(self.line_dir(pin).join("value"), value)?;
        Ok(())
    }

    fn release(&mut self) {
        let exported: Vec<u32> = self.exported.drain(..).collect();
        for pin in exported {
            let number = self.number(pin);
            if let Err(e) = fs::write(self.root.join("unexport"), number.to_string()) {
                warn!("Failed to unexport gpio{number}: {e}");
            }
        }
        info!("Released {} GPIO lines", self.opened.len());
        self.opened.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // A fake sysfs tree with the given lines already exported.
    fn sysfs_with(pins: &[u32]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for pin in pins {
            let line = dir.path().join(format!("gpio{pin}"));
            fs::create_dir_all(&line).unwrap();
            fs::write(line.join("direction"), "in").unwrap();
            fs::write(line.join("value"), "0").unwrap();
        }
        dir
    }

    fn read(dir: &TempDir, file: &str) -> String {
        fs::read_to_string(dir.path().join(file)).unwrap()
    }

    #[test]
    fn test_open_sets_direction_out() {
        let dir = sysfs_with(&[26]);
        let mut lines = SysfsLines::new(dir.path());

        lines.open_output(26).unwrap();

        assert_eq!(read(&dir, "gpio26/direction"), "out");
        assert!(!dir.path().join("export").exists());
    }

    #[test]
    fn test_write_levels() {
        let dir = sysfs_with(&[20]);
        let mut lines = SysfsLines::new(dir.path());
        lines.open_output(20).unwrap();

        lines.write(20, Level::Low).unwrap();
        assert_eq!(read(&dir, "gpio20/value"), "0");

        lines.write(20, Level::High).unwrap();
        assert_eq!(read(&dir, "gpio20/value"), "1");
    }

    #[test]
    fn test_open_exports_missing_line() {
        // Nothing creates gpio21 after the export write, as a kernel would
        let dir = sysfs_with(&[]);
        let mut lines = SysfsLines::new(dir.path());

        let err = lines.open_output(21).unwrap_err();

        assert_eq!(read(&dir, "export"), "21");
        assert!(matches!(err, BuildLightError::HardwareUnavailable(_)));
    }

    #[test]
    fn test_open_without_sysfs_fails() {
        let dir = TempDir::new().unwrap();
        let mut lines = SysfsLines::new(&dir.path().join("no-gpio"));

        assert!(lines.open_output(26).is_err());
    }

    #[test]
    fn test_release_only_unexports_own_lines() {
        let dir = sysfs_with(&[26]);
        let mut lines = SysfsLines::new(dir.path());
        lines.open_output(26).unwrap();

        lines.release();

        // gpio26 was already exported by someone else
        assert!(!dir.path().join("unexport").exists());
    }

    fn add_chip(dir: &TempDir, name: &str, label: &str, base: u32) {
        let chip = dir.path().join(name);
        fs::create_dir_all(&chip).unwrap();
        fs::write(chip.join("label"), format!("{label}\n")).unwrap();
        fs::write(chip.join("base"), format!("{base}\n")).unwrap();
    }

    #[test]
    fn test_pins_are_offset_by_pin_controller_base() {
        let dir = sysfs_with(&[538]);
        add_chip(&dir, "gpiochip512", "pinctrl-bcm2711", 512);
        add_chip(&dir, "gpiochip570", "raspberrypi-exp-gpio", 570);
        let mut lines = SysfsLines::new(dir.path());

        lines.open_output(26).unwrap();
        lines.write(26, Level::Low).unwrap();

        assert_eq!(read(&dir, "gpio538/direction"), "out");
        assert_eq!(read(&dir, "gpio538/value"), "0");
        assert!(!dir.path().join("gpio26").exists());
    }

    #[test]
    fn test_export_and_unexport_use_offset_number() {
        let dir = sysfs_with(&[]);
        add_chip(&dir, "gpiochip571", "pinctrl-rp1", 571);
        let mut lines = SysfsLines::new(dir.path());

        assert!(lines.open_output(20).is_err());
        assert_eq!(read(&dir, "export"), "591");

        lines.release();
        assert_eq!(read(&dir, "unexport"), "591");
    }

    #[test]
    fn test_unlabelled_tree_uses_bcm_numbers() {
        let dir = sysfs_with(&[21]);
        add_chip(&dir, "gpiochip504", "raspberrypi-exp-gpio", 504);
        let mut lines = SysfsLines::new(dir.path());

        lines.open_output(21).unwrap();

        assert_eq!(read(&dir, "gpio21/direction"), "out");
    }
}
