//! Line provider over `/sys/class/gpio`.

use gpio_export_core::{
    Direction, Level, LineHandle, LineId, LineProvider, ProviderError, SourceRef,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Where sysfs is normally mounted.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys";

// errno for "line already exported"
const EBUSY: i32 = 16;

#[derive(Debug)]
struct Chip {
    name: String,
    label: String,
    base: u32,
    ngpio: u32,
}

/// [`LineProvider`] backed by the sysfs GPIO class.
#[derive(Debug)]
pub struct SysfsLineProvider {
    gpio_class: PathBuf,
    held: Mutex<HashMap<LineId, u64>>,
    next_token: AtomicU64,
}

impl SysfsLineProvider {
    /// Provider for a sysfs tree mounted at `sysfs_root`.
    pub fn new(sysfs_root: impl AsRef<Path>) -> Self {
        Self {
            gpio_class: sysfs_root.as_ref().join("class/gpio"),
            held: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Kernel directory of an exported line.
    pub fn line_dir(&self, line: LineId) -> PathBuf {
        self.gpio_class.join(format!("gpio{}", line))
    }

    fn chips(&self) -> io::Result<Vec<Chip>> {
        let mut chips = Vec::new();
        for entry in fs::read_dir(&self.gpio_class)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with("gpiochip") {
                continue;
            }

            let dir = entry.path();
            let chip = (|| -> Option<Chip> {
                Some(Chip {
                    label: read_attr(&dir.join("label")).ok()?,
                    base: read_attr(&dir.join("base")).ok()?.parse().ok()?,
                    ngpio: read_attr(&dir.join("ngpio")).ok()?.parse().ok()?,
                    name: name.clone(),
                })
            })();

            match chip {
                Some(chip) => chips.push(chip),
                None => warn!(chip = %name, "Ignoring controller with unreadable attributes"),
            }
        }
        Ok(chips)
    }

    fn check_handle(&self, handle: &LineHandle) -> Result<(), ProviderError> {
        match self.held.lock().get(&handle.line()) {
            Some(token) if *token == handle.token() => Ok(()),
            _ => Err(ProviderError::InvalidLine {
                line: handle.line().to_string(),
                reason: "handle is not valid".into(),
            }),
        }
    }

    fn unexport(&self, line: LineId) {
        if let Err(err) = fs::write(self.gpio_class.join("unexport"), line.to_string()) {
            warn!(line = %line, error = %err, "Failed to unexport line");
        }
    }

    fn write_direction(&self, line: LineId, direction: Direction) -> Result<(), ProviderError> {
        let token = match direction {
            Direction::Input => "in",
            Direction::OutputLow => "low",
            Direction::OutputHigh => "high",
        };
        fs::write(self.line_dir(line).join("direction"), token).map_err(|err| {
            ProviderError::Fault {
                line,
                message: format!("setting direction '{}': {}", token, err),
            }
        })
    }
}

impl Default for SysfsLineProvider {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_ROOT)
    }
}

impl LineProvider for SysfsLineProvider {
    fn name(&self) -> &str {
        "sysfs"
    }

    fn resolve(&self, source: &SourceRef) -> Result<LineId, ProviderError> {
        let chips = self.chips().map_err(|err| ProviderError::Deferred {
            reason: format!("{}: {}", self.gpio_class.display(), err),
        })?;

        let chip = chips
            .iter()
            .find(|c| c.label == source.chip || c.name == source.chip)
            .ok_or_else(|| ProviderError::InvalidLine {
                line: source.to_string(),
                reason: format!("no controller '{}'", source.chip),
            })?;

        if source.offset >= chip.ngpio {
            return Err(ProviderError::InvalidLine {
                line: source.to_string(),
                reason: format!("controller {} has {} lines", chip.name, chip.ngpio),
            });
        }

        chip.base
            .checked_add(source.offset)
            .map(LineId)
            .ok_or_else(|| ProviderError::InvalidLine {
                line: source.to_string(),
                reason: format!("controller {} has base {}", chip.name, chip.base),
            })
    }

    fn acquire(
        &self,
        line: LineId,
        direction: Direction,
        label: &str,
    ) -> Result<LineHandle, ProviderError> {
        if self.held.lock().contains_key(&line) {
            return Err(ProviderError::Busy { line });
        }

        let export = self.gpio_class.join("export");
        if !export.exists() {
            return Err(ProviderError::Deferred {
                reason: format!("{} not available", export.display()),
            });
        }
        fs::write(&export, line.to_string()).map_err(|err| {
            if err.raw_os_error() == Some(EBUSY) {
                ProviderError::Busy { line }
            } else {
                ProviderError::Io(err)
            }
        })?;

        if !self.line_dir(line).is_dir() {
            self.unexport(line);
            return Err(ProviderError::Deferred {
                reason: format!("{} did not appear", self.line_dir(line).display()),
            });
        }

        if let Err(err) = self.write_direction(line, direction) {
            self.unexport(line);
            return Err(err);
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.held.lock().insert(line, token);
        debug!(line = %line, label, %direction, "Line exported");
        Ok(LineHandle::new(line, token))
    }

    fn read(&self, handle: &LineHandle) -> Result<Level, ProviderError> {
        self.check_handle(handle)?;
        let line = handle.line();
        let text = read_attr(&self.line_dir(line).join("value"))?;
        match text.as_str() {
            "0" => Ok(Level::Low),
            "1" => Ok(Level::High),
            other => Err(ProviderError::Fault {
                line,
                message: format!("unexpected value '{}'", other),
            }),
        }
    }

    fn write(&self, handle: &LineHandle, level: Level) -> Result<(), ProviderError> {
        self.check_handle(handle)?;
        let value = if bool::from(level) { "1" } else { "0" };
        fs::write(self.line_dir(handle.line()).join("value"), value)?;
        Ok(())
    }

    fn set_direction(
        &self,
        handle: &LineHandle,
        direction: Direction,
    ) -> Result<(), ProviderError> {
        self.check_handle(handle)?;
        self.write_direction(handle.line(), direction)
    }

    fn current_direction(&self, handle: &LineHandle) -> Result<Direction, ProviderError> {
        self.check_handle(handle)?;
        let line = handle.line();
        match read_attr(&self.line_dir(line).join("direction"))?.as_str() {
            "in" => Ok(Direction::Input),
            "low" => Ok(Direction::OutputLow),
            "high" => Ok(Direction::OutputHigh),
            "out" => Ok(Direction::output(self.read(handle)?)),
            other => Err(ProviderError::Fault {
                line,
                message: format!("unexpected direction '{}'", other),
            }),
        }
    }

    fn release(&self, handle: LineHandle) {
        let line = handle.line();
        let mut held = self.held.lock();
        if held.get(&line) != Some(&handle.token()) {
            debug!(line = %line, "Ignoring release of stale handle");
            return;
        }
        held.remove(&line);
        drop(held);

        self.unexport(line);
        debug!(line = %line, "Line unexported");
    }
}

fn read_attr(path: &Path) -> io::Result<String> {
    Ok(fs::read_to_string(path)?.trim_end().to_string())
}
