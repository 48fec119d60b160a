//! Mock line provider (gpiolib-like).
//!
//! Simulates a set of GPIO controllers, each owning a contiguous range of
//! global line numbers. Acquired lines remember their direction and level;
//! input levels can be driven from the test side with
//! [`MockLineProvider::set_input_level`].

use gpio_export_core::{
    Direction, Level, LineHandle, LineId, LineProvider, ProviderError, SourceRef,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::common::{Call, CallLog, ErrorConfig};

/// A simulated controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockChip {
    /// Controller label
    pub label: String,
    /// First global line number
    pub base: u32,
    /// Number of lines
    pub ngpio: u32,
}

#[derive(Debug)]
struct LineState {
    label: String,
    token: u64,
    direction: Direction,
}

#[derive(Debug, Default)]
struct ProviderState {
    acquired: HashMap<LineId, LineState>,
    levels: HashMap<LineId, Level>,
}

/// Mock [`LineProvider`] with call recording and error injection.
#[derive(Debug)]
pub struct MockLineProvider {
    chips: Vec<MockChip>,
    state: Mutex<ProviderState>,
    next_token: AtomicU64,
    errors: ErrorConfig,
    log: CallLog,
}

impl MockLineProvider {
    /// Create a builder.
    pub fn builder() -> MockLineProviderBuilder {
        MockLineProviderBuilder::default()
    }

    /// Single 32-line controller `gpiochip0` at base 0.
    pub fn new() -> Self {
        Self::builder().chip("gpiochip0", 0, 32).build()
    }

    /// Shared call record.
    pub fn log(&self) -> &CallLog {
        &self.log
    }

    /// Simulate an external signal on a line.
    pub fn set_input_level(&self, line: LineId, level: Level) {
        self.state.lock().levels.insert(line, level);
    }

    /// Current level of a line, acquired or not.
    pub fn level(&self, line: LineId) -> Level {
        self.state.lock().levels.get(&line).copied().unwrap_or_default()
    }

    /// Direction of an acquired line.
    pub fn direction(&self, line: LineId) -> Option<Direction> {
        self.state.lock().acquired.get(&line).map(|s| s.direction)
    }

    /// Simulate an external agent reconfiguring an acquired line, bypassing
    /// the handle that holds it.
    pub fn set_external_direction(&self, line: LineId, direction: Direction) {
        let mut state = self.state.lock();
        if let Some(s) = state.acquired.get_mut(&line) {
            s.direction = direction;
        }
        if let Some(level) = direction.initial_level() {
            state.levels.insert(line, level);
        }
    }

    /// Whether `line` is currently held.
    pub fn is_acquired(&self, line: LineId) -> bool {
        self.state.lock().acquired.contains_key(&line)
    }

    /// Number of lines currently held.
    pub fn acquired_count(&self) -> usize {
        self.state.lock().acquired.len()
    }

    fn check_handle(
        &self,
        state: &ProviderState,
        handle: &LineHandle,
    ) -> Result<(), ProviderError> {
        match state.acquired.get(&handle.line()) {
            Some(line) if line.token == handle.token() => Ok(()),
            _ => Err(ProviderError::InvalidLine {
                line: handle.line().to_string(),
                reason: "handle is not valid".into(),
            }),
        }
    }
}

impl Default for MockLineProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LineProvider for MockLineProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn resolve(&self, source: &SourceRef) -> Result<LineId, ProviderError> {
        self.log.record(Call::Resolve {
            chip: source.chip.clone(),
            offset: source.offset,
        });

        let chip = self
            .chips
            .iter()
            .find(|c| c.label == source.chip)
            .ok_or_else(|| ProviderError::InvalidLine {
                line: source.to_string(),
                reason: format!("no controller '{}'", source.chip),
            })?;

        if source.offset >= chip.ngpio {
            return Err(ProviderError::InvalidLine {
                line: source.to_string(),
                reason: format!("controller has {} lines", chip.ngpio),
            });
        }

        chip.base
            .checked_add(source.offset)
            .map(LineId)
            .ok_or_else(|| ProviderError::InvalidLine {
                line: source.to_string(),
                reason: format!("line number overflows base {}", chip.base),
            })
    }

    fn acquire(
        &self,
        line: LineId,
        direction: Direction,
        label: &str,
    ) -> Result<LineHandle, ProviderError> {
        self.errors.check_acquire(line)?;

        let mut state = self.state.lock();
        if state.acquired.contains_key(&line) {
            return Err(ProviderError::Busy { line });
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        state.acquired.insert(
            line,
            LineState {
                label: label.to_string(),
                token,
                direction,
            },
        );
        if let Some(level) = direction.initial_level() {
            state.levels.insert(line, level);
        }
        drop(state);

        debug!(line = %line, label, ?direction, "Mock line acquired");
        self.log.record(Call::Acquire {
            line,
            label: label.to_string(),
        });
        Ok(LineHandle::new(line, token))
    }

    fn read(&self, handle: &LineHandle) -> Result<Level, ProviderError> {
        self.log.record(Call::Read {
            line: handle.line(),
        });
        self.errors.check_access("read", handle.line())?;

        let state = self.state.lock();
        self.check_handle(&state, handle)?;
        Ok(state.levels.get(&handle.line()).copied().unwrap_or_default())
    }

    fn write(&self, handle: &LineHandle, level: Level) -> Result<(), ProviderError> {
        let line = handle.line();
        self.log.record(Call::Write { line, level });
        self.errors.check_access("write", line)?;

        let mut state = self.state.lock();
        self.check_handle(&state, handle)?;
        if state
            .acquired
            .get(&line)
            .is_some_and(|s| !s.direction.is_output())
        {
            return Err(ProviderError::Fault {
                line,
                message: "line is configured as input".into(),
            });
        }

        state.levels.insert(line, level);
        if let Some(s) = state.acquired.get_mut(&line) {
            s.direction = Direction::output(level);
        }
        Ok(())
    }

    fn set_direction(
        &self,
        handle: &LineHandle,
        direction: Direction,
    ) -> Result<(), ProviderError> {
        let line = handle.line();
        self.log.record(Call::SetDirection { line, direction });

        let mut state = self.state.lock();
        self.check_handle(&state, handle)?;
        if let Some(s) = state.acquired.get_mut(&line) {
            s.direction = direction;
        }
        if let Some(level) = direction.initial_level() {
            state.levels.insert(line, level);
        }
        Ok(())
    }

    fn current_direction(&self, handle: &LineHandle) -> Result<Direction, ProviderError> {
        let state = self.state.lock();
        self.check_handle(&state, handle)?;
        Ok(state
            .acquired
            .get(&handle.line())
            .map(|s| s.direction)
            .unwrap_or_default())
    }

    fn release(&self, handle: LineHandle) {
        let line = handle.line();
        let mut state = self.state.lock();
        let label = match state.acquired.get(&line) {
            Some(s) if s.token == handle.token() => {
                state.acquired.remove(&line).map(|s| s.label).unwrap_or_default()
            }
            _ => String::new(),
        };
        drop(state);

        debug!(line = %line, label = %label, "Mock line released");
        self.log.record(Call::Release { line, label });
    }
}

/// Builder for [`MockLineProvider`].
#[derive(Debug, Default)]
pub struct MockLineProviderBuilder {
    chips: Vec<MockChip>,
    errors: ErrorConfig,
    log: Option<CallLog>,
}

impl MockLineProviderBuilder {
    /// Add a controller.
    pub fn chip(mut self, label: impl Into<String>, base: u32, ngpio: u32) -> Self {
        self.chips.push(MockChip {
            label: label.into(),
            base,
            ngpio,
        });
        self
    }

    /// Inject failures.
    pub fn errors(mut self, errors: ErrorConfig) -> Self {
        self.errors = errors;
        self
    }

    /// Record into an existing log (e.g. the namespace's).
    pub fn log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Build the provider.
    pub fn build(self) -> MockLineProvider {
        MockLineProvider {
            chips: self.chips,
            state: Mutex::new(ProviderState::default()),
            next_token: AtomicU64::new(1),
            errors: self.errors,
            log: self.log.unwrap_or_default(),
        }
    }
}
