//! Line model: identifiers, direction, level and the declared line spec.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DecodeError;

/// Global line number assigned by the provider once a [`SourceRef`] is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineId(pub u32);

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a line as written in the hardware description: a controller
/// plus an offset within that controller.
///
/// The reference is opaque to the engine; only the [`LineProvider`] knows how
/// to turn it into a [`LineId`].
///
/// [`LineProvider`]: crate::LineProvider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    /// Controller label (e.g. `"gpiochip0"` or the chip's label)
    pub chip: String,
    /// Line offset within the controller
    pub offset: u32,
}

impl SourceRef {
    /// Create a new source reference.
    pub fn new(chip: impl Into<String>, offset: u32) -> Self {
        Self {
            chip: chip.into(),
            offset,
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chip, self.offset)
    }
}

/// Logic level of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Level {
    /// Logic 0
    #[default]
    Low,
    /// Logic 1
    High,
}

impl From<bool> for Level {
    fn from(value: bool) -> Self {
        if value {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<Level> for bool {
    fn from(value: Level) -> Self {
        matches!(value, Level::High)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => write!(f, "0"),
            Level::High => write!(f, "1"),
        }
    }
}

/// Direction (and initial level, for outputs) a line is acquired with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Configure the line as input
    #[default]
    Input,
    /// Configure the line as output, driven low
    OutputLow,
    /// Configure the line as output, driven high
    OutputHigh,
}

impl Direction {
    /// Parse a direction token from a line declaration.
    ///
    /// Accepts `"input"`, `"output"`, `"low"` and `"high"`. A bare `"output"`
    /// starts low.
    pub fn from_declared(token: &str) -> Option<Self> {
        match token {
            "input" => Some(Direction::Input),
            "output" | "low" => Some(Direction::OutputLow),
            "high" => Some(Direction::OutputHigh),
            _ => None,
        }
    }

    /// Whether the line drives its level.
    pub fn is_output(self) -> bool {
        !matches!(self, Direction::Input)
    }

    /// Level an output starts at, `None` for inputs.
    pub fn initial_level(self) -> Option<Level> {
        match self {
            Direction::Input => None,
            Direction::OutputLow => Some(Level::Low),
            Direction::OutputHigh => Some(Level::High),
        }
    }

    /// Output direction that keeps `level` on the line.
    pub fn output(level: Level) -> Self {
        match level {
            Level::Low => Direction::OutputLow,
            Level::High => Direction::OutputHigh,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::OutputLow => write!(f, "low"),
            Direction::OutputHigh => write!(f, "high"),
        }
    }
}

/// One declared line, validated and immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSpec {
    name: String,
    source: SourceRef,
    direction: Direction,
    direction_mutable: bool,
}

impl LineSpec {
    /// Create a line spec. The name must be non-empty and free of `/`, since
    /// it becomes a node name in the published namespace.
    pub fn new(
        name: impl Into<String>,
        source: SourceRef,
        direction: Direction,
        direction_mutable: bool,
    ) -> Result<Self, DecodeError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DecodeError::MissingLabel);
        }
        if name.contains('/') || name == "." || name == ".." {
            return Err(DecodeError::InvalidLabel { label: name });
        }

        Ok(Self {
            name,
            source,
            direction,
            direction_mutable,
        })
    }

    /// Node name and diagnostic identifier of the line.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the line comes from.
    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    /// Direction requested at acquisition time.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether the direction may be changed after export.
    pub fn direction_mutable(&self) -> bool {
        self.direction_mutable
    }
}

/// Capability token for an acquired line.
///
/// Issued by a [`LineProvider`] and handed back to it on release. It is
/// deliberately not `Clone`: exactly one owner may hold it.
///
/// [`LineProvider`]: crate::LineProvider
#[derive(Debug, PartialEq, Eq)]
pub struct LineHandle {
    line: LineId,
    token: u64,
}

impl LineHandle {
    /// Create a handle. Only providers should call this.
    pub fn new(line: LineId, token: u64) -> Self {
        Self { line, token }
    }

    /// The resolved line this handle controls.
    pub fn line(&self) -> LineId {
        self.line
    }

    /// Provider-private token.
    pub fn token(&self) -> u64 {
        self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_directions() {
        assert_eq!(Direction::from_declared("input"), Some(Direction::Input));
        assert_eq!(Direction::from_declared("output"), Some(Direction::OutputLow));
        assert_eq!(Direction::from_declared("low"), Some(Direction::OutputLow));
        assert_eq!(Direction::from_declared("high"), Some(Direction::OutputHigh));
        assert_eq!(Direction::from_declared("in"), None);
        assert_eq!(Direction::from_declared("HIGH"), None);
    }

    #[test]
    fn test_initial_levels() {
        assert_eq!(Direction::Input.initial_level(), None);
        assert_eq!(Direction::OutputLow.initial_level(), Some(Level::Low));
        assert_eq!(Direction::OutputHigh.initial_level(), Some(Level::High));
        assert_eq!(Direction::output(Level::High), Direction::OutputHigh);
    }

    #[test]
    fn test_level_bool_conversion() {
        assert_eq!(Level::from(true), Level::High);
        assert!(!bool::from(Level::Low));
        assert_eq!(Level::High.to_string(), "1");
    }

    #[test]
    fn test_spec_rejects_bad_names() {
        let src = SourceRef::new("gpiochip0", 1);
        assert!(matches!(
            LineSpec::new("", src.clone(), Direction::Input, false),
            Err(DecodeError::MissingLabel)
        ));
        assert!(matches!(
            LineSpec::new("a/b", src.clone(), Direction::Input, false),
            Err(DecodeError::InvalidLabel { .. })
        ));

        let spec = LineSpec::new("led1", src, Direction::OutputHigh, true).unwrap();
        assert_eq!(spec.name(), "led1");
        assert!(spec.direction_mutable());
    }

    #[test]
    fn test_source_ref_display() {
        assert_eq!(SourceRef::new("gpiochip2", 7).to_string(), "gpiochip2:7");
    }
}
