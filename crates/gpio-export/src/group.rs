//! Export group and the per-line value access surface.
//!
//! An [`ExportGroup`] owns everything one successful setup created: the
//! class registration, the root node, the alias link and one
//! [`AcquiredLine`] per exported line. Lines are shared as
//! `Arc<AcquiredLine>` so independent callers can drive different lines
//! concurrently; each line only guards its own state.

use gpio_export_core::attribute::{format_direction, format_level, parse_direction, parse_level};
use gpio_export_core::{
    AccessError, Direction, EntryError, Level, LineHandle, LineId, LineProvider, LineSpec,
    NamespacePublisher, NodeHandle,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

use crate::ledger::Ledger;

struct LineState {
    handle: Option<LineHandle>,
    node: Option<NodeHandle>,
    direction: Direction,
}

/// A line that was acquired from the provider and published.
///
/// Exists only if both the handle and the leaf node were created. Both are
/// owned here and released together by [`ExportGroup::teardown`] or by a
/// rollback.
pub struct AcquiredLine {
    spec: LineSpec,
    line: LineId,
    provider: Arc<dyn LineProvider>,
    publisher: Arc<dyn NamespacePublisher>,
    state: RwLock<LineState>,
}

impl AcquiredLine {
    pub(crate) fn new(
        spec: LineSpec,
        handle: LineHandle,
        node: NodeHandle,
        provider: Arc<dyn LineProvider>,
        publisher: Arc<dyn NamespacePublisher>,
    ) -> Self {
        let direction = spec.direction();
        Self {
            line: handle.line(),
            spec,
            provider,
            publisher,
            state: RwLock::new(LineState {
                handle: Some(handle),
                node: Some(node),
                direction,
            }),
        }
    }

    /// Exported name.
    pub fn name(&self) -> &str {
        self.spec.name()
    }

    /// Spec the line was exported from.
    pub fn spec(&self) -> &LineSpec {
        &self.spec
    }

    /// Resolved line id.
    pub fn line_id(&self) -> LineId {
        self.line
    }

    /// Direction last configured through this line.
    ///
    /// An external agent may have changed it since; [`show_direction`]
    /// asks the provider.
    ///
    /// [`show_direction`]: Self::show_direction
    pub fn direction(&self) -> Direction {
        self.state.read().direction
    }

    /// Namespace path of the leaf node, `None` once released.
    pub fn node_path(&self) -> Option<String> {
        self.state.read().node.as_ref().map(|n| n.path().to_string())
    }

    /// Whether the line has been released.
    pub fn is_released(&self) -> bool {
        self.state.read().handle.is_none()
    }

    /// Read the current level.
    pub fn read(&self) -> Result<Level, AccessError> {
        let state = self.state.read();
        let handle = state.handle.as_ref().ok_or_else(|| self.released())?;
        Ok(self.provider.read(handle)?)
    }

    /// Drive the line to `level`.
    ///
    /// Always rejected while the line is an input, whatever the level. The
    /// provider is asked for the direction in force, so a change made
    /// outside this process is honoured.
    pub fn write(&self, level: Level) -> Result<(), AccessError> {
        let state = self.state.read();
        let handle = state.handle.as_ref().ok_or_else(|| self.released())?;
        if !self.provider.current_direction(handle)?.is_output() {
            return Err(AccessError::ReadOnly {
                line: self.name().to_string(),
            });
        }
        Ok(self.provider.write(handle, level)?)
    }

    /// Reconfigure the direction. Only for lines exported with
    /// `direction_may_change`.
    pub fn set_direction(&self, direction: Direction) -> Result<(), AccessError> {
        if !self.spec.direction_mutable() {
            return Err(AccessError::DirectionFixed {
                line: self.name().to_string(),
            });
        }

        let mut state = self.state.write();
        let handle = state.handle.as_ref().ok_or_else(|| self.released())?;
        self.provider.set_direction(handle, direction)?;
        state.direction = direction;

        debug!(line = self.name(), %direction, "Line direction changed");
        Ok(())
    }

    /// Text of the `value` attribute: `"0\n"` or `"1\n"`.
    pub fn show_value(&self) -> Result<String, AccessError> {
        self.read().map(format_level)
    }

    /// Write the `value` attribute from text.
    pub fn store_value(&self, input: &str) -> Result<(), AccessError> {
        self.write(parse_level(input)?)
    }

    /// Text of the `direction` attribute: `"in\n"` or `"out\n"`.
    pub fn show_direction(&self) -> Result<String, AccessError> {
        let state = self.state.read();
        let handle = state.handle.as_ref().ok_or_else(|| self.released())?;
        Ok(format_direction(self.provider.current_direction(handle)?))
    }

    /// Write the `direction` attribute from text.
    pub fn store_direction(&self, input: &str) -> Result<(), AccessError> {
        self.set_direction(parse_direction(input)?)
    }

    /// Unpublish the leaf, then give the handle back. Returns false if the
    /// line was already released.
    pub(crate) fn release(&self) -> bool {
        let mut state = self.state.write();
        let node = state.node.take();
        let handle = state.handle.take();
        drop(state);

        if node.is_none() && handle.is_none() {
            return false;
        }

        debug!(line = self.name(), id = %self.line, "Releasing line");
        if let Some(node) = node {
            self.publisher.remove_node(node);
        }
        if let Some(handle) = handle {
            self.provider.release(handle);
        }
        true
    }

    fn released(&self) -> AccessError {
        AccessError::Released {
            line: self.name().to_string(),
        }
    }
}

impl std::fmt::Debug for AcquiredLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquiredLine")
            .field("name", &self.name())
            .field("line", &self.line)
            .field("direction", &self.direction())
            .field("released", &self.is_released())
            .finish()
    }
}

/// An entry that was reported and skipped during setup.
#[derive(Debug)]
pub struct SkippedLine {
    /// Label of the entry, if it had one
    pub name: Option<String>,
    /// Why it was skipped
    pub error: EntryError,
}

/// Everything one setup call exported.
///
/// Dropping the group tears it down.
pub struct ExportGroup {
    alias_name: String,
    root_path: String,
    lines: Vec<Arc<AcquiredLine>>,
    skipped: Vec<SkippedLine>,
    ledger: Ledger,
}

impl ExportGroup {
    pub(crate) fn new(
        alias_name: String,
        root_path: String,
        lines: Vec<Arc<AcquiredLine>>,
        skipped: Vec<SkippedLine>,
        ledger: Ledger,
    ) -> Self {
        Self {
            alias_name,
            root_path,
            lines,
            skipped,
            ledger,
        }
    }

    /// Alias the root node is linked under.
    pub fn alias_name(&self) -> &str {
        &self.alias_name
    }

    /// Namespace path of the root node.
    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    /// Exported lines in acquisition order.
    pub fn lines(&self) -> &[Arc<AcquiredLine>] {
        &self.lines
    }

    /// Number of exported lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True if no line was exported (never the case for a group returned
    /// by setup).
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Entries skipped during setup, in declaration order.
    pub fn skipped(&self) -> &[SkippedLine] {
        &self.skipped
    }

    /// Look up an exported line by name.
    pub fn line(&self, name: &str) -> Option<&Arc<AcquiredLine>> {
        self.lines.iter().find(|l| l.name() == name)
    }

    /// Read the line called `name`.
    pub fn read(&self, name: &str) -> Result<Level, AccessError> {
        self.lookup(name)?.read()
    }

    /// Write the line called `name`.
    pub fn write(&self, name: &str, level: Level) -> Result<(), AccessError> {
        self.lookup(name)?.write(level)
    }

    /// Whether [`teardown`](Self::teardown) has run.
    pub fn is_torn_down(&self) -> bool {
        self.ledger.is_empty()
    }

    /// Release every line (newest first), then the alias link, the root
    /// node and the class. Calling it again does nothing.
    pub fn teardown(&mut self) {
        if self.ledger.is_empty() {
            return;
        }
        info!(root = %self.root_path, lines = self.lines.len(), "Tearing down export group");
        self.ledger.unwind();
    }

    fn lookup(&self, name: &str) -> Result<&Arc<AcquiredLine>, AccessError> {
        self.line(name)
            .ok_or_else(|| AccessError::UnknownLine(name.to_string()))
    }
}

impl std::fmt::Debug for ExportGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportGroup")
            .field("alias_name", &self.alias_name)
            .field("root_path", &self.root_path)
            .field("lines", &self.lines)
            .field("skipped", &self.skipped.len())
            .finish()
    }
}
