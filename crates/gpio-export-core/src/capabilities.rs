//! Collaborator capabilities.
//!
//! The exporter never touches hardware or the published namespace directly.
//! It goes through two traits:
//!
//! - [`LineProvider`] turns a [`SourceRef`] into a controllable line
//! - [`NamespacePublisher`] creates the discoverable nodes and links
//!
//! Both are synchronous: setup is a strictly ordered sequence of calls and
//! every call is assumed bounded. Implementations must be `Send + Sync` so
//! exported lines can be driven from independent threads.
//!
//! # Contract
//!
//! - Every successful `acquire`/`create_*`/`publish_line` hands out an owned
//!   token. The engine returns each token exactly once through the matching
//!   `release`/`remove_*` call.
//! - Release calls never fail from the caller's point of view; an
//!   implementation logs what it cannot clean up.
//! - Concurrent `read`/`write` on the same handle are serialized by the
//!   provider. The engine adds no lock of its own around provider calls.

use crate::error::{ProviderError, PublishError};
use crate::line::{Direction, Level, LineHandle, LineId, SourceRef};

/// Capability: Line Provider
///
/// Turns line references into exclusively owned, controllable handles.
pub trait LineProvider: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &str;

    /// Resolve a source reference to a global line id.
    fn resolve(&self, source: &SourceRef) -> Result<LineId, ProviderError>;

    /// Acquire `line` for `label`, configured with `direction`.
    ///
    /// Output directions also set the initial level. Returns
    /// [`ProviderError::Deferred`] when a dependency is not ready yet.
    fn acquire(
        &self,
        line: LineId,
        direction: Direction,
        label: &str,
    ) -> Result<LineHandle, ProviderError>;

    /// Read the current level.
    fn read(&self, handle: &LineHandle) -> Result<Level, ProviderError>;

    /// Drive the line to `level`. One call, applied immediately.
    fn write(&self, handle: &LineHandle, level: Level) -> Result<(), ProviderError>;

    /// Reconfigure the direction of an acquired line.
    fn set_direction(&self, handle: &LineHandle, direction: Direction)
        -> Result<(), ProviderError>;

    /// Direction the line is configured with right now, which may differ
    /// from the last one set through this handle if an external agent
    /// reconfigured it.
    fn current_direction(&self, handle: &LineHandle) -> Result<Direction, ProviderError>;

    /// Give the line back.
    fn release(&self, handle: LineHandle);
}

/// Token for a published node (class, directory or line leaf).
///
/// The path is relative to the publisher's namespace root and uses `/` as
/// separator, e.g. `class/xbrother/gpio/led1`.
#[derive(Debug, PartialEq, Eq)]
pub struct NodeHandle {
    path: String,
}

impl NodeHandle {
    /// Create a handle for `path`. Only publishers should call this.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the node within the namespace.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path component.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Path a child called `name` would have.
    pub fn child_path(&self, name: &str) -> String {
        format!("{}/{}", self.path, name)
    }
}

/// Token for a published symbolic alias.
#[derive(Debug, PartialEq, Eq)]
pub struct LinkHandle {
    alias: String,
    target: String,
}

impl LinkHandle {
    /// Create a handle. Only publishers should call this.
    pub fn new(alias: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            target: target.into(),
        }
    }

    /// Alias name.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Path of the node the alias points at.
    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Capability: Namespace Publisher
///
/// Exposes a discoverable node tree. Children are always created after and
/// removed before their parent.
pub trait NamespacePublisher: Send + Sync {
    /// Register the process-scoped class node that holds the group.
    fn create_class(&self, name: &str) -> Result<NodeHandle, PublishError>;

    /// Create a plain node under `parent`.
    fn create_node(&self, parent: &NodeHandle, name: &str) -> Result<NodeHandle, PublishError>;

    /// Create the symbolic alias `alias` pointing at `target`.
    fn create_link(&self, alias: &str, target: &NodeHandle) -> Result<LinkHandle, PublishError>;

    /// Publish an acquired line as leaf `name` under `parent`, exposing its
    /// `value` attribute (and `direction`, when `direction_mutable`).
    fn publish_line(
        &self,
        parent: &NodeHandle,
        name: &str,
        line: &LineHandle,
        direction_mutable: bool,
    ) -> Result<NodeHandle, PublishError>;

    /// Remove a node. Removing a node that is already gone is a no-op.
    fn remove_node(&self, node: NodeHandle);

    /// Remove an alias. Removing an alias that is already gone is a no-op.
    fn remove_link(&self, link: LinkHandle);
}
