//! Reverse-ordered rollback ledger.
//!
//! Every resource the engine creates is pushed onto a [`Ledger`] the moment
//! it exists. Unwinding pops and releases entries last-in, first-out, so a
//! child is always gone before its parent. Success, fatal abort and teardown
//! all leave through [`Ledger::unwind`]; dropping a ledger unwinds it too.
//!
//! A line that has been acquired but not yet published is not on the
//! ledger; [`publish_or_release`] returns its handle to the provider when
//! publication fails.

use gpio_export_core::{
    LineHandle, LineProvider, LinkHandle, NamespacePublisher, NodeHandle, PublishError,
};
use std::sync::Arc;
use tracing::debug;

use crate::group::AcquiredLine;

/// A resource owned by an export group.
pub(crate) enum Resource {
    /// Class registration or plain node
    Node(NodeHandle),
    /// Alias link
    Link(LinkHandle),
    /// Acquired and published line
    Line(Arc<AcquiredLine>),
}

pub(crate) struct Ledger {
    publisher: Arc<dyn NamespacePublisher>,
    entries: Vec<Resource>,
}

impl Ledger {
    pub(crate) fn new(publisher: Arc<dyn NamespacePublisher>) -> Self {
        Self {
            publisher,
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, resource: Resource) {
        self.entries.push(resource);
    }

    /// Most recently pushed node.
    pub(crate) fn last_node(&self) -> Option<&NodeHandle> {
        self.entries.iter().rev().find_map(|r| match r {
            Resource::Node(node) => Some(node),
            _ => None,
        })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release everything, newest first. Calling it again is a no-op.
    pub(crate) fn unwind(&mut self) {
        while let Some(resource) = self.entries.pop() {
            match resource {
                Resource::Line(line) => {
                    line.release();
                }
                Resource::Link(link) => {
                    debug!(alias = link.alias(), "Removing alias link");
                    self.publisher.remove_link(link);
                }
                Resource::Node(node) => {
                    debug!(path = node.path(), "Removing node");
                    self.publisher.remove_node(node);
                }
            }
        }
    }
}

impl Drop for Ledger {
    fn drop(&mut self) {
        self.unwind();
    }
}

/// Publish a freshly acquired line, or give the handle straight back to the
/// provider if publication fails. No `AcquiredLine` exists in between.
pub(crate) fn publish_or_release(
    provider: &dyn LineProvider,
    publisher: &dyn NamespacePublisher,
    parent: &NodeHandle,
    name: &str,
    handle: LineHandle,
    direction_mutable: bool,
) -> Result<(LineHandle, NodeHandle), PublishError> {
    match publisher.publish_line(parent, name, &handle, direction_mutable) {
        Ok(node) => Ok((handle, node)),
        Err(err) => {
            debug!(line = %handle.line(), "Releasing unpublished line");
            provider.release(handle);
            Err(err)
        }
    }
}
