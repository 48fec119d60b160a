//! Mock namespace publisher (sysfs-like).
//!
//! Keeps the published tree in memory so tests can check exactly what is
//! visible after a call. Removing a node that still has children is counted
//! as a nesting violation instead of being refused, so tests can assert the
//! engine never does it.

use gpio_export_core::{
    LineHandle, LineId, LinkHandle, NamespacePublisher, NodeHandle, PublishError,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::common::{Call, CallLog, ErrorConfig};

#[derive(Debug, Default)]
struct Tree {
    nodes: BTreeSet<String>,
    leaves: BTreeMap<String, LineId>,
    links: BTreeMap<String, String>,
    violations: usize,
}

/// Mock [`NamespacePublisher`] with call recording and error injection.
#[derive(Debug, Default)]
pub struct MockNamespace {
    tree: Mutex<Tree>,
    errors: ErrorConfig,
    log: CallLog,
}

impl MockNamespace {
    /// Empty namespace with its own log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty namespace recording into `log`.
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    /// Inject failures.
    pub fn with_errors(mut self, errors: ErrorConfig) -> Self {
        self.errors = errors;
        self
    }

    /// Shared call record.
    pub fn log(&self) -> &CallLog {
        &self.log
    }

    /// Number of visible nodes and links.
    pub fn node_count(&self) -> usize {
        let tree = self.tree.lock();
        tree.nodes.len() + tree.links.len()
    }

    /// Whether a node exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.tree.lock().nodes.contains(path)
    }

    /// Target of alias `alias`, if published.
    pub fn link_target(&self, alias: &str) -> Option<String> {
        self.tree.lock().links.get(alias).cloned()
    }

    /// Line behind the leaf at `path`, if published.
    pub fn leaf_line(&self, path: &str) -> Option<LineId> {
        self.tree.lock().leaves.get(path).copied()
    }

    /// Removals of nodes that still had children, or links to removed nodes.
    pub fn nesting_violations(&self) -> usize {
        self.tree.lock().violations
    }

    fn insert(&self, path: String, name: &str) -> Result<NodeHandle, PublishError> {
        self.errors.check_publish(name)?;

        let mut tree = self.tree.lock();
        if tree.nodes.contains(&path) {
            return Err(PublishError::Exists(path));
        }
        tree.nodes.insert(path.clone());
        Ok(NodeHandle::new(path))
    }

    fn require(&self, node: &NodeHandle) -> Result<(), PublishError> {
        if self.contains(node.path()) {
            Ok(())
        } else {
            Err(PublishError::NotFound(node.path().to_string()))
        }
    }
}

impl NamespacePublisher for MockNamespace {
    fn create_class(&self, name: &str) -> Result<NodeHandle, PublishError> {
        let node = self.insert(format!("class/{}", name), name)?;
        self.log.record(Call::CreateClass {
            path: node.path().to_string(),
        });
        Ok(node)
    }

    fn create_node(&self, parent: &NodeHandle, name: &str) -> Result<NodeHandle, PublishError> {
        self.require(parent)?;
        let node = self.insert(parent.child_path(name), name)?;
        self.log.record(Call::CreateNode {
            path: node.path().to_string(),
        });
        Ok(node)
    }

    fn create_link(&self, alias: &str, target: &NodeHandle) -> Result<LinkHandle, PublishError> {
        self.require(target)?;
        self.errors.check_publish(alias)?;

        let mut tree = self.tree.lock();
        if tree.links.contains_key(alias) {
            return Err(PublishError::Exists(alias.to_string()));
        }
        tree.links.insert(alias.to_string(), target.path().to_string());
        drop(tree);

        self.log.record(Call::CreateLink {
            alias: alias.to_string(),
        });
        Ok(LinkHandle::new(alias, target.path()))
    }

    fn publish_line(
        &self,
        parent: &NodeHandle,
        name: &str,
        line: &LineHandle,
        direction_mutable: bool,
    ) -> Result<NodeHandle, PublishError> {
        self.require(parent)?;
        let node = self.insert(parent.child_path(name), name)?;
        self.tree
            .lock()
            .leaves
            .insert(node.path().to_string(), line.line());

        debug!(path = node.path(), line = %line.line(), direction_mutable, "Mock line published");
        self.log.record(Call::PublishLine {
            path: node.path().to_string(),
        });
        Ok(node)
    }

    fn remove_node(&self, node: NodeHandle) {
        let path = node.path().to_string();
        let mut tree = self.tree.lock();

        let prefix = format!("{}/", path);
        let has_children = tree.nodes.iter().any(|n| n.starts_with(&prefix));
        let is_linked = tree.links.values().any(|t| *t == path);
        if has_children || is_linked {
            tree.violations += 1;
        }

        tree.nodes.remove(&path);
        tree.leaves.remove(&path);
        drop(tree);

        self.log.record(Call::RemoveNode { path });
    }

    fn remove_link(&self, link: LinkHandle) {
        self.tree.lock().links.remove(link.alias());
        self.log.record(Call::RemoveLink {
            alias: link.alias().to_string(),
        });
    }
}
