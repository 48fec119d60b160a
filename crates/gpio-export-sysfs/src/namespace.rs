//! Namespace publisher writing a directory tree with symlinks.

use gpio_export_core::{LineHandle, LinkHandle, NamespacePublisher, NodeHandle, PublishError};
use std::fs;
use std::io;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use crate::provider::DEFAULT_SYSFS_ROOT;

/// [`NamespacePublisher`] that materialises the group under `base`.
///
/// ```text
/// <base>/class/<class>/<root>/<line> -> <sysfs>/class/gpio/gpioN
/// <base>/<alias>                     -> <base>/class/<class>/<root>
/// ```
///
/// A line published without `direction_mutable` has its kernel `direction`
/// attribute made read-only, so only `value` stays writable.
///
/// The `<base>/class` directory is removed with the last class if this
/// publisher created it.
#[derive(Debug)]
pub struct SysfsNamespace {
    base: PathBuf,
    gpio_class: PathBuf,
    created_classes_dir: AtomicBool,
}

impl SysfsNamespace {
    /// Publish under `base`, linking line leaves into the sysfs tree at
    /// `sysfs_root`.
    pub fn new(base: impl Into<PathBuf>, sysfs_root: impl AsRef<Path>) -> Self {
        Self {
            base: base.into(),
            gpio_class: sysfs_root.as_ref().join("class/gpio"),
            created_classes_dir: AtomicBool::new(false),
        }
    }

    /// Publish under `base`, linking into `/sys`.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self::new(base, DEFAULT_SYSFS_ROOT)
    }

    /// Directory everything is published under.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.base.join(path)
    }

    fn require(&self, node: &NodeHandle) -> Result<PathBuf, PublishError> {
        let dir = self.resolve(node.path());
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(PublishError::NotFound(node.path().to_string()))
        }
    }

    fn remove_classes_dir(&self) {
        if !self.created_classes_dir.load(Ordering::Acquire) {
            return;
        }
        let classes = self.base.join("class");
        match fs::remove_dir(&classes) {
            Ok(()) => {
                self.created_classes_dir.store(false, Ordering::Release);
                debug!(path = %classes.display(), "Removed");
            }
            Err(err) => {
                debug!(path = %classes.display(), error = %err, "Keeping class directory")
            }
        }
    }

    fn remove_entry(&self, relative: &str) {
        let path = self.resolve(relative);
        let result = match fs::symlink_metadata(&path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir(&path),
            Ok(_) => fs::remove_file(&path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => debug!(path = %path.display(), "Removed"),
            Err(err) => warn!(
                path = %path.display(),
                error = %err,
                "Failed to remove namespace entry"
            ),
        }
    }
}

fn created(relative: String, result: io::Result<()>) -> Result<NodeHandle, PublishError> {
    match result {
        Ok(()) => Ok(NodeHandle::new(relative)),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            Err(PublishError::Exists(relative))
        }
        Err(err) => Err(PublishError::Io(err)),
    }
}

fn is_class_path(path: &str) -> bool {
    path.strip_prefix("class/")
        .is_some_and(|name| !name.is_empty() && !name.contains('/'))
}

impl NamespacePublisher for SysfsNamespace {
    fn create_class(&self, name: &str) -> Result<NodeHandle, PublishError> {
        let classes = self.base.join("class");
        if !classes.is_dir() {
            fs::create_dir_all(&classes)?;
            self.created_classes_dir.store(true, Ordering::Release);
        }

        let relative = format!("class/{}", name);
        created(relative, fs::create_dir(classes.join(name)))
    }

    fn create_node(&self, parent: &NodeHandle, name: &str) -> Result<NodeHandle, PublishError> {
        let dir = self.require(parent)?;
        created(parent.child_path(name), fs::create_dir(dir.join(name)))
    }

    fn create_link(&self, alias: &str, target: &NodeHandle) -> Result<LinkHandle, PublishError> {
        let target_dir = self.require(target)?;
        match symlink(&target_dir, self.base.join(alias)) {
            Ok(()) => Ok(LinkHandle::new(alias, target.path())),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Err(PublishError::Exists(alias.to_string()))
            }
            Err(err) => Err(PublishError::Io(err)),
        }
    }

    fn publish_line(
        &self,
        parent: &NodeHandle,
        name: &str,
        line: &LineHandle,
        direction_mutable: bool,
    ) -> Result<NodeHandle, PublishError> {
        let dir = self.require(parent)?;
        let kernel_dir = self.gpio_class.join(format!("gpio{}", line.line()));
        if !direction_mutable {
            let attr = kernel_dir.join("direction");
            fs::set_permissions(&attr, fs::Permissions::from_mode(0o444))?;
            debug!(line = name, path = %attr.display(), "Direction locked");
        }
        debug!(
            line = name,
            target = %kernel_dir.display(),
            direction_mutable,
            "Linking line"
        );
        created(parent.child_path(name), symlink(&kernel_dir, dir.join(name)))
    }

    fn remove_node(&self, node: NodeHandle) {
        self.remove_entry(node.path());
        if is_class_path(node.path()) {
            self.remove_classes_dir();
        }
    }

    fn remove_link(&self, link: LinkHandle) {
        self.remove_entry(link.alias());
    }
}
