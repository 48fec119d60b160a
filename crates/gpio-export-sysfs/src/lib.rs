//! Linux sysfs collaborators for gpio-export.
//!
//! - [`SysfsLineProvider`] acquires lines through the legacy
//!   `/sys/class/gpio` interface (`export`, `gpioN/direction`, `gpioN/value`).
//! - [`SysfsNamespace`] publishes the group as a directory tree with
//!   symbolic links: the alias points at the root directory and every line
//!   leaf points at the kernel's own `gpioN` directory.
//!
//! Both take their root directories as parameters so tests can run against
//! a fake tree in a temporary directory.

mod namespace;
mod provider;

pub use namespace::SysfsNamespace;
pub use provider::{SysfsLineProvider, DEFAULT_SYSFS_ROOT};
