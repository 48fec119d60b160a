//! `gpio-export`
//!
//! Declarative GPIO line exporter.
//!
//! Given a list of line declarations, the [`Exporter`] acquires every valid
//! line from a [`LineProvider`] and publishes it by name through a
//! [`NamespacePublisher`]. The result is an [`ExportGroup`] that owns all of
//! it and gives value access to each line until it is torn down.
//!
//! Setup is transactional: when it fails, everything it created has been
//! released again, newest first, before the error is returned.
//!
//! ## Example
//!
//! ```rust,ignore
//! use gpio_export::{load_config, ExportConfig};
//!
//! let config = load_config(Path::new("/etc/gpio-export.toml"))?;
//! let exporter = config.exporter(provider, publisher);
//! let mut group = exporter.setup(config.specification_set(), config.export.alias.as_deref())?;
//!
//! group.write("led1", Level::High)?;
//! group.teardown();
//! ```
//!
//! [`LineProvider`]: gpio_export_core::LineProvider
//! [`NamespacePublisher`]: gpio_export_core::NamespacePublisher

pub mod config;
pub mod engine;
pub mod group;
mod ledger;

pub use config::{load_config, ConfigLoadError, ExportConfig, ExportSection, SysfsSection};
pub use engine::{setup, Exporter, DEFAULT_ALIAS, DEFAULT_CLASS, DEFAULT_ROOT};
pub use group::{AcquiredLine, ExportGroup, SkippedLine};

pub use gpio_export_core::{
    AccessError, Direction, EntryError, Level, LineDeclaration, LineSpec, LineSpecificationSet,
    SetupError, SourceRef,
};
