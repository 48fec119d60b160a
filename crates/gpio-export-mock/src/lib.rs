//! Mock collaborators for gpio-export
//!
//! This crate provides simulated collaborators for testing and dry runs
//! without GPIO hardware or a writable namespace.
//!
//! # Available Mocks
//!
//! - [`MockLineProvider`] - Simulated GPIO controllers with per-line state
//! - [`MockNamespace`] - In-memory published node tree
//!
//! Both record every call into a [`CallLog`]. Give them the same log to see
//! acquisition, publication and rollback as one ordered sequence:
//!
//! ```rust
//! use gpio_export_mock::{CallLog, MockLineProvider, MockNamespace};
//!
//! let log = CallLog::new();
//! let provider = MockLineProvider::builder()
//!     .chip("gpiochip0", 0, 32)
//!     .log(log.clone())
//!     .build();
//! let namespace = MockNamespace::with_log(log.clone());
//! # drop((provider, namespace));
//! ```
//!
//! Failures are injected with [`ErrorConfig`] scenarios.

pub mod common;
mod mock_namespace;
mod mock_provider;

// Re-export common types
pub use common::{Call, CallLog, ErrorConfig, ErrorScenario};

// Re-export collaborator types
pub use mock_namespace::MockNamespace;
pub use mock_provider::{MockChip, MockLineProvider, MockLineProviderBuilder};
