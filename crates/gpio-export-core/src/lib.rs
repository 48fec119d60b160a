//! `gpio-export-core`
//!
//! Core types and collaborator traits for the gpio-export line exporter.
//!
//! The exporter walks a declarative list of GPIO lines, acquires each one
//! from a [`LineProvider`], and publishes it under a [`NamespacePublisher`]
//! so that other processes can find and drive the line by name. This crate
//! holds everything the engine, the collaborators and the tests share:
//!
//! - **Line model**: [`LineSpec`], [`Direction`], [`Level`], [`SourceRef`],
//!   [`LineId`] and the provider-issued [`LineHandle`]
//! - **Capabilities**: the [`LineProvider`] and [`NamespacePublisher`] traits
//!   plus the publisher tokens [`NodeHandle`] and [`LinkHandle`]
//! - **Declarations**: [`LineDeclaration`] decoding into a validated
//!   [`LineSpecificationSet`]
//! - **Attributes**: the textual `value`/`direction` codec in [`attribute`]
//! - **Errors**: the full taxonomy in [`error`]
//!
//! ## Example
//!
//! ```rust
//! use gpio_export_core::{LineDeclaration, LineSpecificationSet, SourceRef};
//!
//! let decls = vec![LineDeclaration {
//!     label: Some("led1".into()),
//!     gpios: Some(SourceRef::new("gpiochip0", 17)),
//!     direction: Some("low".into()),
//!     direction_may_change: false,
//! }];
//!
//! let set = LineSpecificationSet::decode(&decls);
//! assert_eq!(set.len(), 1);
//! assert!(set.rejected().is_empty());
//! ```

pub mod attribute;
pub mod capabilities;
pub mod declaration;
pub mod error;
pub mod line;

pub use capabilities::{LineProvider, LinkHandle, NamespacePublisher, NodeHandle};
pub use declaration::{LineDeclaration, LineSpecificationSet, RejectedDeclaration};
pub use error::{AccessError, DecodeError, EntryError, ProviderError, PublishError, SetupError};
pub use line::{Direction, Level, LineHandle, LineId, LineSpec, SourceRef};
