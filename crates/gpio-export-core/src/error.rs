//! Error types for line export.
//!
//! Errors are split by who raises them and how far they travel:
//!
//! - **Collaborator errors** - [`ProviderError`] from the line provider and
//!   [`PublishError`] from the namespace publisher.
//! - **Per-entry errors** - [`DecodeError`] and [`EntryError`]. These are
//!   reported and the entry is skipped; the rest of the group carries on.
//! - **Group errors** - [`SetupError`]. Terminal for one `setup` call and
//!   always preceded by a full rollback.
//! - **Access errors** - [`AccessError`], returned to whoever reads or
//!   writes an exported line.

use thiserror::Error;

use crate::line::{LineId, SourceRef};

/// Errors raised by a line provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The source reference or line id does not name a usable line
    #[error("Invalid line {line}: {reason}")]
    InvalidLine { line: String, reason: String },

    /// The line is already held by someone else
    #[error("Line {line} is busy")]
    Busy { line: LineId },

    /// A dependency of the provider is not ready yet; try again later
    #[error("Line provider not ready: {reason}")]
    Deferred { reason: String },

    /// The line misbehaved while being configured or accessed
    #[error("Line {line} fault: {message}")]
    Fault { line: LineId, message: String },

    /// I/O error from the underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Check if this is a "retry later" signal.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred { .. })
    }
}

/// Errors raised by a namespace publisher.
#[derive(Error, Debug)]
pub enum PublishError {
    /// A node or link with this name already exists
    #[error("Node '{0}' already exists")]
    Exists(String),

    /// The parent or target node does not exist
    #[error("Node '{0}' not found")]
    NotFound(String),

    /// The publisher refused the node for a reason of its own
    #[error("Namespace rejected '{name}': {reason}")]
    Rejected { name: String, reason: String },

    /// I/O error from the backing store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a declaration was rejected before or at resolution.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Entry has no label (or an empty one)
    #[error("declaration has no label")]
    MissingLabel,

    /// Label cannot be used as a node name
    #[error("label '{label}' is not a valid node name")]
    InvalidLabel { label: String },

    /// Entry has no source reference
    #[error("line '{label}' has no gpios reference")]
    MissingSource { label: String },

    /// Direction token is not one of input/output/low/high
    #[error("line '{label}' has invalid direction '{token}'")]
    InvalidDirection { label: String, token: String },

    /// Another entry already uses this label
    #[error("line '{label}' is declared more than once")]
    DuplicateLabel { label: String },

    /// The provider could not resolve the source reference
    #[error("line '{label}' source {source_ref} cannot be resolved: {cause}")]
    Unresolved {
        label: String,
        source_ref: SourceRef,
        #[source]
        cause: ProviderError,
    },
}

/// Per-entry failure during setup. The entry is skipped, setup continues.
#[derive(Error, Debug)]
pub enum EntryError {
    /// Declaration invalid or unresolvable
    #[error("invalid specification: {0}")]
    SpecInvalid(#[from] DecodeError),

    /// Provider refused the line
    #[error("acquire failed: {0}")]
    AcquireFailed(#[source] ProviderError),

    /// Namespace node creation failed after a successful acquire
    #[error("publish failed: {0}")]
    PublishFailed(#[source] PublishError),
}

/// Terminal failure of a group setup.
///
/// By the time one of these is returned every resource acquired during the
/// call has been released.
#[derive(Error, Debug)]
pub enum SetupError {
    /// The provider is not ready for `line`; the whole group was rolled back
    #[error("Setup deferred at line '{line}': {cause}")]
    AcquireDeferred {
        line: String,
        #[source]
        cause: ProviderError,
    },

    /// No declared line survived setup
    #[error("No lines exported ({declared} declared, {skipped} skipped)")]
    NoLinesExported { declared: usize, skipped: usize },

    /// Creating the class, root node or alias link failed
    #[error("Namespace setup failed: {0}")]
    Namespace(#[from] PublishError),
}

impl SetupError {
    /// Whether the caller should invoke setup again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AcquireDeferred { .. })
    }
}

/// Errors returned by the value access surface of an exported line.
#[derive(Error, Debug)]
pub enum AccessError {
    /// Write attempted on a line currently configured as input
    #[error("Line '{line}' is an input and cannot be written")]
    ReadOnly { line: String },

    /// Underlying provider failed the access
    #[error("Provider fault: {0}")]
    ProviderFault(#[from] ProviderError),

    /// Attribute text could not be parsed
    #[error("Malformed input '{0}'")]
    Malformed(String),

    /// Direction change requested on a line exported with a fixed direction
    #[error("Direction of line '{line}' cannot be changed")]
    DirectionFixed { line: String },

    /// No exported line has this name
    #[error("Unknown line '{0}'")]
    UnknownLine(String),

    /// The line was torn down
    #[error("Line '{line}' has been released")]
    Released { line: String },
}
