//! Common infrastructure for the mock collaborators.
//!
//! - **calls**: Shared, ordered record of every collaborator call
//! - **errors**: Error injection scenarios

pub mod calls;
pub mod errors;

// Re-export commonly used types
pub use calls::{Call, CallLog};
pub use errors::{ErrorConfig, ErrorScenario};
