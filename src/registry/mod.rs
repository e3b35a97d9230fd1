//! Versioned artifact ledger and rollback
//!
//! The registry owns the ledger document and version storage for one codebase;
//! rollback moves its active pointer and re-materializes stored versions.

mod rollback;
mod version_registry;
pub mod workspace;

pub use rollback::{RollbackController, RollbackHistoryEntry};
pub use version_registry::VersionRegistry;
