//! Per-codebase persistent state
//!
//! Handles the on-disk side of the lifecycle controller:
//! - Directory layout per target codebase
//! - Single-writer advisory locking
//! - Atomic document writes and wholesale tree replacement
//! - The single-slot metrics store

pub mod fsops;
mod layout;
mod lock;
mod metrics_store;

pub use layout::StorageLayout;
pub use lock::CodebaseLock;
pub use metrics_store::MetricsStore;
