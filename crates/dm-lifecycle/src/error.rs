//! Lifecycle error types.

use thiserror::Error;

use dm_store::StoreError;

/// Errors that abort a QA cycle.
///
/// Per-identifier failures (a move that fails, a checklist row naming an
/// unknown variable) are logged and reported instead.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
