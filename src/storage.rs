//! Async storage abstraction for swap persistence.
//!
//! Execution state lives in memory while a swap runs; finished (or failed)
//! records are handed to a pluggable [`SwapStorage`] so an embedding
//! application can keep them in any backend (filesystem, database,
//! browser storage) and re-register refunds after a restart.

use crate::client::StoredSwap;
use crate::error::Result;
use std::future::Future;
use std::pin::Pin;

/// Type alias for storage futures.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Typed storage for swap records, keyed by swap id.
pub trait SwapStorage: Send + Sync {
    /// Get a swap record by swap ID.
    ///
    /// Returns `Ok(None)` if the swap doesn't exist.
    fn get(&self, swap_id: &str) -> StorageFuture<'_, Option<StoredSwap>>;

    /// Store a swap record.
    ///
    /// Overwrites any existing record with the same ID.
    fn store(&self, swap_id: &str, data: &StoredSwap) -> StorageFuture<'_, ()>;

    /// Delete a swap record by swap ID.
    ///
    /// Does nothing if the swap doesn't exist.
    fn delete(&self, swap_id: &str) -> StorageFuture<'_, ()>;

    /// List all stored swap IDs.
    fn list(&self) -> StorageFuture<'_, Vec<String>>;

    /// Get all stored swap records.
    fn get_all(&self) -> StorageFuture<'_, Vec<StoredSwap>>;
}
