//! Storage trait definitions

use anyhow::Result;

/// Durable key-value mapping holding the relay cursor
pub trait KeyStore: Send + Sync {
    /// Get the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or update the value under `key`
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Temporary staging area used by the bulk importer
///
/// Pages are keyed by a sequence number starting at 1. The whole area is
/// expected to be dropped once an import finishes.
pub trait StagingStore: Send + Sync {
    /// Store (or replace) the page under `seq`
    fn create_staging_page(&self, seq: u32, value: &str) -> Result<()>;

    /// Read the page under `seq`, `None` if it was never written
    fn read_staging_page(&self, seq: u32) -> Result<Option<String>>;

    /// Remove a single page once it has been consumed
    fn delete_staging_page(&self, seq: u32) -> Result<()>;

    /// Number of pages currently staged
    fn staging_page_count(&self) -> Result<usize>;

    /// Drop the entire staging area
    fn drop_staging(&self) -> Result<()>;
}

/// Everything the relay needs from persistence
pub trait RelayStore: KeyStore + StagingStore {}

impl<T: KeyStore + StagingStore> RelayStore for T {}
