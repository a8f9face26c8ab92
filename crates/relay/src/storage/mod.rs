//! Storage traits and implementations
//!
//! This module defines the persistence abstraction used by the relay:
//! a key-value store for the cursor and a staging area for bulk imports.
//! The trait-based design allows swapping between in-memory and SQLite
//! storage.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{KeyStore, RelayStore, StagingStore};
