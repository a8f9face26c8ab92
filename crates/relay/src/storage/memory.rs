//! In-memory storage implementation
//!
//! Used in tests and as the fallback when the database cannot be opened.
//! Nothing survives a restart.

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use super::{KeyStore, StagingStore};

/// In-memory implementation of the relay stores
#[derive(Default)]
pub struct InMemoryStore {
    values: RwLock<HashMap<String, String>>,
    staging: RwLock<BTreeMap<u32, String>>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.read().unwrap();
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.write().unwrap();
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl StagingStore for InMemoryStore {
    fn create_staging_page(&self, seq: u32, value: &str) -> Result<()> {
        let mut staging = self.staging.write().unwrap();
        staging.insert(seq, value.to_string());
        Ok(())
    }

    fn read_staging_page(&self, seq: u32) -> Result<Option<String>> {
        let staging = self.staging.read().unwrap();
        Ok(staging.get(&seq).cloned())
    }

    fn delete_staging_page(&self, seq: u32) -> Result<()> {
        let mut staging = self.staging.write().unwrap();
        staging.remove(&seq);
        Ok(())
    }

    fn staging_page_count(&self) -> Result<usize> {
        let staging = self.staging.read().unwrap();
        Ok(staging.len())
    }

    fn drop_staging(&self) -> Result<()> {
        let mut staging = self.staging.write().unwrap();
        staging.clear();
        Ok(())
    }
}
