//! Relay cursor: the last forwarded post and the target channel
//!
//! Persisted as plain key-value pairs so it survives restarts.

use anyhow::Result;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::PostId;
use crate::storage::KeyStore;

/// Store key holding the id of the last forwarded post
pub const LAST_POST_KEY: &str = "last_statusid";
/// Store key holding the resolved channel id
pub const CHANNEL_ID_KEY: &str = "channel_id";

/// Identifier of the destination channel on the messaging platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub i64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChannelId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ChannelId)
    }
}

/// Sync position of the relay
///
/// `last_post_id` only ever moves forward; see [`Cursor::advance`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub last_post_id: Option<PostId>,
    pub channel_id: Option<ChannelId>,
}

impl Cursor {
    pub fn new(last_post_id: Option<PostId>, channel_id: Option<ChannelId>) -> Self {
        Self {
            last_post_id,
            channel_id,
        }
    }

    /// Load the cursor from the store
    ///
    /// Values that fail to parse are logged and treated as missing, so a
    /// corrupt entry degrades to a cold start instead of blocking startup.
    pub fn load<S: KeyStore + ?Sized>(store: &S) -> Result<Self> {
        let last_post_id = parse_stored::<PostId, S>(store, LAST_POST_KEY)?;
        let channel_id = parse_stored::<ChannelId, S>(store, CHANNEL_ID_KEY)?;
        debug!(
            "Loaded cursor: last_post_id={:?}, channel_id={:?}",
            last_post_id, channel_id
        );
        Ok(Self {
            last_post_id,
            channel_id,
        })
    }

    /// Move the cursor to `id` if it is newer than the current position
    ///
    /// Returns `true` when the cursor changed.
    pub fn advance(&mut self, id: PostId) -> bool {
        match self.last_post_id {
            Some(current) if current >= id => false,
            _ => {
                self.last_post_id = Some(id);
                true
            }
        }
    }

    /// Persist the last forwarded post id
    pub fn save_last_post<S: KeyStore + ?Sized>(&self, store: &S) -> Result<()> {
        if let Some(id) = self.last_post_id {
            store.set(LAST_POST_KEY, &id.to_string())?;
        }
        Ok(())
    }

    /// Persist the channel id
    pub fn save_channel<S: KeyStore + ?Sized>(&self, store: &S) -> Result<()> {
        if let Some(id) = self.channel_id {
            store.set(CHANNEL_ID_KEY, &id.to_string())?;
        }
        Ok(())
    }
}

fn parse_stored<T: FromStr, S: KeyStore + ?Sized>(store: &S, key: &str) -> Result<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match raw.parse::<T>() {
        Ok(value) => Ok(Some(value)),
        Err(_) => {
            warn!("Ignoring corrupt stored value for '{}': {:?}", key, raw);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    #[test]
    fn test_advance_is_monotonic() {
        let mut cursor = Cursor::default();
        assert!(cursor.advance(PostId::new(10)));
        assert!(!cursor.advance(PostId::new(5)));
        assert!(!cursor.advance(PostId::new(10)));
        assert!(cursor.advance(PostId::new(11)));
        assert_eq!(cursor.last_post_id, Some(PostId::new(11)));
    }

    #[test]
    fn test_load_and_save_roundtrip() {
        let store = InMemoryStore::new();
        let cursor = Cursor::new(Some(PostId::new(77)), Some(ChannelId(-100123)));
        cursor.save_last_post(&store).unwrap();
        cursor.save_channel(&store).unwrap();

        assert_eq!(store.get(LAST_POST_KEY).unwrap().as_deref(), Some("77"));
        assert_eq!(Cursor::load(&store).unwrap(), cursor);
    }

    #[test]
    fn test_load_ignores_corrupt_values() {
        let store = InMemoryStore::new();
        store.set(LAST_POST_KEY, "not-a-number").unwrap();
        store.set(CHANNEL_ID_KEY, "-42").unwrap();

        let cursor = Cursor::load(&store).unwrap();
        assert_eq!(cursor.last_post_id, None);
        assert_eq!(cursor.channel_id, Some(ChannelId(-42)));
    }

    #[test]
    fn test_save_without_values_writes_nothing() {
        let store = InMemoryStore::new();
        Cursor::default().save_last_post(&store).unwrap();
        Cursor::default().save_channel(&store).unwrap();
        assert!(store.get(LAST_POST_KEY).unwrap().is_none());
        assert!(store.get(CHANNEL_ID_KEY).unwrap().is_none());
    }
}
