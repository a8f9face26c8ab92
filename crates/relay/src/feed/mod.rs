//! Feed sources
//!
//! The sync engine only sees the [`FeedSource`] trait; the Twitter client
//! and the in-memory feed both implement it.

mod memory;
mod traits;

pub use memory::{DEFAULT_PAGE_SIZE, FeedCall, FeedCallKind, InMemoryFeed};
pub use traits::FeedSource;
