//! Feed source trait definition

use crate::error::FeedError;
use crate::models::{Post, PostId};

/// Read-only access to an account's post feed
///
/// All listings are ordered newest-first.
pub trait FeedSource: Send + Sync {
    /// The `limit` most recent posts of `username`
    fn fetch_recent(&self, username: &str, limit: usize) -> Result<Vec<Post>, FeedError>;

    /// One page of posts strictly older than `before` (or the newest page
    /// when `before` is `None`). An empty page means the feed is exhausted.
    fn fetch_page(&self, username: &str, before: Option<PostId>) -> Result<Vec<Post>, FeedError>;

    /// A single post with its full, untruncated content
    fn fetch_one(&self, id: PostId) -> Result<Post, FeedError>;
}
