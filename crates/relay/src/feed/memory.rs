//! In-memory feed used by tests and local dry runs
//!
//! Serves a fixed list of posts with the same paging rules as the real
//! API, records every call, and can be scripted to fail.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::FeedSource;
use crate::error::FeedError;
use crate::models::{Post, PostId};

/// Default number of posts per page, matching the timeline endpoint
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// A feed call as observed by [`InMemoryFeed`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCall {
    Recent(usize),
    Page(Option<PostId>),
    One(PostId),
}

impl FeedCall {
    fn kind(&self) -> FeedCallKind {
        match self {
            FeedCall::Recent(_) => FeedCallKind::Recent,
            FeedCall::Page(_) => FeedCallKind::Page,
            FeedCall::One(_) => FeedCallKind::One,
        }
    }
}

/// Call category used to target scripted failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedCallKind {
    Recent,
    Page,
    One,
}

/// In-memory implementation of FeedSource
pub struct InMemoryFeed {
    /// Posts sorted newest-first
    posts: Mutex<Vec<Post>>,
    page_size: usize,
    calls: Mutex<Vec<FeedCall>>,
    failures: Mutex<VecDeque<(FeedCallKind, FeedError)>>,
}

impl InMemoryFeed {
    /// Create a feed from posts in any order
    pub fn new(posts: Vec<Post>) -> Self {
        Self::with_page_size(posts, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(mut posts: Vec<Post>, page_size: usize) -> Self {
        posts.sort_by(|a, b| b.id.cmp(&a.id));
        Self {
            posts: Mutex::new(posts),
            page_size: page_size.max(1),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Publish a new post at the head of the feed
    pub fn publish(&self, post: Post) {
        let mut posts = self.posts.lock().unwrap();
        posts.push(post);
        posts.sort_by(|a, b| b.id.cmp(&a.id));
    }

    /// Fail the next call of `kind` with `error`
    ///
    /// Failures queue up in order; calls of other kinds are unaffected.
    pub fn fail_next(&self, kind: FeedCallKind, error: FeedError) {
        self.failures.lock().unwrap().push_back((kind, error));
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<FeedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: FeedCall) -> Result<(), FeedError> {
        let kind = call.kind();
        self.calls.lock().unwrap().push(call);

        let mut failures = self.failures.lock().unwrap();
        if let Some(pos) = failures.iter().position(|(k, _)| *k == kind)
            && let Some((_, error)) = failures.remove(pos)
        {
            return Err(error);
        }
        Ok(())
    }
}

impl FeedSource for InMemoryFeed {
    fn fetch_recent(&self, _username: &str, limit: usize) -> Result<Vec<Post>, FeedError> {
        self.record(FeedCall::Recent(limit))?;
        let posts = self.posts.lock().unwrap();
        Ok(posts.iter().take(limit).cloned().collect())
    }

    fn fetch_page(&self, _username: &str, before: Option<PostId>) -> Result<Vec<Post>, FeedError> {
        self.record(FeedCall::Page(before))?;
        let posts = self.posts.lock().unwrap();
        Ok(posts
            .iter()
            .filter(|p| before.is_none_or(|b| p.id < b))
            .take(self.page_size)
            .cloned()
            .collect())
    }

    fn fetch_one(&self, id: PostId) -> Result<Post, FeedError> {
        self.record(FeedCall::One(id))?;
        let posts = self.posts.lock().unwrap();
        posts
            .iter()
            .find(|p| p.id == id)
            .map(|p| Post {
                truncated: false,
                ..p.clone()
            })
            .ok_or(FeedError::NotFound(id))
    }
}
