//! Incremental sync: forward everything published since the cursor

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use super::timing::Pacer;
use crate::delivery::Delivery;
use crate::error::{DeliveryError, FeedError};
use crate::feed::FeedSource;
use crate::format::Formatter;
use crate::models::{ChannelId, Cursor, Post, PostId};
use crate::storage::RelayStore;

/// Tunables for the sync engine
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Account whose feed is relayed
    pub username: String,
    /// Maximum number of posts recovered when the cursor fell out of the
    /// recent window
    pub max_rollback: usize,
    /// Wait applied when the feed API rate-limits without saying for how long
    pub rate_limit_wait: Duration,
    /// Pause between two consecutive sends
    pub send_delay: Duration,
    /// Number of posts fetched to look for the cursor
    pub recent_window: usize,
}

impl SyncOptions {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            max_rollback: 50,
            rate_limit_wait: Duration::from_secs(15 * 60),
            send_delay: Duration::from_secs(3),
            recent_window: 20,
        }
    }
}

/// Which branch a sync cycle took
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncPath {
    /// The feed has no posts at all
    #[default]
    Empty,
    /// No cursor yet: only the newest post was forwarded
    ColdStart,
    /// The cursor is the newest post
    UpToDate,
    /// The cursor was found in the recent window
    FastPath,
    /// The cursor was older than the recent window
    Rollback,
}

/// Statistics from one sync cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub path: SyncPath,
    /// Messages accepted by the channel
    pub forwarded: usize,
    /// Messages the channel refused (not retried)
    pub dropped: usize,
    /// Posts that vanished or became unreadable before they could be fetched
    pub skipped: usize,
    /// Rollback stopped at `max_rollback` or the end of the feed without
    /// reaching the cursor; posts in between were not relayed
    pub rollback_exhausted: bool,
}

/// Outcome of handing one message to the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivered {
    Sent,
    Dropped,
}

/// Ids collected while paging back towards the cursor, newest-first
#[derive(Debug, Default)]
struct RollbackScan {
    ids: Vec<PostId>,
    reached_cursor: bool,
}

/// Fetches, renders and forwards new posts
///
/// All collaborators are injected; the engine itself holds no sync state.
/// The caller owns the [`Cursor`] and passes it to every cycle.
pub struct SyncEngine {
    feed: Arc<dyn FeedSource>,
    delivery: Arc<dyn Delivery>,
    store: Arc<dyn RelayStore>,
    pacer: Arc<dyn Pacer>,
    formatter: Formatter,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(
        feed: Arc<dyn FeedSource>,
        delivery: Arc<dyn Delivery>,
        store: Arc<dyn RelayStore>,
        pacer: Arc<dyn Pacer>,
        formatter: Formatter,
        options: SyncOptions,
    ) -> Self {
        Self {
            feed,
            delivery,
            store,
            pacer,
            formatter,
            options,
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run one sync cycle
    ///
    /// The cursor is advanced and persisted after every forwarded post, so
    /// an error part-way through leaves it at the last post that made it.
    pub fn sync_once(&self, cursor: &mut Cursor) -> Result<SyncReport> {
        let channel = cursor
            .channel_id
            .context("Channel id is not resolved yet")?;
        let mut report = SyncReport::default();

        let recent = self.with_feed_retry("recent posts", || {
            self.feed
                .fetch_recent(&self.options.username, self.options.recent_window)
        })?;
        debug!(
            "Fetched {} recent posts! last_post_id: {:?}",
            recent.len(),
            cursor.last_post_id
        );

        let Some(last) = cursor.last_post_id else {
            // No cursor yet: announce only the newest post
            if let Some(newest) = recent.first() {
                report.path = SyncPath::ColdStart;
                let post = self.complete(newest)?;
                self.forward_post(channel, &post, cursor, &mut report)?;
            }
            return Ok(report);
        };

        match recent.iter().position(|p| p.id == last) {
            Some(0) => report.path = SyncPath::UpToDate,
            Some(index) => {
                debug!("Found last_post_id at index {} of recent posts", index);
                report.path = SyncPath::FastPath;
                for (n, post) in recent[..index].iter().rev().enumerate() {
                    if n > 0 {
                        self.pacer.pause(self.options.send_delay);
                    }
                    let post = self.complete(post)?;
                    self.forward_post(channel, &post, cursor, &mut report)?;
                }
            }
            None => {
                debug!("last_post_id not in recent posts! Rolling back to seek it");
                report.path = SyncPath::Rollback;
                self.roll_back(channel, last, cursor, &mut report)?;
            }
        }

        if report.forwarded > 0 {
            info!("Updated {} statuses!", report.forwarded);
        }
        Ok(report)
    }

    fn roll_back(
        &self,
        channel: ChannelId,
        last: PostId,
        cursor: &mut Cursor,
        report: &mut SyncReport,
    ) -> Result<()> {
        let scan = self.scan_since(last)?;
        if !scan.reached_cursor {
            report.rollback_exhausted = true;
            warn!(
                "Rollback exhausted after {} posts without reaching {}; older posts are not relayed",
                scan.ids.len(),
                last
            );
        }

        for (n, id) in scan.ids.iter().rev().enumerate() {
            if n > 0 {
                self.pacer.pause(self.options.send_delay);
            }
            let post = match self.with_feed_retry("post", || self.feed.fetch_one(*id)) {
                Ok(post) => post,
                Err(e) if e.unreachable_post().is_some() => {
                    warn!("Skipping post {}: {}", id, e);
                    report.skipped += 1;
                    if cursor.advance(*id) {
                        cursor.save_last_post(self.store.as_ref())?;
                    }
                    continue;
                }
                Err(e) => return Err(e).with_context(|| format!("Failed to fetch post {}", id)),
            };
            self.forward_post(channel, &post, cursor, report)?;
        }
        Ok(())
    }

    /// Page back from the feed head collecting ids newer than `last`
    fn scan_since(&self, last: PostId) -> Result<RollbackScan> {
        let mut scan = RollbackScan::default();
        let mut before = None;

        loop {
            let page = self.with_feed_retry("timeline page", || {
                self.feed.fetch_page(&self.options.username, before)
            })?;
            let Some(oldest) = page.last().map(|p| p.id) else {
                return Ok(scan);
            };

            for post in &page {
                if post.id <= last {
                    scan.reached_cursor = true;
                    return Ok(scan);
                }
                if scan.ids.len() >= self.options.max_rollback {
                    return Ok(scan);
                }
                scan.ids.push(post.id);
            }
            before = Some(oldest);
        }
    }

    /// Render, send, then advance and persist the cursor
    fn forward_post(
        &self,
        channel: ChannelId,
        post: &Post,
        cursor: &mut Cursor,
        report: &mut SyncReport,
    ) -> Result<()> {
        let text = self.formatter.render(post);
        match self.deliver(channel, &text)? {
            Delivered::Sent => report.forwarded += 1,
            Delivered::Dropped => report.dropped += 1,
        }
        if cursor.advance(post.id) {
            cursor.save_last_post(self.store.as_ref())?;
        }
        Ok(())
    }

    /// Retry `op` for as long as the feed API rate-limits it
    pub(crate) fn with_feed_retry<T>(
        &self,
        what: &str,
        mut op: impl FnMut() -> Result<T, FeedError>,
    ) -> Result<T, FeedError> {
        loop {
            match op() {
                Err(FeedError::RateLimited { retry_after }) => {
                    let wait = retry_after.unwrap_or(self.options.rate_limit_wait);
                    warn!(
                        "Rate-limited by the feed API while fetching {}! Retrying after {}s..",
                        what,
                        wait.as_secs()
                    );
                    self.pacer.pause(wait);
                }
                other => return other,
            }
        }
    }

    /// Replace list entries that may be incomplete with the full post
    pub(crate) fn complete(&self, post: &Post) -> Result<Post> {
        if !post.needs_full_fetch() {
            return Ok(post.clone());
        }
        match self.with_feed_retry("full post", || self.feed.fetch_one(post.id)) {
            Ok(full) => Ok(full),
            Err(e) if e.unreachable_post().is_some() => {
                warn!("Full content for post {} unavailable ({}), using the listed version", post.id, e);
                Ok(post.clone())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to fetch post {}", post.id)),
        }
    }

    /// Send one message, waiting out rate limits
    pub(crate) fn deliver(&self, channel: ChannelId, text: &str) -> Result<Delivered> {
        loop {
            match self.delivery.send_message(channel, text) {
                Ok(()) => return Ok(Delivered::Sent),
                Err(DeliveryError::RateLimited { retry_after }) => {
                    warn!(
                        "Rate-limited by the messaging API! Retrying after {}s..",
                        retry_after.as_secs()
                    );
                    self.pacer.pause(retry_after);
                }
                Err(DeliveryError::Rejected(reason)) => {
                    warn!("Message rejected ({}), dropping it. Text: {}", reason, text);
                    return Ok(Delivered::Dropped);
                }
                Err(e @ DeliveryError::Transient(_)) => return Err(e.into()),
            }
        }
    }

    pub(crate) fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    pub(crate) fn store(&self) -> &dyn RelayStore {
        self.store.as_ref()
    }

    pub(crate) fn feed(&self) -> &dyn FeedSource {
        self.feed.as_ref()
    }

    pub(crate) fn pacer(&self) -> &dyn Pacer {
        self.pacer.as_ref()
    }
}
