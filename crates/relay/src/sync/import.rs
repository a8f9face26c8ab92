//! Bulk import ("dig"): backfill older posts into the channel
//!
//! Runs in two phases. The fetch phase pages the feed newest to oldest and
//! stages rendered messages page by page; the drain phase replays the
//! staged pages oldest first. Staging keeps the fetch and send rates
//! independent and lets a killed run be cleaned up on the next start.

use anyhow::{Context, Result, bail};
use log::{debug, error, info, warn};

use super::engine::{Delivered, SyncEngine};
use super::timing::Shutdown;
use crate::models::{ChannelId, PostId};
use crate::storage::RelayStore;

/// How far back an import goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportTarget {
    /// The `n` most recent posts
    Count(usize),
    /// Everything the feed still serves
    All,
}

impl ImportTarget {
    fn remaining(self, fetched: usize) -> usize {
        match self {
            ImportTarget::Count(n) => n.saturating_sub(fetched),
            ImportTarget::All => usize::MAX,
        }
    }
}

/// Statistics from one import
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Posts fetched and staged
    pub fetched: usize,
    /// Messages accepted by the channel
    pub forwarded: usize,
    /// Messages the channel refused
    pub dropped: usize,
    /// Staged pages that were missing or unreadable at drain time
    pub corrupt_pages: usize,
    /// Pages staged during the fetch phase
    pub pages: u32,
    /// Newest post seen; the caller moves the live cursor here
    pub newest_id: Option<PostId>,
    /// Oldest post imported
    pub terminal_id: Option<PostId>,
}

/// Drops the staging area when the import ends, whichever way it ends
struct StagingGuard<'a> {
    store: &'a dyn RelayStore,
}

impl Drop for StagingGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store.drop_staging() {
            error!("Failed to drop staging area: {:#}", e);
        }
    }
}

/// Batch importer borrowing the engine's collaborators
pub struct BulkImporter<'a> {
    engine: &'a SyncEngine,
    shutdown: Option<&'a Shutdown>,
}

impl<'a> BulkImporter<'a> {
    pub fn new(engine: &'a SyncEngine) -> Self {
        Self {
            engine,
            shutdown: None,
        }
    }

    /// Abort between pages and sends once `shutdown` is requested
    pub fn with_shutdown(mut self, shutdown: &'a Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn check_shutdown(&self) -> Result<()> {
        if self.shutdown.is_some_and(Shutdown::is_requested) {
            bail!("Import interrupted by shutdown");
        }
        Ok(())
    }

    /// Import up to `target` posts into `channel`, oldest first
    ///
    /// The live cursor is not touched; see [`ImportReport::newest_id`].
    pub fn import_batch(&self, channel: ChannelId, target: ImportTarget) -> Result<ImportReport> {
        let store = self.engine.store();

        let leftover = store.staging_page_count()?;
        if leftover > 0 {
            warn!(
                "Discarding {} staged pages left behind by an interrupted import",
                leftover
            );
        }
        store.drop_staging().context("Failed to clear staging area")?;
        let _guard = StagingGuard { store };

        let mut report = ImportReport::default();
        self.fetch_pages(target, &mut report)?;
        info!(
            "Staged {} posts in {} pages, sending them now",
            report.fetched, report.pages
        );
        self.drain_pages(channel, &mut report)?;

        info!(
            "Import finished: {} forwarded, {} dropped, {} corrupt pages",
            report.forwarded, report.dropped, report.corrupt_pages
        );
        Ok(report)
    }

    fn fetch_pages(&self, target: ImportTarget, report: &mut ImportReport) -> Result<()> {
        let engine = self.engine;
        let username = &engine.options().username;
        let mut before = None;

        loop {
            let remaining = target.remaining(report.fetched);
            if remaining == 0 {
                break;
            }
            self.check_shutdown()?;

            let page = engine
                .with_feed_retry("timeline page", || engine.feed().fetch_page(username, before))
                .context("Failed to fetch timeline page")?;
            let Some(oldest) = page.last().map(|p| p.id) else {
                debug!("Reached the end of the feed");
                break;
            };
            if report.newest_id.is_none() {
                report.newest_id = page.first().map(|p| p.id);
            }

            let page = &page[..page.len().min(remaining)];
            let rendered = page
                .iter()
                .map(|post| Ok(engine.formatter().render(&engine.complete(post)?)))
                .collect::<Result<Vec<String>>>()?;

            let seq = report.pages + 1;
            let json = serde_json::to_string(&rendered).context("Failed to encode staged page")?;
            engine.store().create_staging_page(seq, &json)?;
            report.pages = seq;
            report.fetched += page.len();
            report.terminal_id = page.last().map(|p| p.id);
            debug!("Staged page {} with {} posts", seq, page.len());

            before = Some(oldest);
        }
        Ok(())
    }

    fn drain_pages(&self, channel: ChannelId, report: &mut ImportReport) -> Result<()> {
        let engine = self.engine;
        let store = engine.store();
        let mut first = true;

        for seq in (1..=report.pages).rev() {
            let Some(messages) = read_page(store, seq)? else {
                report.corrupt_pages += 1;
                store.delete_staging_page(seq)?;
                continue;
            };

            for text in messages.iter().rev() {
                if !first {
                    engine.pacer().pause(engine.options().send_delay);
                }
                first = false;
                self.check_shutdown()?;
                match engine.deliver(channel, text)? {
                    Delivered::Sent => report.forwarded += 1,
                    Delivered::Dropped => report.dropped += 1,
                }
            }
            store.delete_staging_page(seq)?;
            debug!("Drained page {}", seq);
        }
        Ok(())
    }
}

/// Read and decode one staged page; `None` if missing or corrupt
fn read_page(store: &dyn RelayStore, seq: u32) -> Result<Option<Vec<String>>> {
    let Some(raw) = store.read_staging_page(seq)? else {
        warn!("Staged page {} is missing, skipping it", seq);
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(messages) => Ok(Some(messages)),
        Err(e) => {
            warn!("Staged page {} is corrupt ({}), skipping it", seq, e);
            Ok(None)
        }
    }
}
