//! Relay service
//!
//! Wires the feed, the channel and the store together: startup (channel
//! resolution), the poll loop, the dig entry point and shutdown handling.

use anyhow::{Context, Result, bail};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::config::RelayConfig;
use crate::delivery::{Delivery, Greeter};
use crate::feed::FeedSource;
use crate::format::Formatter;
use crate::models::{ChannelId, Cursor, PostId};
use crate::storage::RelayStore;
use crate::sync::{
    BulkImporter, ImportTarget, Pacer, Shutdown, SyncEngine, SyncOptions, SyncReport,
    ThreadPacer,
};
use crate::telegram::TelegramBot;
use crate::twitter::{TwitterAuth, TwitterClient};

/// Channel lookups attempted at startup before giving up
pub const RESOLVE_ATTEMPTS: u32 = 10;
/// Wait between two channel lookups
pub const RESOLVE_INTERVAL: Duration = Duration::from_secs(10);
/// Posts fetched per cycle to look for the cursor
const RECENT_WINDOW: usize = 20;

/// The running relay: one account's feed into one channel
pub struct Relay {
    engine: SyncEngine,
    delivery: Arc<dyn Delivery>,
    greeter: Option<Arc<dyn Greeter>>,
    store: Arc<dyn RelayStore>,
    pacer: Arc<dyn Pacer>,
    cursor: Cursor,
    channel_name: String,
    welcome_text: String,
    seek_rate: Duration,
}

impl Relay {
    /// Create a relay from explicit collaborators
    ///
    /// The cursor is loaded from `store`.
    pub fn new(
        config: &RelayConfig,
        feed: Arc<dyn FeedSource>,
        delivery: Arc<dyn Delivery>,
        greeter: Option<Arc<dyn Greeter>>,
        store: Arc<dyn RelayStore>,
        pacer: Arc<dyn Pacer>,
    ) -> Result<Self> {
        let cursor = Cursor::load(store.as_ref()).context("Failed to load relay cursor")?;
        let options = SyncOptions {
            username: config.twitter_username.clone(),
            max_rollback: config.max_rollback,
            rate_limit_wait: config.rate_limit_wait,
            send_delay: config.send_delay,
            recent_window: RECENT_WINDOW,
        };
        let engine = SyncEngine::new(
            feed,
            delivery.clone(),
            store.clone(),
            pacer.clone(),
            Formatter::new(config.repost_marker, config.reply_marker),
            options,
        );

        Ok(Self {
            engine,
            delivery,
            greeter,
            store,
            pacer,
            cursor,
            channel_name: config.telegram_channel.clone(),
            welcome_text: config.welcome_text.clone(),
            seek_rate: config.seek_rate,
        })
    }

    /// Create a relay talking to the real Twitter and Telegram APIs
    ///
    /// Fails when the bot API is unreachable or rejects the token.
    pub fn from_config(config: &RelayConfig, store: Arc<dyn RelayStore>) -> Result<Self> {
        let bot = Arc::new(TelegramBot::new(config.telegram_bot_token.clone()));
        let bot_name = bot
            .bot_name()
            .context("Telegram bot API is unreachable or the bot token is invalid")?;
        info!("Logged in as @{}", bot_name);

        let feed = Arc::new(TwitterClient::new(TwitterAuth::new(
            config.twitter_api_key.clone(),
            config.twitter_api_secret.clone(),
        )));
        Self::new(
            config,
            feed,
            bot.clone(),
            Some(bot),
            store,
            Arc::new(ThreadPacer),
        )
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Make sure the destination channel id is known
    ///
    /// Uses the stored id when there is one; otherwise looks the channel up
    /// by name, retrying a few times before giving up.
    pub fn start(&mut self) -> Result<ChannelId> {
        if let Some(channel) = self.cursor.channel_id {
            debug!("Using stored channel id {}", channel);
            return Ok(channel);
        }

        for attempt in 1..=RESOLVE_ATTEMPTS {
            match self.delivery.resolve_channel(&self.channel_name) {
                Ok(channel) => {
                    info!("Resolved @{} to channel id {}", self.channel_name, channel);
                    self.cursor.channel_id = Some(channel);
                    self.cursor.save_channel(self.store.as_ref())?;
                    return Ok(channel);
                }
                Err(e) => {
                    warn!(
                        "Failed to resolve @{} (attempt {}/{}): {}",
                        self.channel_name, attempt, RESOLVE_ATTEMPTS, e
                    );
                    if attempt < RESOLVE_ATTEMPTS {
                        self.pacer.pause(RESOLVE_INTERVAL);
                    }
                }
            }
        }
        bail!(
            "Could not resolve channel @{} after {} attempts",
            self.channel_name,
            RESOLVE_ATTEMPTS
        )
    }

    /// Run one cycle: greet new bot users, then sync
    ///
    /// Errors are logged, not returned; the next cycle starts over from the
    /// persisted cursor.
    pub fn poll_once(&mut self) -> Option<SyncReport> {
        if let Some(greeter) = &self.greeter
            && let Err(e) = greeter.greet_pending(&self.welcome_text)
        {
            warn!("Failed to answer /start commands: {:#}", e);
        }

        match self.engine.sync_once(&mut self.cursor) {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Sync cycle failed: {:#}", e);
                None
            }
        }
    }

    /// Poll every `seek_rate` until `shutdown` is requested
    pub fn run(&mut self, shutdown: &Shutdown) -> Result<()> {
        self.start()?;
        info!(
            "Relaying @{} to @{} every {}s",
            self.engine.options().username,
            self.channel_name,
            self.seek_rate.as_secs()
        );

        while !shutdown.is_requested() {
            self.poll_once();
            if shutdown.wait(self.seek_rate) {
                break;
            }
        }
        info!("Stopped!");
        Ok(())
    }

    /// Backfill older posts into the channel
    ///
    /// Moves the cursor to the newest imported post and returns the oldest.
    /// A `shutdown` request aborts the import with an error and leaves the
    /// cursor where it was.
    pub fn dig(&mut self, target: ImportTarget, shutdown: &Shutdown) -> Result<Option<PostId>> {
        let channel = self.start()?;
        let report = BulkImporter::new(&self.engine)
            .with_shutdown(shutdown)
            .import_batch(channel, target)?;

        if let Some(newest) = report.newest_id
            && self.cursor.advance(newest)
        {
            self.cursor.save_last_post(self.store.as_ref())?;
        }
        Ok(report.terminal_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::RecordingChannel;
    use crate::feed::InMemoryFeed;
    use crate::models::{CHANNEL_ID_KEY, LAST_POST_KEY, Post};
    use crate::storage::{InMemoryStore, KeyStore, StagingStore};
    use crate::sync::RecordingPacer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CHANNEL: ChannelId = ChannelId(-100200300);

    fn test_config() -> RelayConfig {
        RelayConfig::from_json(
            r#"{
                "twitter_username": "author",
                "twitter_apikey": "key",
                "twitter_api_secret": "secret",
                "telegram_channel": "news",
                "telegram_bot_apikey": "123:abc"
            }"#,
        )
        .unwrap()
    }

    fn feed(ids: impl IntoIterator<Item = u64>) -> Arc<InMemoryFeed> {
        Arc::new(InMemoryFeed::new(
            ids.into_iter()
                .map(|id| Post::builder(PostId::new(id), "author").text(format!("post {}", id)).build())
                .collect(),
        ))
    }

    /// Greeter that counts calls and can trip a shutdown
    #[derive(Default)]
    struct CountingGreeter {
        calls: AtomicUsize,
        shutdown: Option<Shutdown>,
    }

    impl Greeter for CountingGreeter {
        fn greet_pending(&self, welcome_text: &str) -> Result<usize> {
            assert_eq!(welcome_text, "Hi! Join @news");
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(shutdown) = &self.shutdown {
                shutdown.request();
            }
            Ok(0)
        }
    }

    #[test]
    fn test_start_resolves_and_persists_channel() {
        let store = Arc::new(InMemoryStore::new());
        let channel = Arc::new(RecordingChannel::new().with_channel("news", CHANNEL));
        channel.fail_resolves(3);
        let pacer = Arc::new(RecordingPacer::new());
        let mut relay = Relay::new(
            &test_config(),
            feed(1..=3),
            channel,
            None,
            store.clone(),
            pacer.clone(),
        )
        .unwrap();

        assert_eq!(relay.start().unwrap(), CHANNEL);
        assert_eq!(pacer.pauses(), vec![RESOLVE_INTERVAL; 3]);
        assert_eq!(
            store.get(CHANNEL_ID_KEY).unwrap().as_deref(),
            Some("-100200300")
        );
    }

    #[test]
    fn test_start_gives_up_after_max_attempts() {
        let pacer = Arc::new(RecordingPacer::new());
        let mut relay = Relay::new(
            &test_config(),
            feed(1..=3),
            Arc::new(RecordingChannel::new()),
            None,
            Arc::new(InMemoryStore::new()),
            pacer.clone(),
        )
        .unwrap();

        let err = relay.start().unwrap_err();
        assert!(err.to_string().contains("@news"));
        assert_eq!(pacer.pauses().len(), (RESOLVE_ATTEMPTS - 1) as usize);
    }

    #[test]
    fn test_start_uses_stored_channel() {
        let store = Arc::new(InMemoryStore::new());
        store.set(CHANNEL_ID_KEY, "-42").unwrap();
        let mut relay = Relay::new(
            &test_config(),
            feed(1..=3),
            Arc::new(RecordingChannel::new()),
            None,
            store,
            Arc::new(RecordingPacer::new()),
        )
        .unwrap();

        assert_eq!(relay.start().unwrap(), ChannelId(-42));
    }

    #[test]
    fn test_poll_once_greets_then_syncs() {
        let channel = Arc::new(RecordingChannel::new().with_channel("news", CHANNEL));
        let greeter = Arc::new(CountingGreeter::default());
        let mut relay = Relay::new(
            &test_config(),
            feed(1..=5),
            channel.clone(),
            Some(greeter.clone() as Arc<dyn Greeter>),
            Arc::new(InMemoryStore::new()),
            Arc::new(RecordingPacer::new()),
        )
        .unwrap();
        relay.start().unwrap();

        let report = relay.poll_once().unwrap();
        assert_eq!(report.forwarded, 1);
        assert_eq!(greeter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(relay.cursor().last_post_id, Some(PostId::new(5)));
    }

    #[test]
    fn test_poll_once_without_channel_logs_and_continues() {
        let mut relay = Relay::new(
            &test_config(),
            feed(1..=5),
            Arc::new(RecordingChannel::new()),
            None,
            Arc::new(InMemoryStore::new()),
            Arc::new(RecordingPacer::new()),
        )
        .unwrap();

        assert!(relay.poll_once().is_none());
    }

    #[test]
    fn test_run_stops_after_shutdown() {
        let shutdown = Shutdown::new();
        let greeter = Arc::new(CountingGreeter {
            shutdown: Some(shutdown.clone()),
            ..Default::default()
        });
        let channel = Arc::new(RecordingChannel::new().with_channel("news", CHANNEL));
        let mut relay = Relay::new(
            &test_config(),
            feed(1..=5),
            channel.clone(),
            Some(greeter.clone() as Arc<dyn Greeter>),
            Arc::new(InMemoryStore::new()),
            Arc::new(RecordingPacer::new()),
        )
        .unwrap();

        relay.run(&shutdown).unwrap();

        // The in-flight cycle completes before the loop exits
        assert_eq!(greeter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(channel.sent().len(), 1);
    }

    #[test]
    fn test_dig_moves_cursor_to_newest() {
        let store = Arc::new(InMemoryStore::new());
        let channel = Arc::new(RecordingChannel::new().with_channel("news", CHANNEL));
        let mut relay = Relay::new(
            &test_config(),
            feed(1..=60),
            channel.clone(),
            None,
            store.clone(),
            Arc::new(RecordingPacer::new()),
        )
        .unwrap();

        let terminal = relay
            .dig(ImportTarget::Count(25), &Shutdown::new())
            .unwrap();

        assert_eq!(terminal, Some(PostId::new(36)));
        assert_eq!(channel.sent().len(), 25);
        assert_eq!(relay.cursor().last_post_id, Some(PostId::new(60)));
        assert_eq!(store.get(LAST_POST_KEY).unwrap().as_deref(), Some("60"));

        // Nothing new to relay afterwards
        let report = relay.poll_once().unwrap();
        assert_eq!(report.forwarded, 0);
    }

    #[test]
    fn test_interrupted_dig_keeps_cursor() {
        let store = Arc::new(InMemoryStore::new());
        store.set(LAST_POST_KEY, "10").unwrap();
        let channel = Arc::new(RecordingChannel::new().with_channel("news", CHANNEL));
        let mut relay = Relay::new(
            &test_config(),
            feed(1..=60),
            channel.clone(),
            None,
            store.clone(),
            Arc::new(RecordingPacer::new()),
        )
        .unwrap();
        let shutdown = Shutdown::new();
        shutdown.request();

        assert!(relay.dig(ImportTarget::All, &shutdown).is_err());

        assert!(channel.sent().is_empty());
        assert_eq!(store.get(LAST_POST_KEY).unwrap().as_deref(), Some("10"));
        assert_eq!(store.staging_page_count().unwrap(), 0);
    }
}
