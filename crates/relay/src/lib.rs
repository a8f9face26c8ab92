//! Relay crate - Business logic for the feed-to-channel relay
//!
//! This crate provides:
//! - Domain models (Post, Mention, Cursor)
//! - Post rendering for the destination channel
//! - Twitter API client with app-only authentication
//! - Telegram Bot API client
//! - Storage trait abstractions (cursor key-value store, import staging)
//! - Incremental sync engine and bulk importer
//! - Relay service (startup, poll loop, dig, shutdown)

pub mod config;
pub mod delivery;
pub mod error;
pub mod feed;
pub mod format;
pub mod http;
pub mod models;
pub mod service;
pub mod storage;
pub mod sync;
pub mod telegram;
pub mod twitter;

pub use config::RelayConfig;
pub use delivery::{Delivery, Greeter, RecordingChannel, SentMessage};
pub use error::{ConfigError, DeliveryError, FeedError};
pub use feed::{FeedCall, FeedCallKind, FeedSource, InMemoryFeed};
pub use format::{Formatter, leading_mention_run};
pub use models::{ChannelId, Cursor, Mention, Post, PostId, Repost};
pub use service::Relay;
pub use storage::{InMemoryStore, KeyStore, RelayStore, SqliteStore, StagingStore};
pub use sync::{
    // Sync execution
    SyncEngine, SyncOptions, SyncPath, SyncReport,
    // Bulk import
    BulkImporter, ImportReport, ImportTarget,
    // Pacing
    Pacer, RecordingPacer, Shutdown, ShutdownRequest, ThreadPacer,
};
pub use telegram::TelegramBot;
pub use twitter::{TwitterAuth, TwitterClient};
