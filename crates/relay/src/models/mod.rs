//! Domain models for relay entities

mod cursor;
mod post;

pub use cursor::{CHANNEL_ID_KEY, ChannelId, Cursor, LAST_POST_KEY};
pub use post::{Mention, Post, PostBuilder, PostId, Repost, permalink};
