//! Twitter API response normalization
//!
//! Converts v1.1 statuses to domain [`Post`]s.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use super::api::{Entities, Status};
use crate::models::{Mention, Post, PostId, Repost};

/// Timestamp layout used by v1.1 (`Wed Oct 10 20:19:24 +0000 2018`)
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Normalize a status to a Post
pub fn normalize_status(status: Status) -> Result<Post> {
    let created_at = parse_created_at(&status.created_at)
        .with_context(|| format!("Status {} has a malformed timestamp", status.id))?;

    let repost = status.retweeted_status.map(|original| Repost {
        author: original.user.screen_name,
        text: original.full_text.or(original.text).unwrap_or_default(),
        mentions: mentions(&original.entities),
    });

    let mut builder = Post::builder(PostId::new(status.id), status.user.screen_name)
        .text(status.full_text.or(status.text).unwrap_or_default())
        .created_at(created_at)
        .mentions(mentions(&status.entities))
        .truncated(status.truncated);
    if let Some(original) = repost {
        builder = builder.repost(original);
    }
    if let Some(author) = status.in_reply_to_screen_name {
        builder = builder.in_reply_to(author);
    }
    Ok(builder.build())
}

/// Parse a v1.1 `created_at` value
pub fn parse_created_at(value: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_str(value, CREATED_AT_FORMAT)
        .with_context(|| format!("Unrecognized timestamp: {}", value))?;
    Ok(parsed.with_timezone(&Utc))
}

/// Mentions in body order
fn mentions(entities: &Entities) -> Vec<Mention> {
    let mut mentions: Vec<Mention> = entities
        .user_mentions
        .iter()
        .map(|m| Mention::new(&m.screen_name, m.indices[0], m.indices[1]))
        .collect();
    mentions.sort_by_key(|m| m.start);
    mentions
}
