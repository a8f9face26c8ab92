//! Post model representing one entry of the source feed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique, monotonically increasing identifier of a post
///
/// Ids double as the ordering key: a larger id is always a newer post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PostId(pub u64);

impl PostId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// The id immediately older than this one, used for "strictly before" paging
    pub fn previous(self) -> Option<PostId> {
        self.0.checked_sub(1).map(PostId)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PostId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(PostId)
    }
}

impl From<u64> for PostId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A user mention inside a post body
///
/// `start` and `end` are character (not byte) offsets into the raw text,
/// end-exclusive, as reported by the feed API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub screen_name: String,
    pub start: usize,
    pub end: usize,
}

impl Mention {
    pub fn new(screen_name: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            screen_name: screen_name.into(),
            start,
            end,
        }
    }
}

/// The original post wrapped by a repost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repost {
    /// Screen name of the original author
    pub author: String,
    /// Body of the original post
    pub text: String,
    /// Mentions over `text`
    pub mentions: Vec<Mention>,
}

/// A single post from the source feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    /// Screen name of the account that published this post
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Present when this post reposts someone else's post
    pub repost: Option<Repost>,
    pub in_reply_to_author: Option<String>,
    pub mentions: Vec<Mention>,
    pub permalink: String,
    /// The list endpoint returned a shortened body
    pub truncated: bool,
}

impl Post {
    /// Start building a post; the permalink is derived from author and id
    pub fn builder(id: PostId, author: impl Into<String>) -> PostBuilder {
        PostBuilder::new(id, author)
    }

    pub fn is_repost(&self) -> bool {
        self.repost.is_some()
    }

    pub fn is_reply(&self) -> bool {
        self.in_reply_to_author
            .as_deref()
            .is_some_and(|author| !author.is_empty())
    }

    /// Whether the full body must be fetched individually before rendering
    pub fn needs_full_fetch(&self) -> bool {
        self.truncated || self.is_repost()
    }
}

/// Canonical link to a post on the source platform
pub fn permalink(author: &str, id: PostId) -> String {
    format!("https://twitter.com/{}/status/{}", author, id)
}

/// Builder for constructing Post instances
pub struct PostBuilder {
    id: PostId,
    author: String,
    text: String,
    created_at: DateTime<Utc>,
    repost: Option<Repost>,
    in_reply_to_author: Option<String>,
    mentions: Vec<Mention>,
    truncated: bool,
}

impl PostBuilder {
    pub fn new(id: PostId, author: impl Into<String>) -> Self {
        Self {
            id,
            author: author.into(),
            text: String::new(),
            created_at: Utc::now(),
            repost: None,
            in_reply_to_author: None,
            mentions: Vec::new(),
            truncated: false,
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn repost(mut self, repost: Repost) -> Self {
        self.repost = Some(repost);
        self
    }

    pub fn in_reply_to(mut self, author: impl Into<String>) -> Self {
        self.in_reply_to_author = Some(author.into());
        self
    }

    pub fn mentions(mut self, mentions: Vec<Mention>) -> Self {
        self.mentions = mentions;
        self
    }

    pub fn truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    pub fn build(self) -> Post {
        let permalink = permalink(&self.author, self.id);
        Post {
            id: self.id,
            author: self.author,
            text: self.text,
            created_at: self.created_at,
            repost: self.repost,
            in_reply_to_author: self.in_reply_to_author,
            mentions: self.mentions,
            permalink,
            truncated: self.truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_id_ordering_and_parse() {
        assert!(PostId::new(10) > PostId::new(9));
        assert_eq!("1234".parse::<PostId>().unwrap(), PostId::new(1234));
        assert_eq!(" 42 ".parse::<PostId>().unwrap(), PostId::new(42));
        assert!("abc".parse::<PostId>().is_err());
        assert_eq!(PostId::new(0).previous(), None);
        assert_eq!(PostId::new(5).previous(), Some(PostId::new(4)));
    }

    #[test]
    fn test_builder_derives_permalink() {
        let post = Post::builder(PostId::new(99), "rustlang").text("hello").build();
        assert_eq!(post.permalink, "https://twitter.com/rustlang/status/99");
        assert!(!post.needs_full_fetch());
    }

    #[test]
    fn test_needs_full_fetch() {
        let truncated = Post::builder(PostId::new(1), "a").truncated(true).build();
        assert!(truncated.needs_full_fetch());

        let repost = Post::builder(PostId::new(2), "a")
            .repost(Repost {
                author: "b".to_string(),
                text: "original".to_string(),
                mentions: Vec::new(),
            })
            .build();
        assert!(repost.is_repost());
        assert!(repost.needs_full_fetch());
    }

    #[test]
    fn test_is_reply_ignores_empty_author() {
        let post = Post::builder(PostId::new(1), "a").in_reply_to("").build();
        assert!(!post.is_reply());
        let post = Post::builder(PostId::new(1), "a").in_reply_to("b").build();
        assert!(post.is_reply());
    }
}
