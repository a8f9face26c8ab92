//! Twitter API integration
//!
//! This module provides:
//! - App-only bearer authentication
//! - REST v1.1 client implementing [`FeedSource`](crate::feed::FeedSource)
//! - Response normalization to domain models

mod auth;
mod client;
mod normalize;

pub use auth::TwitterAuth;
pub use client::TwitterClient;
pub use normalize::{normalize_status, parse_created_at};

/// Twitter API response types
pub mod api {
    use serde::Deserialize;

    /// Token response from the oauth2/token endpoint
    #[derive(Debug, Deserialize)]
    pub struct TokenResponse {
        pub token_type: String,
        pub access_token: String,
    }

    /// A status (tweet) as returned by the timeline and show endpoints
    #[derive(Debug, Deserialize)]
    pub struct Status {
        pub id: u64,
        pub created_at: String,
        /// Present in compatibility mode
        pub text: Option<String>,
        /// Present with `tweet_mode=extended`
        pub full_text: Option<String>,
        #[serde(default)]
        pub truncated: bool,
        pub user: User,
        pub in_reply_to_screen_name: Option<String>,
        pub retweeted_status: Option<Box<Status>>,
        #[serde(default)]
        pub entities: Entities,
    }

    /// Author of a status
    #[derive(Debug, Deserialize)]
    pub struct User {
        pub screen_name: String,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct Entities {
        #[serde(default)]
        pub user_mentions: Vec<UserMention>,
    }

    /// A mention entity; `indices` are code point offsets `[start, end)`
    #[derive(Debug, Deserialize)]
    pub struct UserMention {
        pub screen_name: String,
        pub indices: [usize; 2],
    }

    /// Error envelope returned with non-2xx responses
    #[derive(Debug, Default, Deserialize)]
    pub struct ErrorResponse {
        #[serde(default)]
        pub errors: Vec<ApiError>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ApiError {
        pub code: i64,
        pub message: String,
    }
}
