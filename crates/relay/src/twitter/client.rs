//! Twitter REST v1.1 client
//!
//! Blocking HTTP (ureq). Implements [`FeedSource`] over the user timeline
//! and single-status endpoints.

use anyhow::{Context, anyhow};
use chrono::Utc;
use log::debug;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::TwitterAuth;
use super::api::{ErrorResponse, Status};
use super::normalize::normalize_status;
use crate::error::FeedError;
use crate::feed::FeedSource;
use crate::models::{Post, PostId};

/// Twitter API client for reading a user's posts
pub struct TwitterClient {
    auth: TwitterAuth,
    agent: ureq::Agent,
}

impl TwitterClient {
    const BASE_URL: &'static str = "https://api.twitter.com/1.1";

    /// Largest page the timeline endpoint serves
    const MAX_COUNT: usize = 200;
    /// Page size used when paging back through the timeline
    const PAGE_SIZE: usize = 20;

    /// Create a new Twitter client
    pub fn new(auth: TwitterAuth) -> Self {
        Self {
            auth,
            agent: crate::http::agent(),
        }
    }

    fn timeline(
        &self,
        username: &str,
        count: usize,
        max_id: Option<PostId>,
    ) -> Result<Vec<Post>, FeedError> {
        let mut url = format!(
            "{}/statuses/user_timeline.json?screen_name={}&count={}&include_rts=true",
            Self::BASE_URL,
            urlencoding::encode(username),
            count.clamp(1, Self::MAX_COUNT)
        );
        if let Some(max_id) = max_id {
            url.push_str(&format!("&max_id={}", max_id));
        }

        let statuses: Vec<Status> = self.get_json(&url, None)?;
        debug!("Timeline returned {} statuses", statuses.len());
        statuses
            .into_iter()
            .map(normalize_status)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(FeedError::Transient)
    }

    /// GET `url` with the bearer token and decode a JSON body
    ///
    /// `subject` is the post a 404 refers to, if any.
    fn get_json<T: DeserializeOwned>(&self, url: &str, subject: Option<PostId>) -> Result<T, FeedError> {
        let token = self.auth.get_bearer_token().map_err(FeedError::Transient)?;
        let mut response = self
            .agent
            .get(url)
            .header("Authorization", &format!("Bearer {}", token))
            .call()
            .context("Failed to send feed request")
            .map_err(FeedError::Transient)?;

        let status = response.status().as_u16();
        if status == 200 {
            return response
                .body_mut()
                .read_json()
                .context("Failed to parse feed response")
                .map_err(FeedError::Transient);
        }
        if status == 401 {
            self.auth.invalidate();
        }

        let reset = response
            .headers()
            .get("x-rate-limit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok());
        let body = response.body_mut().read_to_string().unwrap_or_default();
        Err(classify_status(status, reset, Utc::now().timestamp(), subject, &body))
    }
}

impl FeedSource for TwitterClient {
    fn fetch_recent(&self, username: &str, limit: usize) -> Result<Vec<Post>, FeedError> {
        self.timeline(username, limit, None)
    }

    fn fetch_page(&self, username: &str, before: Option<PostId>) -> Result<Vec<Post>, FeedError> {
        // max_id is inclusive on this endpoint
        let max_id = match before {
            Some(before) => match before.previous() {
                Some(id) => Some(id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        self.timeline(username, Self::PAGE_SIZE, max_id)
    }

    fn fetch_one(&self, id: PostId) -> Result<Post, FeedError> {
        let url = format!(
            "{}/statuses/show.json?id={}&tweet_mode=extended",
            Self::BASE_URL,
            id
        );
        let status: Status = self.get_json(&url, Some(id))?;
        normalize_status(status).map_err(FeedError::Transient)
    }
}

/// Map a non-200 response to a feed error
///
/// `reset` is the `x-rate-limit-reset` header (epoch seconds).
fn classify_status(
    status: u16,
    reset: Option<i64>,
    now: i64,
    subject: Option<PostId>,
    body: &str,
) -> FeedError {
    match (status, subject) {
        (429, _) => FeedError::RateLimited {
            retry_after: reset.map(|reset| Duration::from_secs((reset - now).max(0) as u64 + 1)),
        },
        (404, Some(id)) => FeedError::NotFound(id),
        // Withheld statuses and protected authors (codes 63, 179)
        (403, Some(id)) => FeedError::Unavailable {
            id,
            reason: error_detail(body),
        },
        _ => FeedError::Transient(anyhow!(
            "Feed API returned {}: {}",
            status,
            error_detail(body)
        )),
    }
}

fn error_detail(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.errors.into_iter().next())
        .map(|e| format!("{} (code {})", e.message, e.code))
        .unwrap_or_else(|| body.chars().take(200).collect())
}
