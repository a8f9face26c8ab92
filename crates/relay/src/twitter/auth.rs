//! Twitter app-only authentication
//!
//! Exchanges the consumer key and secret for a bearer token using the
//! client credentials grant. The token is cached until the API rejects it.

use anyhow::{Context, Result, bail};
use base64::prelude::*;
use log::debug;
use std::sync::Mutex;

use super::api::TokenResponse;

/// Consumer credentials plus the cached bearer token
pub struct TwitterAuth {
    api_key: String,
    api_secret: String,
    agent: ureq::Agent,
    token: Mutex<Option<String>>,
}

impl TwitterAuth {
    const TOKEN_URL: &'static str = "https://api.twitter.com/oauth2/token";

    /// Create a new TwitterAuth instance
    ///
    /// # Arguments
    /// * `api_key` - Consumer API key from the developer portal
    /// * `api_secret` - Consumer API secret from the developer portal
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            agent: crate::http::agent(),
            token: Mutex::new(None),
        }
    }

    /// Get a bearer token, requesting one when none is cached
    pub fn get_bearer_token(&self) -> Result<String> {
        if let Some(token) = self.token.lock().unwrap().as_ref() {
            return Ok(token.clone());
        }

        let token = self.request_token()?;
        *self.token.lock().unwrap() = Some(token.clone());
        Ok(token)
    }

    /// Forget the cached token so the next call requests a fresh one
    pub fn invalidate(&self) {
        self.token.lock().unwrap().take();
    }

    fn request_token(&self) -> Result<String> {
        debug!("Requesting application bearer token");
        let mut response = self
            .agent
            .post(Self::TOKEN_URL)
            .header("Authorization", &format!("Basic {}", self.basic_credential()))
            .send_form([("grant_type", "client_credentials")])
            .context("Failed to send token request")?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            bail!("Token request failed with status {}: {}", status, body);
        }

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;
        if !token.token_type.eq_ignore_ascii_case("bearer") {
            bail!("Unexpected token type: {}", token.token_type);
        }
        Ok(token.access_token)
    }

    /// `base64(urlencode(key) ":" urlencode(secret))`
    fn basic_credential(&self) -> String {
        let pair = format!(
            "{}:{}",
            urlencoding::encode(&self.api_key),
            urlencoding::encode(&self.api_secret)
        );
        BASE64_STANDARD.encode(pair)
    }
}
