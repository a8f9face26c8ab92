//! Telegram Bot API client
//!
//! Blocking HTTP (ureq). Every method is a JSON POST to
//! `https://api.telegram.org/bot<token>/<method>`.

use anyhow::{Context, anyhow};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;

use super::api::{ApiResponse, Chat, Message, Update, User};
use crate::delivery::{Delivery, Greeter};
use crate::error::DeliveryError;
use crate::models::ChannelId;

/// Fallback wait when a 429 carries no `retry_after`
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Bot API client
pub struct TelegramBot {
    token: String,
    agent: ureq::Agent,
    /// Next update id to request from `getUpdates`
    update_offset: Mutex<Option<i64>>,
}

impl TelegramBot {
    const BASE_URL: &'static str = "https://api.telegram.org";

    /// Create a new bot client
    ///
    /// # Arguments
    /// * `token` - Bot token issued by @BotFather
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            agent: crate::http::agent(),
            update_offset: Mutex::new(None),
        }
    }

    /// Username of the bot; doubles as a reachability and token check
    pub fn bot_name(&self) -> anyhow::Result<String> {
        let me: User = self.call("getMe", &json!({}))?;
        Ok(me.username.unwrap_or(me.first_name))
    }

    /// POST `method` with a JSON body and unwrap the response envelope
    fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, DeliveryError> {
        let url = format!("{}/bot{}/{}", Self::BASE_URL, self.token, method);
        let mut response = self
            .agent
            .post(&url)
            .send_json(body)
            .with_context(|| format!("Failed to send {} request", method))
            .map_err(DeliveryError::Transient)?;

        let status = response.status().as_u16();
        let envelope: ApiResponse<T> = response
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse {} response (status {})", method, status))
            .map_err(DeliveryError::Transient)?;
        unwrap_response(status, envelope)
    }

    fn fetch_updates(&self) -> Result<Vec<Update>, DeliveryError> {
        let offset = *self.update_offset.lock().unwrap();
        let mut body = json!({ "timeout": 0, "allowed_updates": ["message"] });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        self.call("getUpdates", &body)
    }
}

impl Delivery for TelegramBot {
    fn send_message(&self, channel: ChannelId, text: &str) -> Result<(), DeliveryError> {
        let _: Message = self.call(
            "sendMessage",
            &json!({ "chat_id": channel.0, "text": text, "parse_mode": "HTML" }),
        )?;
        Ok(())
    }

    fn resolve_channel(&self, name: &str) -> Result<ChannelId, DeliveryError> {
        let chat: Chat = self.call(
            "getChat",
            &json!({ "chat_id": format!("@{}", name.trim_start_matches('@')) }),
        )?;
        debug!("Resolved @{} to {} chat {}", name, chat.kind, chat.id);
        Ok(ChannelId(chat.id))
    }
}

impl Greeter for TelegramBot {
    fn greet_pending(&self, welcome_text: &str) -> anyhow::Result<usize> {
        let updates = self.fetch_updates().context("Failed to fetch bot updates")?;
        let greeted = greet_updates(&updates, &self.update_offset, |chat_id| {
            self.call::<Message>(
                "sendMessage",
                &json!({
                    "chat_id": chat_id,
                    "text": welcome_text,
                    "parse_mode": "Markdown",
                }),
            )
            .map(|_| ())
        })?;

        if greeted > 0 {
            info!("Greeted {} new users", greeted);
        }
        Ok(greeted)
    }
}

/// Reply to every `/start` in `updates`
///
/// `offset` moves past each update as soon as it is handled, so a failed
/// reply is retried on the next call without greeting earlier users twice.
fn greet_updates(
    updates: &[Update],
    offset: &Mutex<Option<i64>>,
    mut reply: impl FnMut(i64) -> Result<(), DeliveryError>,
) -> anyhow::Result<usize> {
    let mut greeted = 0;

    for update in updates {
        if let Some(message) = &update.message
            && message.text.as_deref().is_some_and(is_start_command)
        {
            match reply(message.chat.id) {
                Ok(()) => greeted += 1,
                // The user blocked the bot or left; nothing to retry
                Err(DeliveryError::Rejected(reason)) => {
                    warn!("Could not greet chat {}: {}", message.chat.id, reason)
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut offset = offset.lock().unwrap();
        let next = update.update_id + 1;
        if offset.is_none_or(|current| current < next) {
            *offset = Some(next);
        }
    }
    Ok(greeted)
}

/// `/start`, `/start@SomeBot` or `/start <payload>`
fn is_start_command(text: &str) -> bool {
    let command = text.split_whitespace().next().unwrap_or_default();
    let command = command.split('@').next().unwrap_or_default();
    command == "/start"
}

/// Turn a response envelope into the result or a classified error
fn unwrap_response<T>(status: u16, envelope: ApiResponse<T>) -> Result<T, DeliveryError> {
    if envelope.ok
        && let Some(result) = envelope.result
    {
        return Ok(result);
    }

    let code = envelope.error_code.unwrap_or(status);
    let description = envelope
        .description
        .unwrap_or_else(|| format!("request failed with status {}", code));
    match code {
        429 => {
            let retry_after = envelope
                .parameters
                .and_then(|p| p.retry_after)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RETRY_AFTER);
            Err(DeliveryError::RateLimited { retry_after })
        }
        400 | 403 => Err(DeliveryError::Rejected(description)),
        _ => Err(DeliveryError::Transient(anyhow!(
            "Bot API error {}: {}",
            code,
            description
        ))),
    }
}
