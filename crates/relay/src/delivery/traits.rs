//! Delivery trait definition

use crate::error::DeliveryError;
use crate::models::ChannelId;

/// Outbound messaging channel
pub trait Delivery: Send + Sync {
    /// Send one HTML-formatted message to `channel`
    fn send_message(&self, channel: ChannelId, text: &str) -> Result<(), DeliveryError>;

    /// Look up the id of a public channel by its username (without `@`)
    fn resolve_channel(&self, name: &str) -> Result<ChannelId, DeliveryError>;
}

/// Answers users who start a conversation with the bot
pub trait Greeter: Send + Sync {
    /// Reply to pending greetings; returns how many were answered
    fn greet_pending(&self, welcome_text: &str) -> anyhow::Result<usize>;
}
