//! Recording channel used by tests
//!
//! Captures every delivered message instead of sending it anywhere and can
//! be scripted to refuse or throttle individual sends.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::Delivery;
use crate::error::DeliveryError;
use crate::models::ChannelId;

/// A message accepted by [`RecordingChannel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: ChannelId,
    pub text: String,
}

/// In-memory implementation of Delivery
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<SentMessage>>,
    attempts: Mutex<usize>,
    failures: Mutex<VecDeque<DeliveryError>>,
    channels: Mutex<HashMap<String, ChannelId>>,
    resolve_failures: Mutex<usize>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel that `resolve_channel` can find
    pub fn with_channel(self, name: impl Into<String>, id: ChannelId) -> Self {
        self.channels.lock().unwrap().insert(name.into(), id);
        self
    }

    /// Fail the next send attempt with `error` (queued in order)
    pub fn fail_next_send(&self, error: DeliveryError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// Fail the next `count` channel lookups
    pub fn fail_resolves(&self, count: usize) {
        *self.resolve_failures.lock().unwrap() = count;
    }

    /// Messages accepted so far, in delivery order
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Texts accepted so far, in delivery order
    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.text).collect()
    }

    /// Send attempts, including failed ones
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

impl Delivery for RecordingChannel {
    fn send_message(&self, channel: ChannelId, text: &str) -> Result<(), DeliveryError> {
        *self.attempts.lock().unwrap() += 1;
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.sent.lock().unwrap().push(SentMessage {
            channel,
            text: text.to_string(),
        });
        Ok(())
    }

    fn resolve_channel(&self, name: &str) -> Result<ChannelId, DeliveryError> {
        {
            let mut remaining = self.resolve_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DeliveryError::Rejected("chat not found".to_string()));
            }
        }
        self.channels
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .ok_or_else(|| DeliveryError::Rejected(format!("chat @{} not found", name)))
    }
}
