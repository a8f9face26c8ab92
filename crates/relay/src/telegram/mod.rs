//! Telegram Bot API integration
//!
//! Delivery of rendered posts to the channel plus the `/start` greeter.

mod client;

pub use client::TelegramBot;

/// Bot API response types
pub mod api {
    use serde::Deserialize;

    /// Envelope wrapping every Bot API response
    #[derive(Debug, Deserialize)]
    pub struct ApiResponse<T> {
        pub ok: bool,
        pub result: Option<T>,
        pub description: Option<String>,
        pub error_code: Option<u16>,
        pub parameters: Option<ResponseParameters>,
    }

    /// Extra information attached to some errors
    #[derive(Debug, Deserialize)]
    pub struct ResponseParameters {
        /// Seconds to wait before repeating a throttled request
        pub retry_after: Option<u64>,
        pub migrate_to_chat_id: Option<i64>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Chat {
        pub id: i64,
        #[serde(rename = "type")]
        pub kind: String,
        pub title: Option<String>,
        pub username: Option<String>,
    }

    /// The bot account, from `getMe`
    #[derive(Debug, Deserialize)]
    pub struct User {
        pub id: i64,
        pub first_name: String,
        pub username: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Update {
        pub update_id: i64,
        pub message: Option<Message>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Message {
        pub message_id: i64,
        pub chat: Chat,
        pub text: Option<String>,
    }
}
