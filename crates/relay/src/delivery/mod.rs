//! Delivery channels
//!
//! The sync engine forwards rendered posts through [`Delivery`]; the
//! Telegram bot and the recording channel both implement it.

mod memory;
mod traits;

pub use memory::{RecordingChannel, SentMessage};
pub use traits::{Delivery, Greeter};
