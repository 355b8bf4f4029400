//! Messaging channel abstraction.

pub mod log;
pub mod whatsapp;

pub use log::LogChannel;
pub use whatsapp::WhatsAppChannel;

use async_trait::async_trait;

use crate::error::ChannelError;

/// Outbound message transport. The core only ever needs "send this text to
/// this sender id"; inbound delivery arrives through the webhook.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Send plain text to a sender id. Implementations split messages that
    /// exceed their transport limit.
    async fn send_text(&self, to: &str, text: &str) -> Result<(), ChannelError>;
}
