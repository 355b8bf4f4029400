//! Log-only channel — stands in for WhatsApp when no Twilio credentials are
//! configured (local development, tests).

use async_trait::async_trait;

use crate::channels::Channel;
use crate::error::ChannelError;

pub struct LogChannel;

#[async_trait]
impl Channel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<(), ChannelError> {
        tracing::info!(to, "Outbound message:\n{text}");
        Ok(())
    }
}
