//! WhatsApp channel — sends through the Twilio Messages API.
//!
//! Native HTTP implementation over reqwest; inbound messages arrive via the
//! webhook, so this channel is outbound-only.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::channels::Channel;
use crate::error::ChannelError;

/// Maximum body length for one Twilio WhatsApp message.
const WHATSAPP_MAX_MESSAGE_LENGTH: usize = 1600;

/// WhatsApp channel backed by a Twilio account.
pub struct WhatsAppChannel {
    account_sid: String,
    auth_token: SecretString,
    /// The bot's own WhatsApp number, e.g. `whatsapp:+14155238886`.
    from_number: String,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(account_sid: String, auth_token: SecretString, from_number: String) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self) -> String {
        format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        )
    }

    /// Send a single message chunk (≤1600 chars).
    async fn send_chunk(&self, to: &str, body: &str) -> Result<(), ChannelError> {
        let params = [
            ("From", self.from_number.as_str()),
            ("To", to),
            ("Body", body),
        ];

        let resp = self
            .client
            .post(self.api_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&params)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "whatsapp".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "whatsapp".into(),
                reason: format!("Twilio returned {status}: {detail}"),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Channel for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<(), ChannelError> {
        for chunk in split_message(text, WHATSAPP_MAX_MESSAGE_LENGTH) {
            self.send_chunk(to, &chunk).await?;
        }
        tracing::debug!(to, len = text.len(), "WhatsApp message sent");
        Ok(())
    }
}

/// Split text into chunks of at most `limit` characters, preferring to break
/// at a newline or space near the limit.
fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining: Vec<char> = text.chars().collect();

    while remaining.len() > limit {
        // Look for the last newline, then the last space, inside the window.
        let window = &remaining[..limit];
        let break_at = window
            .iter()
            .rposition(|c| *c == '\n')
            .or_else(|| window.iter().rposition(|c| *c == ' '))
            .map(|pos| pos + 1)
            .unwrap_or(limit);

        chunks.push(remaining[..break_at].iter().collect::<String>().trim_end().to_string());
        remaining.drain(..break_at);
    }

    let tail: String = remaining.iter().collect();
    if !tail.is_empty() || chunks.is_empty() {
        chunks.push(tail);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_is_one_chunk() {
        let chunks = split_message("Hallo!", 1600);
        assert_eq!(chunks, vec!["Hallo!".to_string()]);
    }

    #[test]
    fn empty_message_is_one_empty_chunk() {
        assert_eq!(split_message("", 1600).len(), 1);
    }

    #[test]
    fn long_message_splits_at_word_boundary() {
        let text = "wort ".repeat(100);
        let chunks = split_message(&text, 42);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 42, "{chunk:?}");
        }
        // No word was torn apart.
        for chunk in &chunks {
            for word in chunk.split_whitespace() {
                assert_eq!(word, "wort");
            }
        }
    }

    #[test]
    fn unbroken_text_splits_hard() {
        let text = "x".repeat(100);
        let chunks = split_message(&text, 40);
        assert_eq!(chunks.len(), 3);
        let total: usize = chunks.iter().map(|c| c.chars().count()).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn prefers_newline_break() {
        let text = format!("{}\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = split_message(&text, 40);
        assert_eq!(chunks[0], "a".repeat(30));
        assert_eq!(chunks[1], "b".repeat(30));
    }
}
