//! Admin gate — the only path from `pending` to `approved`/`rejected`, and
//! the only source of `suspended`.
//!
//! Both surfaces (the privileged chat command and the authenticated HTTP
//! action) funnel into these methods. Idempotency comes from the
//! repository's status CAS: the second of two racing approvals observes a
//! non-pending record, gets `false`, and sends nothing.

use std::sync::Arc;

use crate::channels::Channel;
use crate::error::Error;
use crate::onboarding::{PromptKind, prompt};
use crate::store::UserRepository;
use crate::users::{SenderRecord, SenderStatus};

use super::command::AdminCommand;

pub struct AdminGate {
    repo: Arc<dyn UserRepository>,
    channel: Arc<dyn Channel>,
    /// Sender ids allowed to issue chat commands.
    admin_numbers: Vec<String>,
}

impl AdminGate {
    pub fn new(
        repo: Arc<dyn UserRepository>,
        channel: Arc<dyn Channel>,
        admin_numbers: Vec<String>,
    ) -> Self {
        Self {
            repo,
            channel,
            admin_numbers,
        }
    }

    /// Whether a sender id may issue privileged commands.
    pub fn is_admin(&self, sender_id: &str) -> bool {
        self.admin_numbers.iter().any(|n| n == sender_id)
    }

    /// Approve a pending, fully onboarded sender. Returns `false` (and sends
    /// nothing) when the sender is unknown or not approvable.
    pub async fn approve(&self, sender_id: &str, actor: &str) -> Result<bool, Error> {
        let changed = self
            .repo
            .set_status(sender_id, SenderStatus::Approved, actor)
            .await?;
        if !changed {
            tracing::info!(sender = sender_id, actor, "Approve was a no-op");
            return Ok(false);
        }

        tracing::info!(sender = sender_id, actor, "Sender approved");
        self.notify_sender(sender_id, PromptKind::ApprovedNotice).await;
        Ok(true)
    }

    /// Reject a pending, fully onboarded sender.
    pub async fn reject(&self, sender_id: &str, actor: &str) -> Result<bool, Error> {
        let changed = self
            .repo
            .set_status(sender_id, SenderStatus::Rejected, actor)
            .await?;
        if !changed {
            tracing::info!(sender = sender_id, actor, "Reject was a no-op");
            return Ok(false);
        }

        tracing::info!(sender = sender_id, actor, "Sender rejected");
        self.notify_sender(sender_id, PromptKind::Rejected).await;
        Ok(true)
    }

    /// Suspend any known sender. No notification; the terminal status message
    /// answers their next contact.
    pub async fn suspend(&self, sender_id: &str, actor: &str) -> Result<bool, Error> {
        let changed = self
            .repo
            .set_status(sender_id, SenderStatus::Suspended, actor)
            .await?;
        if changed {
            tracing::warn!(sender = sender_id, actor, "Sender suspended");
        }
        Ok(changed)
    }

    /// Tell every admin about a freshly completed application.
    pub async fn notify_new_application(&self, record: &SenderRecord) {
        let profile = &record.profile;
        let text = format!(
            "New application for the German tutor bot\n\n\
             Phone: {}\n\
             Name: {}\n\
             Country: {}\n\
             Languages: {}\n\
             Goal: {}\n\n\
             Reply APPROVE {} or REJECT {}\n\
             Or reply STATS for an overview.",
            record.sender_id,
            profile.name.as_deref().unwrap_or("-"),
            profile.country.as_deref().unwrap_or("-"),
            profile.spoken_languages.as_deref().unwrap_or("-"),
            profile.goal.as_deref().unwrap_or("-"),
            record.sender_id,
            record.sender_id,
        );

        for admin in &self.admin_numbers {
            if let Err(e) = self.channel.send_text(admin, &text).await {
                tracing::error!(admin, error = %e, "Failed to notify admin");
            }
        }
    }

    /// Execute a parsed chat command and return the reply for the admin.
    /// `Unknown` never reaches this; the gateway lets it fall through.
    pub async fn handle_command(&self, command: &AdminCommand, actor: &str) -> Result<String, Error> {
        match command {
            AdminCommand::Stats => {
                let stats = self.repo.aggregate_statistics().await?;
                Ok(format!(
                    "Bot statistics\n\n\
                     Pending applications: {}\n\
                     Approved senders: {}\n\
                     Rejected: {}\n\
                     Suspended: {}\n\
                     Total registered: {}\n\
                     Lessons completed: {}\n\
                     Average XP: {:.1}",
                    stats.pending,
                    stats.approved,
                    stats.rejected,
                    stats.suspended,
                    stats.total,
                    stats.total_lessons,
                    stats.avg_experience,
                ))
            }
            AdminCommand::Approve(id) => Ok(if self.approve(id, actor).await? {
                format!("Sender {id} approved and notified.")
            } else {
                format!("Sender {id} is not awaiting approval.")
            }),
            AdminCommand::Reject(id) => Ok(if self.reject(id, actor).await? {
                format!("Sender {id} rejected and notified.")
            } else {
                format!("Sender {id} is not awaiting approval.")
            }),
            AdminCommand::Suspend(id) => Ok(if self.suspend(id, actor).await? {
                format!("Sender {id} suspended.")
            } else {
                format!("Sender {id} not found or already suspended.")
            }),
            AdminCommand::Unknown => Ok("Unknown command.".to_string()),
        }
    }

    /// Best-effort localized notification to a sender; a send failure is
    /// logged but does not undo the status change.
    async fn notify_sender(&self, sender_id: &str, kind: PromptKind) {
        let lang = match self.repo.get(sender_id).await {
            Ok(Some(record)) => record.preferred_language,
            _ => Default::default(),
        };
        if let Err(e) = self.channel.send_text(sender_id, prompt(lang, kind)).await {
            tracing::error!(sender = sender_id, error = %e, "Failed to notify sender");
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use crate::error::ChannelError;
    use crate::store::MemoryRepository;
    use crate::users::{Language, OnboardingStep};

    use super::*;

    /// Channel stub that records every outbound message.
    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingChannel {
        async fn sent_to(&self, to: &str) -> Vec<String> {
            self.sent
                .lock()
                .await
                .iter()
                .filter(|(recipient, _)| recipient == to)
                .map(|(_, text)| text.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send_text(&self, to: &str, text: &str) -> Result<(), ChannelError> {
            self.sent.lock().await.push((to.to_string(), text.to_string()));
            Ok(())
        }
    }

    async fn onboarded_sender(repo: &MemoryRepository, id: &str) {
        let mut record = repo.get_or_create(id).await.unwrap();
        record.preferred_language = Language::German;
        record.profile.name = Some("Amina".into());
        record.profile.country = Some("Syria".into());
        record.profile.spoken_languages = Some("Arabic".into());
        record.profile.goal = Some("B1".into());
        record.step = OnboardingStep::None;
        assert!(repo.update_record(&record).await.unwrap());
    }

    fn gate(repo: Arc<MemoryRepository>, channel: Arc<RecordingChannel>) -> AdminGate {
        AdminGate::new(repo, channel, vec!["whatsapp:+admin1".into(), "whatsapp:+admin2".into()])
    }

    #[tokio::test]
    async fn approve_notifies_once_in_sender_language() {
        let repo = Arc::new(MemoryRepository::new());
        let channel = Arc::new(RecordingChannel::default());
        onboarded_sender(&repo, "whatsapp:+49170").await;
        let gate = gate(repo.clone(), channel.clone());

        assert!(gate.approve("whatsapp:+49170", "whatsapp:+admin1").await.unwrap());
        assert!(!gate.approve("whatsapp:+49170", "whatsapp:+admin2").await.unwrap());

        let notices = channel.sent_to("whatsapp:+49170").await;
        assert_eq!(notices.len(), 1);
        assert_eq!(
            notices[0],
            prompt(Language::German, PromptKind::ApprovedNotice)
        );
    }

    #[tokio::test]
    async fn approve_unknown_sender_is_false() {
        let repo = Arc::new(MemoryRepository::new());
        let channel = Arc::new(RecordingChannel::default());
        let gate = gate(repo, channel.clone());

        assert!(!gate.approve("whatsapp:+nobody", "whatsapp:+admin1").await.unwrap());
        assert!(channel.sent_to("whatsapp:+nobody").await.is_empty());
    }

    #[tokio::test]
    async fn reject_notifies_and_is_idempotent() {
        let repo = Arc::new(MemoryRepository::new());
        let channel = Arc::new(RecordingChannel::default());
        onboarded_sender(&repo, "whatsapp:+49171").await;
        let gate = gate(repo.clone(), channel.clone());

        assert!(gate.reject("whatsapp:+49171", "whatsapp:+admin1").await.unwrap());
        assert!(!gate.reject("whatsapp:+49171", "whatsapp:+admin1").await.unwrap());
        assert_eq!(channel.sent_to("whatsapp:+49171").await.len(), 1);
    }

    #[tokio::test]
    async fn new_application_reaches_every_admin() {
        let repo = Arc::new(MemoryRepository::new());
        let channel = Arc::new(RecordingChannel::default());
        onboarded_sender(&repo, "whatsapp:+49172").await;
        let gate = gate(repo.clone(), channel.clone());

        let record = repo.get("whatsapp:+49172").await.unwrap().unwrap();
        gate.notify_new_application(&record).await;

        for admin in ["whatsapp:+admin1", "whatsapp:+admin2"] {
            let messages = channel.sent_to(admin).await;
            assert_eq!(messages.len(), 1);
            assert!(messages[0].contains("Amina"));
            assert!(messages[0].contains("APPROVE whatsapp:+49172"));
        }
    }

    #[tokio::test]
    async fn stats_command_reads_from_repository() {
        let repo = Arc::new(MemoryRepository::new());
        let channel = Arc::new(RecordingChannel::default());
        onboarded_sender(&repo, "whatsapp:+49173").await;
        let gate = gate(repo.clone(), channel);

        gate.approve("whatsapp:+49173", "whatsapp:+admin1").await.unwrap();
        let reply = gate
            .handle_command(&AdminCommand::Stats, "whatsapp:+admin1")
            .await
            .unwrap();
        assert!(reply.contains("Approved senders: 1"));
        assert!(reply.contains("Pending applications: 0"));
    }

    #[tokio::test]
    async fn allow_list_check() {
        let repo = Arc::new(MemoryRepository::new());
        let channel = Arc::new(RecordingChannel::default());
        let gate = gate(repo, channel);
        assert!(gate.is_admin("whatsapp:+admin1"));
        assert!(!gate.is_admin("whatsapp:+someone"));
    }
}
