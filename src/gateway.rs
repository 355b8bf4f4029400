//! Message gateway — one inbound message in, one reply string out.
//!
//! This is the boundary the webhook calls. It never returns an error: any
//! internal failure degrades to the localized technical-difficulty template,
//! so the messaging collaborator can always be acknowledged and never
//! triggers a redelivery storm.
//!
//! Units of work for different senders run fully parallel; units for the
//! same sender are serialized through a per-sender async lock, with the
//! repository's CAS writes as the backstop against races with admin actions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::admin::{AdminCommand, AdminGate};
use crate::config::DEFAULT_TUTOR_PROMPT;
use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::ledger::CostLedger;
use crate::llm::{ChatMessage, CompletionRequest};
use crate::onboarding::{self, Advance, PromptKind, prompt};
use crate::routing::{RoutingTable, classify};
use crate::store::{StatDeltas, UserRepository};
use crate::users::{Language, SenderRecord};

/// XP granted per answered message.
const XP_PER_LESSON: i64 = 10;

/// Token and sampling limits for tutor replies.
const MAX_REPLY_TOKENS: u64 = 400;
const REPLY_TEMPERATURE: f64 = 0.7;

/// How often a lost CAS write is retried against fresh state before giving
/// up and answering from the stale view.
const CAS_RETRIES: usize = 2;

pub struct Gateway {
    repo: Arc<dyn UserRepository>,
    gate: Arc<AdminGate>,
    dispatcher: Arc<Dispatcher>,
    table: Arc<RoutingTable>,
    ledger: Arc<CostLedger>,
    tutor_notes: Option<String>,
    sender_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Gateway {
    pub fn new(
        repo: Arc<dyn UserRepository>,
        gate: Arc<AdminGate>,
        dispatcher: Arc<Dispatcher>,
        table: Arc<RoutingTable>,
        ledger: Arc<CostLedger>,
        tutor_notes: Option<String>,
    ) -> Self {
        Self {
            repo,
            gate,
            dispatcher,
            table,
            ledger,
            tutor_notes,
            sender_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one inbound message. Always produces a reply string.
    pub async fn handle_message(&self, sender_id: &str, text: &str) -> String {
        let lock = self.sender_lock(sender_id).await;
        let _guard = lock.lock().await;

        match self.process(sender_id, text).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(sender = sender_id, error = %e, "Message handling failed");
                let lang = self.sender_language(sender_id).await;
                prompt(lang, PromptKind::TechnicalDifficulty).to_string()
            }
        }
    }

    async fn process(&self, sender_id: &str, text: &str) -> Result<String, Error> {
        // Privileged commands win over everything, but only for allow-listed
        // senders and only when the text actually parses as a command.
        if self.gate.is_admin(sender_id) {
            let command = AdminCommand::parse(text);
            if command != AdminCommand::Unknown {
                return self.gate.handle_command(&command, sender_id).await;
            }
        }

        for attempt in 0.. {
            let record = self.repo.get_or_create(sender_id).await?;

            match onboarding::advance(&record, text) {
                Advance::Dispatch { record } => return self.tutor_reply(&record, text).await,

                Advance::Reply(outcome) => {
                    if !outcome.changed {
                        return Ok(outcome.reply);
                    }

                    if self.repo.update_record(&outcome.record).await? {
                        if outcome.application_complete {
                            // The CAS write succeeding means this delivery,
                            // and no other, owns the notification.
                            self.gate.notify_new_application(&outcome.record).await;
                        }
                        return Ok(outcome.reply);
                    }

                    // A concurrent admin action won the write. Re-read and
                    // run the message against the fresh state.
                    tracing::warn!(
                        sender = sender_id,
                        attempt,
                        "Onboarding write lost a race, retrying on fresh state"
                    );
                    if attempt >= CAS_RETRIES {
                        return Ok(outcome.reply);
                    }
                }
            }
        }
        unreachable!("retry loop always returns");
    }

    /// Approved path: classify, select, dispatch, award progress.
    async fn tutor_reply(&self, record: &SenderRecord, text: &str) -> Result<String, Error> {
        let tier = classify(text);
        let decision = self.table.select(tier, self.ledger.daily_total());
        tracing::info!(
            sender = %record.sender_id,
            tier = %decision.tier,
            provider = %decision.provider,
            model = %decision.model,
            reason = ?decision.reason,
            "Routing decision"
        );

        let request = CompletionRequest {
            system: self.system_prompt(record),
            messages: vec![ChatMessage::user(text)],
            max_tokens: MAX_REPLY_TOKENS,
            temperature: REPLY_TEMPERATURE,
        };

        match self.dispatcher.dispatch(&request, &decision).await {
            Ok(reply) => {
                self.repo
                    .increment_stats(
                        &record.sender_id,
                        StatDeltas {
                            experience_points: XP_PER_LESSON,
                            lessons_completed: 1,
                        },
                    )
                    .await?;
                Ok(reply)
            }
            Err(e) => {
                // The cause stays in the logs; the sender only ever sees the
                // localized apology.
                tracing::error!(sender = %record.sender_id, error = %e, "Dispatch failed");
                Ok(prompt(record.preferred_language, PromptKind::TechnicalDifficulty).to_string())
            }
        }
    }

    fn system_prompt(&self, record: &SenderRecord) -> String {
        let mut sections = vec![DEFAULT_TUTOR_PROMPT.to_string()];

        if let Some(notes) = &self.tutor_notes {
            sections.push(format!("Operator notes:\n{notes}"));
        }

        sections.push(format!(
            "Student profile:\n\
             - Name: {}\n\
             - Level: {}\n\
             - Learning goal: {}\n\
             - Lessons completed: {}\n\
             - Native languages: {}",
            record.profile.name.as_deref().unwrap_or("unknown"),
            record.proficiency_level,
            record.profile.goal.as_deref().unwrap_or("not set"),
            record.lessons_completed,
            record.profile.spoken_languages.as_deref().unwrap_or("unknown"),
        ));

        sections.join("\n\n")
    }

    async fn sender_language(&self, sender_id: &str) -> Language {
        match self.repo.get(sender_id).await {
            Ok(Some(record)) => record.preferred_language,
            _ => Language::default(),
        }
    }

    async fn sender_lock(&self, sender_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.sender_locks.lock().await;
        locks
            .entry(sender_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn ledger(&self) -> &Arc<CostLedger> {
        &self.ledger
    }
}
