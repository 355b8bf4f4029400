//! Registration state machine.
//!
//! `advance` is a pure function over a sender record and one inbound message:
//! it returns the updated record, the templated reply, and whether the admin
//! gate must be told about a freshly completed application. Persistence and
//! notification are the caller's job, guarded by the repository's CAS write.

use crate::users::{Language, OnboardingStep, SenderRecord, SenderStatus};

use super::templates::{PromptKind, prompt};

/// Longest value accepted for a single profile field.
const MAX_FIELD_LEN: usize = 200;

/// What one inbound message did to a gated (non-approved) sender.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Record with the step/profile mutation applied. Persist with a CAS
    /// write when `changed` is true.
    pub record: SenderRecord,
    pub changed: bool,
    /// The application was just completed; notify the admin gate exactly
    /// once (the CAS write failing means another delivery already did).
    pub application_complete: bool,
    pub reply: String,
}

/// Result of feeding one message into the state machine.
#[derive(Debug, Clone)]
pub enum Advance {
    /// The sender stays gated; send the templated reply. The dispatcher is
    /// not invoked.
    Reply(StepOutcome),
    /// The sender is approved; the caller runs classify → select → dispatch.
    Dispatch { record: SenderRecord },
}

/// Repair an inconsistent record in place, returning whether anything moved.
///
/// Two faults can exist in stored data: a non-pending record that still
/// carries an onboarding step, and a pending record whose step was lost while
/// its profile is partially filled. Both are reset to the nearest valid step
/// rather than surfaced as errors.
pub fn repair_step(record: &mut SenderRecord) -> bool {
    if record.step_is_inconsistent() {
        record.step = OnboardingStep::None;
        return true;
    }

    if record.status == SenderStatus::Pending
        && record.step == OnboardingStep::None
        && !record.profile.is_complete()
    {
        let nearest = nearest_pending_step(record);
        if nearest != OnboardingStep::None {
            record.step = nearest;
            return true;
        }
    }

    false
}

/// The step a partially filled pending profile should resume at. Fields fill
/// in a fixed order, so the first missing one names the step — unless nothing
/// was collected yet, in which case the sender has not started.
fn nearest_pending_step(record: &SenderRecord) -> OnboardingStep {
    let profile = &record.profile;
    if profile.name.is_none() {
        // Nothing collected yet: still at the language menu.
        return OnboardingStep::None;
    }
    if profile.country.is_none() {
        return OnboardingStep::CollectingCountry;
    }
    if profile.spoken_languages.is_none() {
        return OnboardingStep::CollectingLanguages;
    }
    OnboardingStep::CollectingGoal
}

/// Feed one inbound message through the state machine.
pub fn advance(record: &SenderRecord, text: &str) -> Advance {
    let mut record = record.clone();
    let repaired = repair_step(&mut record);
    if repaired {
        tracing::warn!(
            sender = %record.sender_id,
            step = %record.step,
            "Repaired inconsistent onboarding step"
        );
    }

    let lang = record.preferred_language;

    match record.status {
        SenderStatus::Approved => Advance::Dispatch { record },
        SenderStatus::Rejected => Advance::Reply(StepOutcome {
            record,
            changed: repaired,
            application_complete: false,
            reply: prompt(lang, PromptKind::Rejected).to_string(),
        }),
        SenderStatus::Suspended => Advance::Reply(StepOutcome {
            record,
            changed: repaired,
            application_complete: false,
            reply: prompt(lang, PromptKind::Suspended).to_string(),
        }),
        SenderStatus::Pending => Advance::Reply(advance_pending(record, repaired, text)),
    }
}

fn advance_pending(mut record: SenderRecord, repaired: bool, text: &str) -> StepOutcome {
    let input = text.trim();

    match record.step {
        OnboardingStep::None if record.profile.is_complete() => {
            // Application submitted, decision outstanding.
            StepOutcome {
                reply: prompt(record.preferred_language, PromptKind::AwaitingReview).to_string(),
                record,
                changed: repaired,
                application_complete: false,
            }
        }

        OnboardingStep::None => match Language::from_token(input) {
            Some(lang) => {
                record.preferred_language = lang;
                record.step = OnboardingStep::CollectingName;
                StepOutcome {
                    reply: prompt(lang, PromptKind::AskName).to_string(),
                    record,
                    changed: true,
                    application_complete: false,
                }
            }
            None => StepOutcome {
                reply: prompt(record.preferred_language, PromptKind::LanguageSelect).to_string(),
                record,
                changed: repaired,
                application_complete: false,
            },
        },

        step => collect_field(record, repaired, step, input),
    }
}

/// Store the field named by the current step and move to the next one. Which
/// field gets filled is decided by the stored step alone, never by the
/// message content.
fn collect_field(
    mut record: SenderRecord,
    repaired: bool,
    step: OnboardingStep,
    input: &str,
) -> StepOutcome {
    if input.is_empty() {
        // Nothing to store; re-ask the current question.
        let kind = ask_prompt_for(step);
        return StepOutcome {
            reply: prompt(record.preferred_language, kind).to_string(),
            record,
            changed: repaired,
            application_complete: false,
        };
    }

    let value: String = input.chars().take(MAX_FIELD_LEN).collect();
    let next = step.next();

    match step {
        OnboardingStep::CollectingName => record.profile.name = Some(value),
        OnboardingStep::CollectingCountry => record.profile.country = Some(value),
        OnboardingStep::CollectingLanguages => record.profile.spoken_languages = Some(value),
        OnboardingStep::CollectingGoal => record.profile.goal = Some(value),
        OnboardingStep::None => unreachable!("collect_field called with step none"),
    }
    record.step = next;

    let application_complete = next == OnboardingStep::None;
    let reply_kind = if application_complete {
        PromptKind::RegistrationComplete
    } else {
        ask_prompt_for(next)
    };

    StepOutcome {
        reply: prompt(record.preferred_language, reply_kind).to_string(),
        record,
        changed: true,
        application_complete,
    }
}

fn ask_prompt_for(step: OnboardingStep) -> PromptKind {
    match step {
        OnboardingStep::CollectingName => PromptKind::AskName,
        OnboardingStep::CollectingCountry => PromptKind::AskCountry,
        OnboardingStep::CollectingLanguages => PromptKind::AskLanguages,
        OnboardingStep::CollectingGoal => PromptKind::AskGoal,
        OnboardingStep::None => PromptKind::LanguageSelect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::Profile;

    fn pending(step: OnboardingStep, profile: Profile) -> SenderRecord {
        let mut record = SenderRecord::new("whatsapp:+491700000001");
        record.step = step;
        record.profile = profile;
        record
    }

    fn expect_reply(advance_result: Advance) -> StepOutcome {
        match advance_result {
            Advance::Reply(outcome) => outcome,
            Advance::Dispatch { .. } => panic!("expected a gated reply"),
        }
    }

    #[test]
    fn unknown_text_re_emits_language_menu() {
        let record = pending(OnboardingStep::None, Profile::default());
        let outcome = expect_reply(advance(&record, "hi"));
        assert!(!outcome.changed);
        assert_eq!(outcome.record.step, OnboardingStep::None);
        assert_eq!(
            outcome.reply,
            prompt(Language::English, PromptKind::LanguageSelect)
        );
    }

    #[test]
    fn language_token_starts_collection() {
        let record = pending(OnboardingStep::None, Profile::default());
        let outcome = expect_reply(advance(&record, "deutsch"));
        assert!(outcome.changed);
        assert_eq!(outcome.record.step, OnboardingStep::CollectingName);
        assert_eq!(outcome.record.preferred_language, Language::German);
        assert_eq!(outcome.reply, prompt(Language::German, PromptKind::AskName));
    }

    #[test]
    fn full_walk_fires_admin_notification_once() {
        let record = pending(OnboardingStep::None, Profile::default());

        let s1 = expect_reply(advance(&record, "1"));
        let s2 = expect_reply(advance(&s1.record, "Amina Haddad"));
        let s3 = expect_reply(advance(&s2.record, "Syria"));
        let s4 = expect_reply(advance(&s3.record, "Arabic, English"));
        let s5 = expect_reply(advance(&s4.record, "Pass the B1 exam"));

        assert!(!s1.application_complete);
        assert!(!s4.application_complete);
        assert!(s5.application_complete);

        let done = &s5.record;
        assert_eq!(done.step, OnboardingStep::None);
        assert_eq!(done.status, SenderStatus::Pending);
        assert_eq!(done.profile.name.as_deref(), Some("Amina Haddad"));
        assert_eq!(done.profile.goal.as_deref(), Some("Pass the B1 exam"));
        assert!(done.profile.is_complete());

        // Next message: awaiting review, no second notification.
        let s6 = expect_reply(advance(done, "hello?"));
        assert!(!s6.application_complete);
        assert!(!s6.changed);
        assert_eq!(
            s6.reply,
            prompt(Language::English, PromptKind::AwaitingReview)
        );
    }

    #[test]
    fn step_decides_field_not_content() {
        // A message that looks like a country lands in `name` because the
        // stored step says so.
        let record = pending(OnboardingStep::CollectingName, Profile::default());
        let outcome = expect_reply(advance(&record, "Germany"));
        assert_eq!(outcome.record.profile.name.as_deref(), Some("Germany"));
        assert_eq!(outcome.record.profile.country, None);
        assert_eq!(outcome.record.step, OnboardingStep::CollectingCountry);
    }

    #[test]
    fn empty_input_re_asks_current_step() {
        let record = pending(OnboardingStep::CollectingCountry, Profile {
            name: Some("Amina".into()),
            ..Profile::default()
        });
        let outcome = expect_reply(advance(&record, "   "));
        assert!(!outcome.changed);
        assert_eq!(outcome.record.step, OnboardingStep::CollectingCountry);
        assert_eq!(
            outcome.reply,
            prompt(Language::English, PromptKind::AskCountry)
        );
    }

    #[test]
    fn rejected_and_suspended_are_terminal() {
        let mut record = SenderRecord::new("whatsapp:+491700000002");
        record.status = SenderStatus::Rejected;
        let outcome = expect_reply(advance(&record, "please?"));
        assert_eq!(outcome.record.status, SenderStatus::Rejected);
        assert_eq!(outcome.reply, prompt(Language::English, PromptKind::Rejected));

        record.status = SenderStatus::Suspended;
        let outcome = expect_reply(advance(&record, "anyone?"));
        assert_eq!(outcome.reply, prompt(Language::English, PromptKind::Suspended));
    }

    #[test]
    fn approved_goes_to_dispatch() {
        let mut record = SenderRecord::new("whatsapp:+491700000003");
        record.status = SenderStatus::Approved;
        match advance(&record, "Wie geht es dir?") {
            Advance::Dispatch { record } => {
                assert_eq!(record.status, SenderStatus::Approved);
            }
            Advance::Reply(_) => panic!("approved sender must dispatch"),
        }
    }

    #[test]
    fn repairs_step_on_non_pending_record() {
        let mut record = SenderRecord::new("whatsapp:+491700000004");
        record.status = SenderStatus::Approved;
        record.step = OnboardingStep::CollectingGoal;
        match advance(&record, "hallo") {
            Advance::Dispatch { record } => {
                assert_eq!(record.step, OnboardingStep::None);
            }
            Advance::Reply(_) => panic!("approved sender must dispatch"),
        }
    }

    #[test]
    fn repairs_lost_step_from_partial_profile() {
        let record = pending(OnboardingStep::None, Profile {
            name: Some("Amina".into()),
            country: Some("Syria".into()),
            ..Profile::default()
        });
        let outcome = expect_reply(advance(&record, "Arabic"));
        // Resumed at collecting_languages, so the text filled that field.
        assert_eq!(
            outcome.record.profile.spoken_languages.as_deref(),
            Some("Arabic")
        );
        assert_eq!(outcome.record.step, OnboardingStep::CollectingGoal);
    }

    #[test]
    fn long_field_values_are_truncated() {
        let record = pending(OnboardingStep::CollectingName, Profile::default());
        let long = "x".repeat(1000);
        let outcome = expect_reply(advance(&record, &long));
        assert_eq!(
            outcome.record.profile.name.as_ref().unwrap().chars().count(),
            MAX_FIELD_LEN
        );
    }
}
