//! Sender record model — status, onboarding step, profile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Approval status of a sender.
///
/// `Approved`, `Rejected` and `Suspended` are durable once set by the admin
/// gate; ordinary message input can never reach them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl SenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Suspended => "suspended",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            "suspended" => Self::Suspended,
            _ => Self::Pending,
        }
    }
}

impl std::fmt::Display for SenderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which profile field is currently being collected during registration.
///
/// Progresses linearly: None → CollectingName → CollectingCountry →
/// CollectingLanguages → CollectingGoal → None (application submitted).
/// Only the stored step decides which field an incoming message fills;
/// message content is never trusted for sequencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    #[default]
    None,
    CollectingName,
    CollectingCountry,
    CollectingLanguages,
    CollectingGoal,
}

impl OnboardingStep {
    /// The next step in the fixed collection sequence, if any.
    /// `CollectingGoal` returns `None` in the sense of the `None` step:
    /// the application is complete and awaits review.
    pub fn next(&self) -> OnboardingStep {
        match self {
            Self::None => Self::CollectingName,
            Self::CollectingName => Self::CollectingCountry,
            Self::CollectingCountry => Self::CollectingLanguages,
            Self::CollectingLanguages => Self::CollectingGoal,
            Self::CollectingGoal => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::CollectingName => "collecting_name",
            Self::CollectingCountry => "collecting_country",
            Self::CollectingLanguages => "collecting_languages",
            Self::CollectingGoal => "collecting_goal",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "collecting_name" => Self::CollectingName,
            "collecting_country" => Self::CollectingCountry,
            "collecting_languages" => Self::CollectingLanguages,
            "collecting_goal" => Self::CollectingGoal,
            _ => Self::None,
        }
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Languages the bot speaks to senders in. Chosen once by the language
/// selector token that starts registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    English,
    German,
    French,
    Arabic,
}

impl Language {
    /// Parse a language selector token. Accepts a menu digit, an ISO-ish
    /// code, or the language's own name in that language.
    pub fn from_token(text: &str) -> Option<Language> {
        match text.trim().to_lowercase().as_str() {
            "1" | "en" | "english" => Some(Self::English),
            "2" | "de" | "deutsch" | "german" => Some(Self::German),
            "3" | "fr" | "français" | "francais" | "french" => Some(Self::French),
            "4" | "ar" | "العربية" | "عربي" | "arabic" => Some(Self::Arabic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::English => "english",
            Self::German => "german",
            Self::French => "french",
            Self::Arabic => "arabic",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "german" => Self::German,
            "french" => Self::French,
            "arabic" => Self::Arabic,
            _ => Self::English,
        }
    }

    pub const ALL: [Language; 4] = [Self::English, Self::German, Self::French, Self::Arabic];
}

/// Registration profile, populated one field per onboarding step.
/// Immutable once the application is submitted, except by admin edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: Option<String>,
    pub country: Option<String>,
    pub spoken_languages: Option<String>,
    pub goal: Option<String>,
}

impl Profile {
    /// All four fields collected — the application is ready for review.
    pub fn is_complete(&self) -> bool {
        self.name.is_some()
            && self.country.is_some()
            && self.spoken_languages.is_some()
            && self.goal.is_some()
    }
}

/// A sender's durable record.
///
/// Invariant: `step != None` implies `status == Pending`. The store's CAS
/// operations and the onboarding engine's repair path both preserve it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderRecord {
    /// Opaque phone-like sender id (e.g. `whatsapp:+491701234567`).
    pub sender_id: String,
    pub status: SenderStatus,
    pub step: OnboardingStep,
    pub profile: Profile,
    pub preferred_language: Language,
    /// CEFR-style level, maintained by the tutor flow.
    pub proficiency_level: String,
    pub experience_points: i64,
    pub lessons_completed: i64,
    pub registered_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub approved_by: Option<String>,
    pub approval_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency token, bumped on every write.
    pub version: i64,
}

impl SenderRecord {
    /// A brand-new record: first contact, pending, no step yet.
    pub fn new(sender_id: &str) -> Self {
        let now = Utc::now();
        Self {
            sender_id: sender_id.to_string(),
            status: SenderStatus::Pending,
            step: OnboardingStep::None,
            profile: Profile::default(),
            preferred_language: Language::default(),
            proficiency_level: "A1".to_string(),
            experience_points: 0,
            lessons_completed: 0,
            registered_at: now,
            last_active_at: now,
            approved_by: None,
            approval_at: None,
            version: 0,
        }
    }

    /// Whether the record violates the step/status invariant.
    pub fn step_is_inconsistent(&self) -> bool {
        self.step != OnboardingStep::None && self.status != SenderStatus::Pending
    }
}
