//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmBackend;
use crate::routing::selector::{ProviderSpec, RoutingConfig};
use crate::routing::ProviderId;

/// The tutor persona sent as the system prompt for every approved message.
/// Profile context and operator notes are appended per request.
pub const DEFAULT_TUTOR_PROMPT: &str = "\
You are a highly qualified German language teacher (DaF/DaZ) with 15+ years of \
experience, specialised in Arabic- and French-speaking learners and in all \
German exams (A1-C2, telc, Goethe, DTZ, TestDaF).

Teaching method:
1. Assess the learner's level precisely (A1-C2).
2. Focus on ONE main mistake per message.
3. Explain grammar contrastively to the learner's native language.
4. Give concrete practice tasks and prepare for the target exam.
5. Be patient, motivating and professional.

Correction structure: positive reinforcement first, then the main correction, \
the rule, an example, and a short exercise.";

/// Twilio credentials for the WhatsApp channel.
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    /// The bot's WhatsApp number, e.g. `whatsapp:+14155238886`.
    pub from_number: String,
}

impl TwilioConfig {
    /// Build from `TWILIO_ACCOUNT_SID` / `TWILIO_AUTH_TOKEN` / `TWILIO_FROM`.
    /// Returns `None` when the account sid is unset (channel disabled, e.g.
    /// in tests).
    pub fn from_env() -> Option<Self> {
        let account_sid = std::env::var("TWILIO_ACCOUNT_SID").ok()?;
        let auth_token = std::env::var("TWILIO_AUTH_TOKEN").unwrap_or_default();
        let from_number = std::env::var("TWILIO_FROM")
            .unwrap_or_else(|_| "whatsapp:+14155238886".to_string());
        Some(Self {
            account_sid,
            auth_token: SecretString::from(auth_token),
            from_number,
        })
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: PathBuf,
    /// Sender ids allowed to issue chat admin commands.
    pub admin_numbers: Vec<String>,
    /// Shared secret for the HTTP admin surface.
    pub admin_secret: SecretString,
    pub twilio: Option<TwilioConfig>,
    pub routing: RoutingConfig,
    /// Optional operator notes file appended to the tutor persona.
    pub tutor_notes_path: Option<PathBuf>,
}

impl AppConfig {
    /// Read configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = std::env::var("SPRACHBOT_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                key: "SPRACHBOT_PORT".into(),
                message: format!("{e}"),
            })?;

        let db_path = std::env::var("SPRACHBOT_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/sprachbot.db"));

        let admin_numbers: Vec<String> = std::env::var("ADMIN_NUMBERS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if admin_numbers.is_empty() {
            tracing::warn!("ADMIN_NUMBERS is empty; chat admin commands are disabled");
        }

        let admin_secret = std::env::var("ADMIN_SECRET")
            .map(SecretString::from)
            .map_err(|_| ConfigError::MissingEnvVar("ADMIN_SECRET".into()))?;

        let tutor_notes_path = std::env::var("SPRACHBOT_TUTOR_NOTES").ok().map(PathBuf::from);

        Ok(Self {
            port,
            db_path,
            admin_numbers,
            admin_secret,
            twilio: TwilioConfig::from_env(),
            routing: routing_from_env()?,
            tutor_notes_path,
        })
    }
}

/// The default tier→backend table. Backend and model identifiers here are
/// deployment choices, overridable per tier via environment.
pub fn default_routing() -> RoutingConfig {
    RoutingConfig {
        providers: vec![
            ProviderSpec {
                id: ProviderId::new("openai-mini"),
                backend: LlmBackend::OpenAi,
                model: "gpt-4o-mini".to_string(),
                unit_cost: dec!(0.002),
                timeout: Duration::from_secs(30),
            },
            ProviderSpec {
                id: ProviderId::new("anthropic-sonnet"),
                backend: LlmBackend::Anthropic,
                model: "claude-sonnet-4-20250514".to_string(),
                unit_cost: dec!(0.01),
                timeout: Duration::from_secs(60),
            },
            ProviderSpec {
                id: ProviderId::new("anthropic-opus"),
                backend: LlmBackend::Anthropic,
                model: "claude-opus-4-20250514".to_string(),
                unit_cost: dec!(0.05),
                timeout: Duration::from_secs(90),
            },
        ],
        simple: ProviderId::new("openai-mini"),
        medium: ProviderId::new("anthropic-sonnet"),
        complex: ProviderId::new("anthropic-opus"),
        daily_budget: dec!(10.00),
    }
}

/// The default routing table with environment overrides applied:
/// `SPRACHBOT_DAILY_BUDGET`, and `SPRACHBOT_<TIER>_MODEL` to swap the model
/// a tier's provider calls.
fn routing_from_env() -> Result<RoutingConfig, ConfigError> {
    let mut routing = default_routing();

    if let Ok(raw) = std::env::var("SPRACHBOT_DAILY_BUDGET") {
        routing.daily_budget = raw.parse::<Decimal>().map_err(|e| ConfigError::InvalidValue {
            key: "SPRACHBOT_DAILY_BUDGET".into(),
            message: format!("{e}"),
        })?;
    }

    let overrides = [
        ("SPRACHBOT_SIMPLE_MODEL", routing.simple.clone()),
        ("SPRACHBOT_MEDIUM_MODEL", routing.medium.clone()),
        ("SPRACHBOT_COMPLEX_MODEL", routing.complex.clone()),
    ];
    for (var, provider) in overrides {
        if let Ok(model) = std::env::var(var) {
            if let Some(spec) = routing.providers.iter_mut().find(|s| s.id == provider) {
                spec.model = model;
            }
        }
    }

    Ok(routing)
}

#[cfg(test)]
mod tests {
    use crate::routing::RoutingTable;

    use super::*;

    #[test]
    fn default_routing_validates() {
        let table = RoutingTable::new(default_routing()).unwrap();
        assert_eq!(table.fallback_order().len(), 3);
        assert_eq!(table.daily_budget(), dec!(10.00));
    }

    #[test]
    fn default_fallback_order_is_ascending_cost() {
        let table = RoutingTable::new(default_routing()).unwrap();
        let order: Vec<&str> = table.fallback_order().iter().map(|p| p.as_str()).collect();
        assert_eq!(order, ["openai-mini", "anthropic-sonnet", "anthropic-opus"]);
    }
}
