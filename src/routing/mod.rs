//! Message routing — complexity classification and backend selection.

pub mod classifier;
pub mod selector;

pub use classifier::classify;
pub use selector::{ProviderSpec, RoutingConfig, RoutingTable};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Expected answer difficulty for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Simple,
    Medium,
    Complex,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Simple => "simple",
            Self::Medium => "medium",
            Self::Complex => "complex",
        };
        f.write_str(s)
    }
}

/// Opaque backend identifier. Which real vendors hide behind these names is
/// configuration, not code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Why the selector picked what it picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// The static tier→backend table applied.
    TierDefault,
    /// The daily budget is spent; the cheapest backend answers everything.
    CostLimitReached,
}

/// One routing decision, produced fresh per dispatch. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub tier: Tier,
    pub provider: ProviderId,
    pub model: String,
    pub estimated_unit_cost: Decimal,
    pub reason: ReasonCode,
}
