//! Model selector — a validated, static tier→backend table plus the daily
//! budget override.
//!
//! Selection is a pure lookup: the same `(tier, daily_total)` pair always
//! yields the same decision. A table that cannot be validated is a startup
//! error, never a per-message one.

use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::error::ConfigError;
use crate::llm::LlmBackend;

use super::{ProviderId, ReasonCode, RoutingDecision, Tier};

/// One configured backend.
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    pub id: ProviderId,
    pub backend: LlmBackend,
    pub model: String,
    /// Estimated cost of one call, in currency units.
    pub unit_cost: Decimal,
    /// Per-call timeout owned by this backend's client.
    pub timeout: Duration,
}

/// Raw routing configuration, before validation.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub providers: Vec<ProviderSpec>,
    pub simple: ProviderId,
    pub medium: ProviderId,
    pub complex: ProviderId,
    pub daily_budget: Decimal,
}

/// The validated routing table.
///
/// Also owns the fallback order the dispatcher walks: all providers sorted by
/// ascending unit cost.
pub struct RoutingTable {
    specs: HashMap<ProviderId, ProviderSpec>,
    tiers: HashMap<Tier, ProviderId>,
    fallback_order: Vec<ProviderId>,
    daily_budget: Decimal,
}

impl RoutingTable {
    /// Validate a routing configuration. Errors here abort startup.
    pub fn new(config: RoutingConfig) -> Result<Self, ConfigError> {
        if config.providers.is_empty() {
            return Err(ConfigError::RoutingTable("no providers configured".into()));
        }

        let mut specs = HashMap::new();
        for spec in &config.providers {
            if spec.unit_cost < Decimal::ZERO {
                return Err(ConfigError::RoutingTable(format!(
                    "provider {} has a negative unit cost",
                    spec.id
                )));
            }
            if specs.insert(spec.id.clone(), spec.clone()).is_some() {
                return Err(ConfigError::RoutingTable(format!(
                    "duplicate provider id {}",
                    spec.id
                )));
            }
        }

        let tiers: HashMap<Tier, ProviderId> = [
            (Tier::Simple, config.simple.clone()),
            (Tier::Medium, config.medium.clone()),
            (Tier::Complex, config.complex.clone()),
        ]
        .into();

        for (tier, provider) in &tiers {
            if !specs.contains_key(provider) {
                return Err(ConfigError::RoutingTable(format!(
                    "tier {tier} maps to unknown provider {provider}"
                )));
            }
        }

        let mut fallback_order: Vec<ProviderId> = specs.keys().cloned().collect();
        fallback_order.sort_by(|a, b| {
            specs[a]
                .unit_cost
                .cmp(&specs[b].unit_cost)
                .then_with(|| a.as_str().cmp(b.as_str()))
        });

        Ok(Self {
            specs,
            tiers,
            fallback_order,
            daily_budget: config.daily_budget,
        })
    }

    /// Pick a backend for a tier given the ledger's current daily total.
    pub fn select(&self, tier: Tier, daily_total: Decimal) -> RoutingDecision {
        if daily_total > self.daily_budget {
            let cheapest = &self.specs[&self.fallback_order[0]];
            return RoutingDecision {
                tier,
                provider: cheapest.id.clone(),
                model: cheapest.model.clone(),
                estimated_unit_cost: cheapest.unit_cost,
                reason: ReasonCode::CostLimitReached,
            };
        }

        let spec = &self.specs[&self.tiers[&tier]];
        RoutingDecision {
            tier,
            provider: spec.id.clone(),
            model: spec.model.clone(),
            estimated_unit_cost: spec.unit_cost,
            reason: ReasonCode::TierDefault,
        }
    }

    /// All providers in ascending unit-cost order — the fallback chain.
    pub fn fallback_order(&self) -> &[ProviderId] {
        &self.fallback_order
    }

    /// Look up a provider's spec.
    pub fn spec(&self, provider: &ProviderId) -> Option<&ProviderSpec> {
        self.specs.get(provider)
    }

    pub fn daily_budget(&self) -> Decimal {
        self.daily_budget
    }
}
