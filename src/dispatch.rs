//! Provider dispatcher — executes one routing decision with a bounded,
//! ascending-cost fallback chain.
//!
//! Every attempt, success or failure, mutates the ledger exactly once. A
//! timed-out call counts as a failure and feeds the chain. No provider is
//! attempted twice within one dispatch, so the chain terminates after at most
//! N−1 attempts beyond the original.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{ConfigError, DispatchError, LlmError};
use crate::ledger::CostLedger;
use crate::llm::{CompletionRequest, LlmProvider};
use crate::routing::{ProviderId, RoutingDecision, RoutingTable};

/// Executes routing decisions against real providers.
pub struct Dispatcher {
    clients: HashMap<ProviderId, Arc<dyn LlmProvider>>,
    table: Arc<RoutingTable>,
    ledger: Arc<CostLedger>,
}

impl Dispatcher {
    /// Build a dispatcher. Every provider in the routing table must have a
    /// client; a missing one is a startup configuration error.
    pub fn new(
        clients: HashMap<ProviderId, Arc<dyn LlmProvider>>,
        table: Arc<RoutingTable>,
        ledger: Arc<CostLedger>,
    ) -> Result<Self, ConfigError> {
        for provider in table.fallback_order() {
            if !clients.contains_key(provider) {
                return Err(ConfigError::RoutingTable(format!(
                    "provider {provider} has no client"
                )));
            }
        }
        Ok(Self {
            clients,
            table,
            ledger,
        })
    }

    /// Execute one dispatch: the decided provider first, then the fallback
    /// chain in ascending cost order, skipping anything already attempted.
    pub async fn dispatch(
        &self,
        request: &CompletionRequest,
        decision: &RoutingDecision,
    ) -> Result<String, DispatchError> {
        if !self.clients.contains_key(&decision.provider) {
            return Err(DispatchError::UnknownProvider(
                decision.provider.to_string(),
            ));
        }

        let mut attempted: Vec<ProviderId> = Vec::new();

        attempted.push(decision.provider.clone());
        match self.attempt(&decision.provider, request).await {
            Ok(reply) => return Ok(reply),
            Err(e) => {
                tracing::warn!(
                    provider = %decision.provider,
                    error = %e,
                    "Dispatch attempt failed, entering fallback chain"
                );
            }
        }

        for candidate in self.table.fallback_order() {
            if attempted.contains(candidate) {
                continue;
            }
            attempted.push(candidate.clone());
            match self.attempt(candidate, request).await {
                Ok(reply) => {
                    tracing::info!(
                        provider = %candidate,
                        failed = %decision.provider,
                        "Fallback provider answered"
                    );
                    return Ok(reply);
                }
                Err(e) => {
                    tracing::warn!(provider = %candidate, error = %e, "Fallback attempt failed");
                }
            }
        }

        tracing::error!(
            attempts = attempted.len(),
            tier = %decision.tier,
            "All providers unavailable"
        );
        Err(DispatchError::Exhausted {
            attempts: attempted.len(),
        })
    }

    /// One attempt against one provider, with that provider's timeout, and
    /// exactly one ledger mutation.
    async fn attempt(
        &self,
        provider: &ProviderId,
        request: &CompletionRequest,
    ) -> Result<String, LlmError> {
        let spec = self
            .table
            .spec(provider)
            .ok_or_else(|| LlmError::RequestFailed {
                provider: provider.to_string(),
                reason: "provider missing from routing table".to_string(),
            })?;
        let client = &self.clients[provider];

        let started = Instant::now();
        let outcome = tokio::time::timeout(spec.timeout, client.complete(request.clone())).await;

        match outcome {
            Ok(Ok(response)) => {
                self.ledger
                    .record_success(provider, spec.unit_cost, started.elapsed());
                Ok(response.content)
            }
            Ok(Err(e)) => {
                self.ledger.record_failure(provider);
                Err(e)
            }
            Err(_) => {
                self.ledger.record_failure(provider);
                Err(LlmError::Timeout {
                    provider: provider.to_string(),
                    timeout: spec.timeout,
                })
            }
        }
    }

    pub fn ledger(&self) -> &Arc<CostLedger> {
        &self.ledger
    }
}
