//! Cost ledger — process-wide spend total and per-backend call statistics.
//!
//! A single mutex serializes every mutation, so an increment is never a
//! read-then-write against stale state. The daily total rolls to zero exactly
//! once when the local calendar day changes, checked on each access; it never
//! resets mid-day.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::routing::ProviderId;

/// Per-backend call counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderStats {
    pub calls: u64,
    pub total_latency_ms: u64,
    pub errors: u64,
}

/// Point-in-time copy of the ledger, for the health and stats surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerSnapshot {
    pub daily_total: Decimal,
    pub reset_date: NaiveDate,
    pub per_provider: HashMap<ProviderId, ProviderStats>,
}

struct LedgerState {
    daily_total: Decimal,
    reset_date: NaiveDate,
    per_provider: HashMap<ProviderId, ProviderStats>,
}

/// Shared cost ledger. One instance per process, shared across all senders.
pub struct CostLedger {
    state: Mutex<LedgerState>,
}

impl CostLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                daily_total: Decimal::ZERO,
                reset_date: Local::now().date_naive(),
                per_provider: HashMap::new(),
            }),
        }
    }

    /// Today's accumulated spend, after any due rollover.
    pub fn daily_total(&self) -> Decimal {
        self.daily_total_on(Local::now().date_naive())
    }

    /// Record one successful dispatch attempt.
    pub fn record_success(&self, provider: &ProviderId, unit_cost: Decimal, latency: Duration) {
        self.record_success_on(Local::now().date_naive(), provider, unit_cost, latency);
    }

    /// Record one failed dispatch attempt.
    pub fn record_failure(&self, provider: &ProviderId) {
        self.record_failure_on(Local::now().date_naive(), provider);
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut state = self.state.lock().expect("ledger mutex poisoned");
        roll_if_new_day(&mut state, Local::now().date_naive());
        LedgerSnapshot {
            daily_total: state.daily_total,
            reset_date: state.reset_date,
            per_provider: state.per_provider.clone(),
        }
    }

    // Date-explicit variants; the public wrappers pass the local calendar
    // day, tests pass fixed dates.

    fn daily_total_on(&self, today: NaiveDate) -> Decimal {
        let mut state = self.state.lock().expect("ledger mutex poisoned");
        roll_if_new_day(&mut state, today);
        state.daily_total
    }

    fn record_success_on(
        &self,
        today: NaiveDate,
        provider: &ProviderId,
        unit_cost: Decimal,
        latency: Duration,
    ) {
        let mut state = self.state.lock().expect("ledger mutex poisoned");
        roll_if_new_day(&mut state, today);
        state.daily_total += unit_cost;
        let stats = state.per_provider.entry(provider.clone()).or_default();
        stats.calls += 1;
        stats.total_latency_ms += latency.as_millis() as u64;
    }

    fn record_failure_on(&self, today: NaiveDate, provider: &ProviderId) {
        let mut state = self.state.lock().expect("ledger mutex poisoned");
        roll_if_new_day(&mut state, today);
        state.per_provider.entry(provider.clone()).or_default().errors += 1;
    }
}

impl Default for CostLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Reset the daily total when the calendar day moved on. Per-provider
/// counters are lifetime counters and survive the rollover.
fn roll_if_new_day(state: &mut LedgerState, today: NaiveDate) {
    if state.reset_date != today {
        tracing::info!(
            spent = %state.daily_total,
            from = %state.reset_date,
            to = %today,
            "Daily cost ledger rollover"
        );
        state.daily_total = Decimal::ZERO;
        state.reset_date = today;
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn success_accumulates_cost_and_latency() {
        let ledger = CostLedger::new();
        let provider = ProviderId::new("cheap");
        let today = day("2026-08-08");

        ledger.record_success_on(today, &provider, dec!(0.002), Duration::from_millis(120));
        ledger.record_success_on(today, &provider, dec!(0.002), Duration::from_millis(80));

        assert_eq!(ledger.daily_total_on(today), dec!(0.004));
        let snapshot = ledger.snapshot();
        let stats = &snapshot.per_provider[&provider];
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.total_latency_ms, 200);
        assert_eq!(stats.errors, 0);
    }

    #[test]
    fn failures_count_errors_not_cost() {
        let ledger = CostLedger::new();
        let provider = ProviderId::new("premium");
        let today = day("2026-08-08");

        ledger.record_failure_on(today, &provider);
        assert_eq!(ledger.daily_total_on(today), Decimal::ZERO);
        assert_eq!(ledger.snapshot().per_provider[&provider].errors, 1);
    }

    #[test]
    fn rolls_over_exactly_once_per_day_change() {
        let ledger = CostLedger::new();
        let provider = ProviderId::new("cheap");

        ledger.record_success_on(
            day("2026-08-08"),
            &provider,
            dec!(1.50),
            Duration::from_millis(10),
        );
        assert_eq!(ledger.daily_total_on(day("2026-08-08")), dec!(1.50));

        // Day changes: total resets, counters survive.
        assert_eq!(ledger.daily_total_on(day("2026-08-09")), Decimal::ZERO);
        assert_eq!(ledger.snapshot().per_provider[&provider].calls, 1);

        // Same day again: no second reset.
        ledger.record_success_on(
            day("2026-08-09"),
            &provider,
            dec!(0.25),
            Duration::from_millis(10),
        );
        assert_eq!(ledger.daily_total_on(day("2026-08-09")), dec!(0.25));
    }

    #[test]
    fn per_provider_calls_times_cost_matches_total() {
        let ledger = CostLedger::new();
        let today = day("2026-08-08");
        let cheap = ProviderId::new("cheap");
        let premium = ProviderId::new("premium");

        for _ in 0..3 {
            ledger.record_success_on(today, &cheap, dec!(0.002), Duration::from_millis(5));
        }
        for _ in 0..2 {
            ledger.record_success_on(today, &premium, dec!(0.05), Duration::from_millis(5));
        }

        let snapshot = ledger.snapshot();
        let reconstructed = Decimal::from(snapshot.per_provider[&cheap].calls) * dec!(0.002)
            + Decimal::from(snapshot.per_provider[&premium].calls) * dec!(0.05);
        assert_eq!(reconstructed, ledger.daily_total_on(today));
    }
}
