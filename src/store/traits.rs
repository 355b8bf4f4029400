//! `UserRepository` trait — the single async interface the core consumes for
//! sender-record persistence.
//!
//! Writes that race (webhook redelivery, an admin approval landing mid-step)
//! are resolved with compare-and-set: record writes check the stored
//! `version`, status changes check the stored `status`/`step` precondition.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::users::{SenderRecord, SenderStatus};

/// Counter deltas applied atomically by [`UserRepository::increment_stats`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StatDeltas {
    pub experience_points: i64,
    pub lessons_completed: i64,
}

/// Aggregate counts for the admin STATS surface. Always computed from the
/// store, never from in-memory state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateStats {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub suspended: i64,
    pub total: i64,
    pub total_lessons: i64,
    pub avg_experience: f64,
}

/// Backend-agnostic sender-record repository.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Load a sender's record, creating a fresh `pending/none` record on
    /// first contact.
    async fn get_or_create(&self, sender_id: &str) -> Result<SenderRecord, DatabaseError>;

    /// Load a sender's record without creating it.
    async fn get(&self, sender_id: &str) -> Result<Option<SenderRecord>, DatabaseError>;

    /// Write back a record's mutable fields if the stored version still
    /// matches `record.version`. Returns `false` when a concurrent write won;
    /// the caller should reload and re-apply.
    ///
    /// On success the stored version is `record.version + 1`.
    async fn update_record(&self, record: &SenderRecord) -> Result<bool, DatabaseError>;

    /// Status compare-and-set, the only path to `approved`/`rejected`/
    /// `suspended`.
    ///
    /// For `Approved`/`Rejected` the precondition is `status == pending` and
    /// `step == none` (onboarding complete, not yet resolved). For
    /// `Suspended` the precondition is any known, not-already-suspended
    /// sender. Returns `false` when the precondition fails — that makes both
    /// admin surfaces idempotent without extra bookkeeping.
    async fn set_status(
        &self,
        sender_id: &str,
        status: SenderStatus,
        actor: &str,
    ) -> Result<bool, DatabaseError>;

    /// Atomically add progress counters and refresh `last_active_at`.
    async fn increment_stats(
        &self,
        sender_id: &str,
        deltas: StatDeltas,
    ) -> Result<(), DatabaseError>;

    /// All records currently in `status`, oldest registration first.
    async fn list_by_status(
        &self,
        status: SenderStatus,
    ) -> Result<Vec<SenderRecord>, DatabaseError>;

    /// Aggregate counts across every record.
    async fn aggregate_statistics(&self) -> Result<AggregateStats, DatabaseError>;
}
