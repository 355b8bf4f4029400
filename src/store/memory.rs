//! In-memory `UserRepository` — used by unit and integration tests, and as a
//! fallback when the bot runs without a database path.
//!
//! Semantics mirror the libSQL backend exactly, including the CAS rules.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::DatabaseError;
use crate::store::traits::{AggregateStats, StatDeltas, UserRepository};
use crate::users::{OnboardingStep, SenderRecord, SenderStatus};

/// Map-backed repository guarded by a single RwLock.
#[derive(Default)]
pub struct MemoryRepository {
    records: RwLock<HashMap<String, SenderRecord>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryRepository {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn get_or_create(&self, sender_id: &str) -> Result<SenderRecord, DatabaseError> {
        let mut records = self.records.write().await;
        let record = records
            .entry(sender_id.to_string())
            .or_insert_with(|| SenderRecord::new(sender_id));
        Ok(record.clone())
    }

    async fn get(&self, sender_id: &str) -> Result<Option<SenderRecord>, DatabaseError> {
        Ok(self.records.read().await.get(sender_id).cloned())
    }

    async fn update_record(&self, record: &SenderRecord) -> Result<bool, DatabaseError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.sender_id) {
            Some(stored) if stored.version == record.version => {
                let mut updated = record.clone();
                updated.version += 1;
                updated.last_active_at = Utc::now();
                // Progress counters and approval fields are owned by their
                // dedicated operations, never by a record write.
                updated.experience_points = stored.experience_points;
                updated.lessons_completed = stored.lessons_completed;
                updated.approved_by = stored.approved_by.clone();
                updated.approval_at = stored.approval_at;
                *stored = updated;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_status(
        &self,
        sender_id: &str,
        status: SenderStatus,
        actor: &str,
    ) -> Result<bool, DatabaseError> {
        let mut records = self.records.write().await;
        let Some(stored) = records.get_mut(sender_id) else {
            return Ok(false);
        };

        let allowed = match status {
            SenderStatus::Approved | SenderStatus::Rejected => {
                stored.status == SenderStatus::Pending && stored.step == OnboardingStep::None
            }
            SenderStatus::Suspended => stored.status != SenderStatus::Suspended,
            SenderStatus::Pending => {
                return Err(DatabaseError::Query(
                    "cannot transition a sender back to pending".into(),
                ));
            }
        };
        if !allowed {
            return Ok(false);
        }

        stored.status = status;
        stored.version += 1;
        if status == SenderStatus::Approved {
            stored.approved_by = Some(actor.to_string());
            stored.approval_at = Some(Utc::now());
        }
        Ok(true)
    }

    async fn increment_stats(
        &self,
        sender_id: &str,
        deltas: StatDeltas,
    ) -> Result<(), DatabaseError> {
        let mut records = self.records.write().await;
        if let Some(stored) = records.get_mut(sender_id) {
            stored.experience_points += deltas.experience_points;
            stored.lessons_completed += deltas.lessons_completed;
            stored.last_active_at = Utc::now();
            stored.version += 1;
        }
        Ok(())
    }

    async fn list_by_status(
        &self,
        status: SenderStatus,
    ) -> Result<Vec<SenderRecord>, DatabaseError> {
        let records = self.records.read().await;
        let mut matching: Vec<SenderRecord> = records
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.registered_at);
        Ok(matching)
    }

    async fn aggregate_statistics(&self) -> Result<AggregateStats, DatabaseError> {
        let records = self.records.read().await;
        let mut stats = AggregateStats::default();
        let mut xp_sum = 0i64;
        for record in records.values() {
            match record.status {
                SenderStatus::Pending => stats.pending += 1,
                SenderStatus::Approved => stats.approved += 1,
                SenderStatus::Rejected => stats.rejected += 1,
                SenderStatus::Suspended => stats.suspended += 1,
            }
            stats.total += 1;
            stats.total_lessons += record.lessons_completed;
            xp_sum += record.experience_points;
        }
        if stats.total > 0 {
            stats.avg_experience = xp_sum as f64 / stats.total as f64;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stale_version_write_loses() {
        let repo = MemoryRepository::new();
        let record = repo.get_or_create("whatsapp:+10").await.unwrap();

        let mut first = record.clone();
        first.step = OnboardingStep::CollectingName;
        assert!(repo.update_record(&first).await.unwrap());

        // Second writer still holds version 0.
        let mut second = record;
        second.step = OnboardingStep::CollectingGoal;
        assert!(!repo.update_record(&second).await.unwrap());

        let stored = repo.get("whatsapp:+10").await.unwrap().unwrap();
        assert_eq!(stored.step, OnboardingStep::CollectingName);
    }

    #[tokio::test]
    async fn approve_twice_second_fails() {
        let repo = MemoryRepository::new();
        repo.get_or_create("whatsapp:+11").await.unwrap();
        assert!(
            repo.set_status("whatsapp:+11", SenderStatus::Approved, "admin:1")
                .await
                .unwrap()
        );
        assert!(
            !repo
                .set_status("whatsapp:+11", SenderStatus::Approved, "admin:1")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn record_write_cannot_touch_counters() {
        let repo = MemoryRepository::new();
        repo.get_or_create("whatsapp:+12").await.unwrap();
        repo.increment_stats(
            "whatsapp:+12",
            StatDeltas {
                experience_points: 10,
                lessons_completed: 1,
            },
        )
        .await
        .unwrap();

        let mut tampered = repo.get("whatsapp:+12").await.unwrap().unwrap();
        tampered.experience_points = 9999;
        assert!(repo.update_record(&tampered).await.unwrap());

        let stored = repo.get("whatsapp:+12").await.unwrap().unwrap();
        assert_eq!(stored.experience_points, 10);
    }
}
