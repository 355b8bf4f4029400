//! libSQL repository — async `UserRepository` implementation.
//!
//! Supports local file and in-memory databases. `libsql::Connection` is
//! `Send + Sync` and safe for concurrent async use; write races are resolved
//! by the CAS `WHERE` clauses, not by an outer lock.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{AggregateStats, StatDeltas, UserRepository};
use crate::users::{Language, OnboardingStep, Profile, SenderRecord, SenderStatus};

/// Column list shared by every record query. Order matters for `row_to_record`.
const USER_COLUMNS: &str = "sender_id, status, onboarding_step, name, country, \
     spoken_languages, learning_goal, preferred_language, proficiency_level, \
     experience_points, lessons_completed, registered_at, last_active_at, \
     approved_by, approval_at, version";

/// libSQL-backed sender repository.
pub struct LibSqlRepository {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlRepository {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let repo = Self {
            db: Arc::new(db),
            conn,
        };
        repo.run_migrations().await?;
        info!(path = %path.display(), "User database opened");
        Ok(repo)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let repo = Self {
            db: Arc::new(db),
            conn,
        };
        repo.run_migrations().await?;
        Ok(repo)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn query_one(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Option<libsql::Row>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        rows.next().await.map_err(|e| DatabaseError::Query(e.to_string()))
    }
}

// ── Row mapping helpers ─────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn row_to_record(row: &libsql::Row) -> Result<SenderRecord, libsql::Error> {
    let sender_id: String = row.get(0)?;
    let status: String = row.get(1)?;
    let step: String = row.get(2)?;
    let name: Option<String> = row.get(3)?;
    let country: Option<String> = row.get(4)?;
    let spoken_languages: Option<String> = row.get(5)?;
    let goal: Option<String> = row.get(6)?;
    let preferred_language: String = row.get(7)?;
    let proficiency_level: String = row.get(8)?;
    let experience_points: i64 = row.get(9)?;
    let lessons_completed: i64 = row.get(10)?;
    let registered_at: String = row.get(11)?;
    let last_active_at: String = row.get(12)?;
    let approved_by: Option<String> = row.get(13)?;
    let approval_at: Option<String> = row.get(14)?;
    let version: i64 = row.get(15)?;

    Ok(SenderRecord {
        sender_id,
        status: SenderStatus::parse(&status),
        step: OnboardingStep::parse(&step),
        profile: Profile {
            name,
            country,
            spoken_languages,
            goal,
        },
        preferred_language: Language::parse(&preferred_language),
        proficiency_level,
        experience_points,
        lessons_completed,
        registered_at: parse_datetime(&registered_at),
        last_active_at: parse_datetime(&last_active_at),
        approved_by,
        approval_at: approval_at.as_deref().map(parse_datetime),
        version,
    })
}

#[async_trait]
impl UserRepository for LibSqlRepository {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_all(self.conn()).await
    }

    async fn get_or_create(&self, sender_id: &str) -> Result<SenderRecord, DatabaseError> {
        if let Some(existing) = self.get(sender_id).await? {
            return Ok(existing);
        }

        let record = SenderRecord::new(sender_id);
        // INSERT OR IGNORE so a concurrent first contact cannot fail; the
        // re-read below returns whichever write won.
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO users (
                    sender_id, status, onboarding_step, preferred_language,
                    proficiency_level, registered_at, last_active_at, version
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
                params![
                    record.sender_id.clone(),
                    record.status.as_str(),
                    record.step.as_str(),
                    record.preferred_language.as_str(),
                    record.proficiency_level.clone(),
                    record.registered_at.to_rfc3339(),
                    record.last_active_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        self.get(sender_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(sender_id.to_string()))
    }

    async fn get(&self, sender_id: &str) -> Result<Option<SenderRecord>, DatabaseError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE sender_id = ?1");
        let row = self.query_one(&sql, params![sender_id]).await?;
        row.map(|r| row_to_record(&r).map_err(|e| DatabaseError::Query(e.to_string())))
            .transpose()
    }

    async fn update_record(&self, record: &SenderRecord) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE users SET
                    status = ?2,
                    onboarding_step = ?3,
                    name = ?4,
                    country = ?5,
                    spoken_languages = ?6,
                    learning_goal = ?7,
                    preferred_language = ?8,
                    proficiency_level = ?9,
                    last_active_at = ?10,
                    version = version + 1
                 WHERE sender_id = ?1 AND version = ?11",
                params![
                    record.sender_id.clone(),
                    record.status.as_str(),
                    record.step.as_str(),
                    record.profile.name.clone(),
                    record.profile.country.clone(),
                    record.profile.spoken_languages.clone(),
                    record.profile.goal.clone(),
                    record.preferred_language.as_str(),
                    record.proficiency_level.clone(),
                    Utc::now().to_rfc3339(),
                    record.version,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        Ok(affected > 0)
    }

    async fn set_status(
        &self,
        sender_id: &str,
        status: SenderStatus,
        actor: &str,
    ) -> Result<bool, DatabaseError> {
        let affected = match status {
            SenderStatus::Approved => {
                self.conn()
                    .execute(
                        "UPDATE users SET
                            status = 'approved',
                            approved_by = ?2,
                            approval_at = ?3,
                            version = version + 1
                         WHERE sender_id = ?1
                           AND status = 'pending'
                           AND onboarding_step = 'none'",
                        params![sender_id, actor, Utc::now().to_rfc3339()],
                    )
                    .await
            }
            SenderStatus::Rejected => {
                self.conn()
                    .execute(
                        "UPDATE users SET status = 'rejected', version = version + 1
                         WHERE sender_id = ?1
                           AND status = 'pending'
                           AND onboarding_step = 'none'",
                        params![sender_id],
                    )
                    .await
            }
            SenderStatus::Suspended => {
                self.conn()
                    .execute(
                        "UPDATE users SET status = 'suspended', version = version + 1
                         WHERE sender_id = ?1 AND status != 'suspended'",
                        params![sender_id],
                    )
                    .await
            }
            SenderStatus::Pending => {
                return Err(DatabaseError::Query(
                    "cannot transition a sender back to pending".into(),
                ));
            }
        }
        .map_err(|e| DatabaseError::Query(e.to_string()))?;

        Ok(affected > 0)
    }

    async fn increment_stats(
        &self,
        sender_id: &str,
        deltas: StatDeltas,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE users SET
                    experience_points = experience_points + ?2,
                    lessons_completed = lessons_completed + ?3,
                    last_active_at = ?4,
                    version = version + 1
                 WHERE sender_id = ?1",
                params![
                    sender_id,
                    deltas.experience_points,
                    deltas.lessons_completed,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    async fn list_by_status(
        &self,
        status: SenderStatus,
    ) -> Result<Vec<SenderRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE status = ?1 ORDER BY registered_at ASC"
        );
        let mut rows = self
            .conn()
            .query(&sql, params![status.as_str()])
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            records.push(row_to_record(&row).map_err(|e| DatabaseError::Query(e.to_string()))?);
        }
        Ok(records)
    }

    async fn aggregate_statistics(&self) -> Result<AggregateStats, DatabaseError> {
        let row = self
            .query_one(
                "SELECT
                    COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'approved' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'rejected' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'suspended' THEN 1 ELSE 0 END), 0),
                    COUNT(*),
                    COALESCE(SUM(lessons_completed), 0),
                    COALESCE(AVG(experience_points), 0.0)
                 FROM users",
                (),
            )
            .await?
            .ok_or_else(|| DatabaseError::Query("aggregate query returned no row".into()))?;

        Ok(AggregateStats {
            pending: row.get(0).map_err(|e| DatabaseError::Query(e.to_string()))?,
            approved: row.get(1).map_err(|e| DatabaseError::Query(e.to_string()))?,
            rejected: row.get(2).map_err(|e| DatabaseError::Query(e.to_string()))?,
            suspended: row.get(3).map_err(|e| DatabaseError::Query(e.to_string()))?,
            total: row.get(4).map_err(|e| DatabaseError::Query(e.to_string()))?,
            total_lessons: row.get(5).map_err(|e| DatabaseError::Query(e.to_string()))?,
            avg_experience: row.get(6).map_err(|e| DatabaseError::Query(e.to_string()))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let repo = LibSqlRepository::new_memory().await.unwrap();
        let first = repo.get_or_create("whatsapp:+491701").await.unwrap();
        let second = repo.get_or_create("whatsapp:+491701").await.unwrap();
        assert_eq!(first.sender_id, second.sender_id);
        assert_eq!(second.status, SenderStatus::Pending);
        assert_eq!(second.step, OnboardingStep::None);
    }

    #[tokio::test]
    async fn update_record_checks_version() {
        let repo = LibSqlRepository::new_memory().await.unwrap();
        let mut record = repo.get_or_create("whatsapp:+491702").await.unwrap();
        record.step = OnboardingStep::CollectingName;
        record.preferred_language = Language::German;
        assert!(repo.update_record(&record).await.unwrap());

        // Stale version: the same write again must lose.
        assert!(!repo.update_record(&record).await.unwrap());

        let reloaded = repo.get("whatsapp:+491702").await.unwrap().unwrap();
        assert_eq!(reloaded.step, OnboardingStep::CollectingName);
        assert_eq!(reloaded.preferred_language, Language::German);
        assert_eq!(reloaded.version, record.version + 1);
    }

    #[tokio::test]
    async fn approve_requires_pending_with_step_none() {
        let repo = LibSqlRepository::new_memory().await.unwrap();
        let mut record = repo.get_or_create("whatsapp:+491703").await.unwrap();

        // Mid-onboarding: approval must refuse.
        record.step = OnboardingStep::CollectingCountry;
        assert!(repo.update_record(&record).await.unwrap());
        assert!(
            !repo
                .set_status("whatsapp:+491703", SenderStatus::Approved, "admin:1")
                .await
                .unwrap()
        );

        // Back to step none: approval succeeds exactly once.
        let mut record = repo.get("whatsapp:+491703").await.unwrap().unwrap();
        record.step = OnboardingStep::None;
        assert!(repo.update_record(&record).await.unwrap());
        assert!(
            repo.set_status("whatsapp:+491703", SenderStatus::Approved, "admin:1")
                .await
                .unwrap()
        );
        assert!(
            !repo
                .set_status("whatsapp:+491703", SenderStatus::Approved, "admin:2")
                .await
                .unwrap()
        );

        let reloaded = repo.get("whatsapp:+491703").await.unwrap().unwrap();
        assert_eq!(reloaded.status, SenderStatus::Approved);
        assert_eq!(reloaded.approved_by.as_deref(), Some("admin:1"));
        assert!(reloaded.approval_at.is_some());
    }

    #[tokio::test]
    async fn suspend_any_known_sender_once() {
        let repo = LibSqlRepository::new_memory().await.unwrap();
        repo.get_or_create("whatsapp:+491704").await.unwrap();
        repo.set_status("whatsapp:+491704", SenderStatus::Approved, "admin:1")
            .await
            .unwrap();

        assert!(
            repo.set_status("whatsapp:+491704", SenderStatus::Suspended, "admin:1")
                .await
                .unwrap()
        );
        assert!(
            !repo
                .set_status("whatsapp:+491704", SenderStatus::Suspended, "admin:1")
                .await
                .unwrap()
        );
        assert!(
            !repo
                .set_status("whatsapp:+490000", SenderStatus::Suspended, "admin:1")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn stats_aggregate_counters() {
        let repo = LibSqlRepository::new_memory().await.unwrap();
        repo.get_or_create("whatsapp:+1").await.unwrap();
        repo.get_or_create("whatsapp:+2").await.unwrap();
        repo.set_status("whatsapp:+2", SenderStatus::Approved, "admin:1")
            .await
            .unwrap();
        repo.increment_stats(
            "whatsapp:+2",
            StatDeltas {
                experience_points: 30,
                lessons_completed: 3,
            },
        )
        .await
        .unwrap();

        let stats = repo.aggregate_statistics().await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.total_lessons, 3);
        assert!((stats.avg_experience - 15.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn list_by_status_orders_by_registration() {
        let repo = LibSqlRepository::new_memory().await.unwrap();
        repo.get_or_create("whatsapp:+5").await.unwrap();
        repo.get_or_create("whatsapp:+6").await.unwrap();
        let pending = repo.list_by_status(SenderStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(repo
            .list_by_status(SenderStatus::Rejected)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn opens_local_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.db");
        let repo = LibSqlRepository::new_local(&path).await.unwrap();
        repo.get_or_create("whatsapp:+7").await.unwrap();
        assert!(path.exists());
    }
}
