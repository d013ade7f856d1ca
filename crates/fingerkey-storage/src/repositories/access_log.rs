#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::{AccessLog, AccessLogEntry, AccessStatus};
use sqlx::SqlitePool;

/// Repository trait for the access log
///
/// The log is append-only. A reference must name a registered identity;
/// deleting the identity sets it to NULL.
pub trait AccessLogRepository: Send + Sync {
    /// Append an entry and return its `log_id`
    async fn create(&self, log: &AccessLog) -> StorageResult<i64>;

    /// Most recent entries first, joined with identity names
    async fn find_recent(&self, limit: i64) -> StorageResult<Vec<AccessLogEntry>>;

    /// Most recent entries for one identity
    async fn find_by_fingerprint(
        &self,
        fingerprint_id: i64,
        limit: i64,
    ) -> StorageResult<Vec<AccessLog>>;

    /// Number of entries with the given status
    async fn count_by_status(&self, status: AccessStatus) -> StorageResult<i64>;

    /// Total number of entries
    async fn count(&self) -> StorageResult<i64>;
}

/// SQLite implementation of AccessLogRepository
pub struct SqliteAccessLogRepository {
    pool: SqlitePool,
}

impl SqliteAccessLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AccessLogRepository for SqliteAccessLogRepository {
    async fn create(&self, log: &AccessLog) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO access_logs (fingerprint_id, timestamp, confidence, status)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(log.fingerprint_id)
        .bind(log.timestamp)
        .bind(log.confidence)
        .bind(log.status)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn find_recent(&self, limit: i64) -> StorageResult<Vec<AccessLogEntry>> {
        // log_id breaks ties between entries written in the same instant.
        let entries = sqlx::query_as::<_, AccessLogEntry>(
            r#"
            SELECT l.log_id, l.fingerprint_id, f.name,
                   l.timestamp, l.confidence, l.status
            FROM access_logs l
            LEFT JOIN fingerprints f ON l.fingerprint_id = f.id
            ORDER BY l.timestamp DESC, l.log_id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn find_by_fingerprint(
        &self,
        fingerprint_id: i64,
        limit: i64,
    ) -> StorageResult<Vec<AccessLog>> {
        let logs = sqlx::query_as::<_, AccessLog>(
            r#"
            SELECT log_id, fingerprint_id, timestamp, confidence, status
            FROM access_logs
            WHERE fingerprint_id = ?
            ORDER BY timestamp DESC, log_id DESC
            LIMIT ?
            "#,
        )
        .bind(fingerprint_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    async fn count_by_status(&self, status: AccessStatus) -> StorageResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM access_logs WHERE status = ?")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn count(&self) -> StorageResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM access_logs")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use crate::models::Fingerprint;
    use crate::repositories::{FingerprintRepository, SqliteFingerprintRepository};
    use chrono::{Duration, Utc};
    use fingerkey_core::SlotId;

    async fn setup() -> (Database, SqliteAccessLogRepository) {
        let db = Database::in_memory().await.unwrap();
        let repo = SqliteAccessLogRepository::new(db.pool().clone());
        (db, repo)
    }

    #[tokio::test]
    async fn test_recent_newest_first_with_names() {
        let (db, repo) = setup().await;
        let fingerprints = SqliteFingerprintRepository::new(db.pool().clone());
        fingerprints
            .upsert(&Fingerprint::enrolled(SlotId::new(4).unwrap(), "Ada"))
            .await
            .unwrap();

        let base = Utc::now();
        repo.create(&AccessLog::granted(4, 90).at(base)).await.unwrap();
        repo.create(&AccessLog::denied().at(base + Duration::seconds(1)))
            .await
            .unwrap();
        repo.create(&AccessLog::granted(4, 75).at(base + Duration::seconds(2)))
            .await
            .unwrap();

        let recent = repo.find_recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].confidence, 75);
        assert_eq!(recent[0].display_name(), "Ada");
        assert_eq!(recent[1].status, AccessStatus::Denied);
        assert_eq!(recent[1].display_name(), "Unknown");
    }

    #[tokio::test]
    async fn test_same_instant_ordered_by_insertion() {
        let (_db, repo) = setup().await;
        let now = Utc::now();
        let first = repo.create(&AccessLog::denied().at(now)).await.unwrap();
        let second = repo.create(&AccessLog::denied().at(now)).await.unwrap();

        let recent = repo.find_recent(20).await.unwrap();
        assert_eq!(recent[0].log_id, second);
        assert_eq!(recent[1].log_id, first);
    }

    #[tokio::test]
    async fn test_counts() {
        let (_db, repo) = setup().await;
        repo.create(&AccessLog::denied()).await.unwrap();
        repo.create(&AccessLog::denied()).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(repo.count_by_status(AccessStatus::Denied).await.unwrap(), 2);
        assert_eq!(repo.count_by_status(AccessStatus::Granted).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_identity_rejected() {
        let (_db, repo) = setup().await;
        assert!(repo.create(&AccessLog::granted(99, 80)).await.is_err());
        assert!(repo.create(&AccessLog::granted(200, 80)).await.is_err());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_by_fingerprint() {
        let (db, repo) = setup().await;
        let fingerprints = SqliteFingerprintRepository::new(db.pool().clone());
        for (slot, name) in [(3, "Ada"), (4, "Grace")] {
            fingerprints
                .upsert(&Fingerprint::enrolled(SlotId::new(slot).unwrap(), name))
                .await
                .unwrap();
        }

        repo.create(&AccessLog::granted(3, 80)).await.unwrap();
        repo.create(&AccessLog::granted(4, 81)).await.unwrap();
        repo.create(&AccessLog::deleted(3)).await.unwrap();

        let logs = repo.find_by_fingerprint(3, 20).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|l| l.fingerprint_id == Some(3)));

        fingerprints.delete(3).await.unwrap();
        assert!(repo.find_by_fingerprint(3, 20).await.unwrap().is_empty());
        assert_eq!(repo.find_by_fingerprint(4, 20).await.unwrap().len(), 1);
        assert_eq!(repo.count().await.unwrap(), 3);
    }
}
