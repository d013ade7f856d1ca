#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::Fingerprint;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Repository trait for enrolled identities
///
/// Identities are keyed by sensor slot. Writes that must pair with an
/// access log entry go through [`crate::transaction`] instead.
pub trait FingerprintRepository: Send + Sync {
    /// Insert or replace the identity in `fingerprint.id`
    async fn upsert(&self, fingerprint: &Fingerprint) -> StorageResult<()>;

    /// Find an identity by slot
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Fingerprint>>;

    /// All identities ordered by slot
    async fn find_all(&self) -> StorageResult<Vec<Fingerprint>>;

    /// Record a successful verify. Returns whether the identity exists.
    async fn touch_last_access(&self, id: i64, at: DateTime<Utc>) -> StorageResult<bool>;

    /// Remove an identity. Returns whether a row was deleted.
    async fn delete(&self, id: i64) -> StorageResult<bool>;

    /// Number of registered identities
    async fn count(&self) -> StorageResult<i64>;
}

/// SQLite implementation of FingerprintRepository
pub struct SqliteFingerprintRepository {
    pool: SqlitePool,
}

impl SqliteFingerprintRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl FingerprintRepository for SqliteFingerprintRepository {
    async fn upsert(&self, fingerprint: &Fingerprint) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fingerprints (id, name, registration_date, last_access)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                registration_date = excluded.registration_date,
                last_access = excluded.last_access
            "#,
        )
        .bind(fingerprint.id)
        .bind(&fingerprint.name)
        .bind(fingerprint.registration_date)
        .bind(fingerprint.last_access)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Fingerprint>> {
        let fingerprint = sqlx::query_as::<_, Fingerprint>(
            r#"
            SELECT id, name, registration_date, last_access
            FROM fingerprints
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(fingerprint)
    }

    async fn find_all(&self) -> StorageResult<Vec<Fingerprint>> {
        let fingerprints = sqlx::query_as::<_, Fingerprint>(
            r#"
            SELECT id, name, registration_date, last_access
            FROM fingerprints
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(fingerprints)
    }

    async fn touch_last_access(&self, id: i64, at: DateTime<Utc>) -> StorageResult<bool> {
        let result = sqlx::query("UPDATE fingerprints SET last_access = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM fingerprints WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> StorageResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM fingerprints")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use fingerkey_core::SlotId;

    async fn setup() -> (Database, SqliteFingerprintRepository) {
        let db = Database::in_memory().await.unwrap();
        let repo = SqliteFingerprintRepository::new(db.pool().clone());
        (db, repo)
    }

    fn identity(id: u16, name: &str) -> Fingerprint {
        Fingerprint::enrolled(SlotId::new(id).unwrap(), name)
    }

    #[tokio::test]
    async fn test_upsert_and_find() {
        let (_db, repo) = setup().await;
        let ada = identity(5, "Ada");
        repo.upsert(&ada).await.unwrap();

        let found = repo.find_by_id(5).await.unwrap().unwrap();
        assert_eq!(found.name, "Ada");
        assert_eq!(found.registration_date, ada.registration_date);
        assert!(repo.find_by_id(6).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_slot() {
        let (_db, repo) = setup().await;
        repo.upsert(&identity(5, "Ada")).await.unwrap();
        repo.upsert(&identity(5, "Grace")).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(repo.find_by_id(5).await.unwrap().unwrap().name, "Grace");
    }

    #[tokio::test]
    async fn test_find_all_ordered_by_slot() {
        let (_db, repo) = setup().await;
        for (id, name) in [(30, "C"), (2, "A"), (17, "B")] {
            repo.upsert(&identity(id, name)).await.unwrap();
        }

        let ids: Vec<i64> = repo.find_all().await.unwrap().iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![2, 17, 30]);
    }

    #[tokio::test]
    async fn test_touch_and_delete() {
        let (_db, repo) = setup().await;
        repo.upsert(&identity(9, "Linus")).await.unwrap();

        let later = Utc::now() + chrono::Duration::minutes(5);
        assert!(repo.touch_last_access(9, later).await.unwrap());
        assert_eq!(repo.find_by_id(9).await.unwrap().unwrap().last_access, Some(later));

        assert!(repo.delete(9).await.unwrap());
        assert!(!repo.delete(9).await.unwrap());
        assert!(!repo.touch_last_access(9, later).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_slot_range_enforced_by_schema() {
        let (_db, repo) = setup().await;
        let mut bad = identity(1, "Nobody");
        bad.id = 128;
        assert!(repo.upsert(&bad).await.is_err());
    }
}
