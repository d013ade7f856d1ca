//! Transaction-aware writes.
//!
//! The registry records each command outcome as one transaction: a verify
//! touches the identity and appends a log, a delete appends a log and then
//! removes the identity, which nulls every log reference to it. These
//! functions take the open transaction so the steps commit or roll back
//! together.
//!
//! ```no_run
//! use fingerkey_storage::{Database, transaction};
//! use fingerkey_storage::models::AccessLog;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::in_memory().await?;
//! let mut tx = db.pool().begin().await?;
//! transaction::insert_access_log(&mut tx, &AccessLog::deleted(5)).await?;
//! transaction::delete_fingerprint(&mut tx, 5).await?;
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};

use crate::error::StorageResult;
use crate::models::{AccessLog, Fingerprint};

/// Insert an identity, replacing the name and dates if the slot is taken.
///
/// The sensor overwrites a slot on enrollment, so the registry follows.
pub async fn upsert_fingerprint(
    tx: &mut Transaction<'_, Sqlite>,
    fingerprint: &Fingerprint,
) -> StorageResult<()> {
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
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Set `last_access`. Returns whether the identity exists.
pub async fn touch_last_access(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    at: DateTime<Utc>,
) -> StorageResult<bool> {
    let result = sqlx::query("UPDATE fingerprints SET last_access = ? WHERE id = ?")
        .bind(at)
        .bind(id)
        .execute(&mut **tx)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Whether an identity is registered in slot `id`.
pub async fn fingerprint_exists(tx: &mut Transaction<'_, Sqlite>, id: i64) -> StorageResult<bool> {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM fingerprints WHERE id = ?)")
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;

    Ok(exists)
}

/// Append an access log entry and return its id.
///
/// A `fingerprint_id` must name a registered identity.
pub async fn insert_access_log(
    tx: &mut Transaction<'_, Sqlite>,
    log: &AccessLog,
) -> StorageResult<i64> {
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
    .execute(&mut **tx)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Remove an identity. Returns whether a row was deleted.
///
/// Log entries that referenced it keep their status and time but lose the
/// reference.
pub async fn delete_fingerprint(tx: &mut Transaction<'_, Sqlite>, id: i64) -> StorageResult<bool> {
    let result = sqlx::query("DELETE FROM fingerprints WHERE id = ?")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    Ok(result.rows_affected() > 0)
}
