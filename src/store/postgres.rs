//! Postgres-backed key-value store for metrics documents

use super::{ApplyFn, CasOutcome, KvStore, StoreResult, Versioned};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

#[derive(Clone, Debug)]
pub struct PgKvStore {
    pool: PgPool,
}

impl PgKvStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KvStore for PgKvStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Versioned>> {
        let row: Option<(Value, i64)> =
            sqlx::query_as("SELECT value, version FROM kv_entries WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(value, version)| Versioned { value, version }))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<i64>,
        value: Value,
    ) -> StoreResult<CasOutcome> {
        let result = match expected {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO kv_entries (key, value, version)
                    VALUES ($1, $2, 1)
                    ON CONFLICT (key) DO NOTHING
                    "#,
                )
                .bind(key)
                .bind(&value)
                .execute(&self.pool)
                .await?
            }
            Some(version) => {
                sqlx::query(
                    r#"
                    UPDATE kv_entries
                    SET value = $2, version = version + 1, updated_at = NOW()
                    WHERE key = $1 AND version = $3
                    "#,
                )
                .bind(key)
                .bind(&value)
                .bind(version)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 1 {
            Ok(CasOutcome::Updated)
        } else {
            Ok(CasOutcome::Conflict)
        }
    }

    async fn put(&self, key: &str, value: Value) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, version)
            VALUES ($1, $2, 1)
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value,
                version = kv_entries.version + 1,
                updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(&value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Row-locked read-modify-write in one transaction; concurrent writers
    /// queue on the lock instead of retrying.
    async fn update(&self, key: &str, apply: &mut ApplyFn<'_>) -> StoreResult<Value> {
        let mut tx = self.pool.begin().await?;

        // Version 0 marks a placeholder row that exists only so it can be
        // locked; it is never visible outside this transaction.
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, version)
            VALUES ($1, 'null'::jsonb, 0)
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(key)
        .execute(&mut *tx)
        .await?;

        let (current, version): (Value, i64) =
            sqlx::query_as("SELECT value, version FROM kv_entries WHERE key = $1 FOR UPDATE")
                .bind(key)
                .fetch_one(&mut *tx)
                .await?;

        let next = apply((version > 0).then_some(current))?;

        sqlx::query(
            r#"
            UPDATE kv_entries
            SET value = $2, version = version + 1, updated_at = NOW()
            WHERE key = $1
            "#,
        )
        .bind(key)
        .bind(&next)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(next)
    }
}
