use crate::error::StoreResult;
use crate::models::CredentialRecord;
use chrono::Utc;
use doorlink_core::SessionHandle;
use sqlx::SqlitePool;

/// Repository trait for credential record operations.
///
/// This trait defines the contract for credential persistence, enabling
/// testability through mock implementations and separation of concerns.
///
/// # Implementation Note
///
/// Methods are written in return-position `impl Future` form with a `Send`
/// bound so repository calls can run on spawned tasks; implementations
/// provide plain `async fn` bodies (Edition 2024, no async-trait macro).
pub trait CredentialRepository: Send + Sync {
    /// Load the credential record for an account, if one exists.
    fn find_by_account(
        &self,
        account_id: &str,
    ) -> impl Future<Output = StoreResult<Option<CredentialRecord>>> + Send;

    /// Seed the record for a newly configured account.
    ///
    /// A record that already exists is left untouched; startup never
    /// clobbers a token a previous run rotated.
    fn insert(&self, record: &CredentialRecord) -> impl Future<Output = StoreResult<()>> + Send;

    /// Persist a rotated refresh token together with the handle it came in.
    ///
    /// Compare-then-write semantics: the write happens only when the stored
    /// token differs from `new_token`, so calling twice with the same token
    /// results in exactly one durable write. Returns `true` if a row was
    /// written.
    fn persist_rotation(
        &self,
        account_id: &str,
        new_token: &str,
        handle: &SessionHandle,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Remove the record for an account.
    fn delete(&self, account_id: &str) -> impl Future<Output = StoreResult<()>> + Send;
}

/// SQLite implementation of [`CredentialRepository`].
#[derive(Debug, Clone)]
pub struct SqliteCredentialRepository {
    pool: SqlitePool,
}

impl SqliteCredentialRepository {
    /// Create a new SQLite credential repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl CredentialRepository for SqliteCredentialRepository {
    async fn find_by_account(&self, account_id: &str) -> StoreResult<Option<CredentialRecord>> {
        let record = sqlx::query_as::<_, CredentialRecord>(
            r#"
            SELECT account_id, refresh_token, handle, poll_interval_secs, updated_at
            FROM credentials
            WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert(&self, record: &CredentialRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO credentials
                (account_id, refresh_token, handle, poll_interval_secs, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.account_id)
        .bind(&record.refresh_token)
        .bind(&record.handle)
        .bind(record.poll_interval_secs)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn persist_rotation(
        &self,
        account_id: &str,
        new_token: &str,
        handle: &SessionHandle,
    ) -> StoreResult<bool> {
        let handle_json = handle.to_json()?;

        // Single-statement compare-then-write: the token comparison and the
        // update are atomic with respect to the row, so concurrent persist
        // calls for the same account cannot interleave into a torn record,
        // and a repeated identical token touches nothing.
        let result = sqlx::query(
            r#"
            INSERT INTO credentials (account_id, refresh_token, handle, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(account_id) DO UPDATE SET
                refresh_token = excluded.refresh_token,
                handle = excluded.handle,
                updated_at = excluded.updated_at
            WHERE credentials.refresh_token <> excluded.refresh_token
            "#,
        )
        .bind(account_id)
        .bind(new_token)
        .bind(&handle_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, account_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM credentials WHERE account_id = ?")
            .bind(account_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
