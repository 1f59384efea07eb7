//! Idempotency Repository
//!
//! Idempotency keys for payment recording. A key is claimed and completed
//! inside the same ledger transaction as the posting it guards, so a key is
//! only ever visible as completed together with its posting.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::ledger::LedgerStoreError;

/// Idempotency key status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyStatus {
    Processing,
    Completed,
}

impl From<String> for IdempotencyStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "completed" => IdempotencyStatus::Completed,
            _ => IdempotencyStatus::Processing,
        }
    }
}

impl std::fmt::Display for IdempotencyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdempotencyStatus::Processing => write!(f, "processing"),
            IdempotencyStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Outcome of claiming a key
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyClaim {
    /// First use of the key; the caller must post and then complete it
    Fresh,
    /// Key already completed with the same request; replay this body
    Replay(serde_json::Value),
}

/// Idempotency Repository Error
#[derive(Debug, thiserror::Error)]
pub enum IdempotencyError {
    #[error(transparent)]
    Store(#[from] LedgerStoreError),

    #[error("Request hash mismatch for key {0}")]
    HashMismatch(Uuid),

    #[error("Key {0} completed without a stored response")]
    MissingResponse(Uuid),
}

impl From<sqlx::Error> for IdempotencyError {
    fn from(err: sqlx::Error) -> Self {
        IdempotencyError::Store(LedgerStoreError::from(err))
    }
}

/// Repository for managing idempotency keys
#[derive(Debug, Clone, Default)]
pub struct IdempotencyRepository;

impl IdempotencyRepository {
    pub fn new() -> Self {
        Self
    }

    /// Claim `key` for the organization within the ledger transaction
    pub async fn claim(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        organization_id: Uuid,
        key: Uuid,
        request_hash: &str,
    ) -> Result<IdempotencyClaim, IdempotencyError> {
        // An expired key is free to be claimed again
        sqlx::query(
            r#"
            DELETE FROM idempotency_keys
            WHERE organization_id = $1 AND key = $2 AND expires_at < NOW()
            "#,
        )
        .bind(organization_id)
        .bind(key)
        .execute(&mut **tx)
        .await?;

        let existing: Option<(String, String, Option<serde_json::Value>)> = sqlx::query_as(
            r#"
            SELECT request_hash, processing_status, response_body
            FROM idempotency_keys
            WHERE organization_id = $1 AND key = $2
            FOR UPDATE
            "#,
        )
        .bind(organization_id)
        .bind(key)
        .fetch_optional(&mut **tx)
        .await?;

        match existing {
            Some((hash, _, _)) if hash != request_hash => Err(IdempotencyError::HashMismatch(key)),
            Some((_, status, body)) => match IdempotencyStatus::from(status) {
                IdempotencyStatus::Completed => body
                    .map(IdempotencyClaim::Replay)
                    .ok_or(IdempotencyError::MissingResponse(key)),
                IdempotencyStatus::Processing => Ok(IdempotencyClaim::Fresh),
            },
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO idempotency_keys
                        (organization_id, key, request_hash, processing_status)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(organization_id)
                .bind(key)
                .bind(request_hash)
                .bind(IdempotencyStatus::Processing.to_string())
                .execute(&mut **tx)
                .await?;

                Ok(IdempotencyClaim::Fresh)
            }
        }
    }

    /// Store the response for a claimed key
    pub async fn complete(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        organization_id: Uuid,
        key: Uuid,
        response_body: &serde_json::Value,
    ) -> Result<(), IdempotencyError> {
        sqlx::query(
            r#"
            UPDATE idempotency_keys
            SET processing_status = $3, response_body = $4, completed_at = NOW()
            WHERE organization_id = $1 AND key = $2
            "#,
        )
        .bind(organization_id)
        .bind(key)
        .bind(IdempotencyStatus::Completed.to_string())
        .bind(response_body)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Delete every expired key; returns how many were removed
    pub async fn cleanup_expired(&self, pool: &PgPool) -> Result<u64, IdempotencyError> {
        let rows = sqlx::query(
            r#"
            DELETE FROM idempotency_keys
            WHERE expires_at < NOW()
            "#,
        )
        .execute(pool)
        .await?
        .rows_affected();

        Ok(rows)
    }

    /// Compute SHA-256 hash of a canonical request for conflict detection
    pub fn compute_request_hash(body: &[u8]) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(body);
        hex::encode(hasher.finalize())
    }
}
