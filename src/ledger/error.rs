//! Ledger Store Errors

/// Errors raised while reading or writing the ledger tables
#[derive(Debug, thiserror::Error)]
pub enum LedgerStoreError {
    /// Serializable transaction lost a conflict (SQLSTATE 40001 / 40P01)
    #[error("Serialization failure: {0}")]
    SerializationFailure(String),

    /// Any other database error
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Stored row cannot be mapped to a domain value
    #[error("Invalid ledger row: {0}")]
    InvalidRow(String),
}

impl LedgerStoreError {
    /// Check if the whole transaction can be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerStoreError::SerializationFailure(_))
    }
}

impl From<sqlx::Error> for LedgerStoreError {
    fn from(err: sqlx::Error) -> Self {
        let code = match &err {
            sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
            _ => None,
        };

        match code.as_deref() {
            Some("40001") | Some("40P01") => {
                LedgerStoreError::SerializationFailure(err.to_string())
            }
            _ => LedgerStoreError::Database(err),
        }
    }
}
