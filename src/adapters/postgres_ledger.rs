//! Postgres implementation of TransactionLedger.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::Transaction;
use crate::ports::{RepositoryError, RepositoryResult, TransactionLedger};

const UNIQUE_VIOLATION: &str = "23505";

/// Postgres-backed transaction ledger.
///
/// Status transitions are compare-and-set updates guarded on
/// `status = 'pending'`; completion flips the cart row in the same SQL
/// transaction.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionLedger for PostgresLedger {
    async fn open(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO transactions (
                id, reference, cart_id, gateway, amount, currency, status,
                user_id, created_at, modified_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, reference, cart_id, gateway, amount, currency, status,
                user_id, created_at, modified_at
            "#,
        )
        .bind(tx.id)
        .bind(&tx.reference)
        .bind(tx.cart_id)
        .bind(tx.gateway.as_str())
        .bind(&tx.amount)
        .bind(&tx.currency)
        .bind(tx.status.as_str())
        .bind(tx.user_id)
        .bind(tx.created_at)
        .bind(tx.modified_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                RepositoryError::DuplicateReference(tx.reference.clone())
            }
            _ => RepositoryError::Storage(e.to_string()),
        })?;

        row.into_domain()
    }

    async fn find(&self, reference: &str) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE reference = $1",
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        row.map(|r| r.into_domain())
            .ok_or_else(|| RepositoryError::NotFound(reference.to_string()))?
    }

    async fn complete(
        &self,
        reference: &str,
        owner: Option<Uuid>,
    ) -> RepositoryResult<Transaction> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions
            SET status = 'completed', user_id = COALESCE($2, user_id), modified_at = NOW()
            WHERE reference = $1 AND status = 'pending'
            RETURNING id, reference, cart_id, gateway, amount, currency, status,
                user_id, created_at, modified_at
            "#,
        )
        .bind(reference)
        .bind(owner)
        .fetch_optional(&mut *db_tx)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        let Some(row) = row else {
            db_tx
                .rollback()
                .await
                .map_err(|e| RepositoryError::Storage(e.to_string()))?;
            return Err(self.transition_failure(reference).await);
        };

        sqlx::query(
            r#"
            UPDATE carts
            SET paid = TRUE, owner_id = COALESCE($2, owner_id), modified_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(row.cart_id)
        .bind(owner)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        db_tx
            .commit()
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        row.into_domain()
    }

    async fn fail(&self, reference: &str) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions
            SET status = 'failed', modified_at = NOW()
            WHERE reference = $1 AND status = 'pending'
            RETURNING id, reference, cart_id, gateway, amount, currency, status,
                user_id, created_at, modified_at
            "#,
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        match row {
            Some(row) => row.into_domain(),
            None => Err(self.transition_failure(reference).await),
        }
    }
}

impl PostgresLedger {
    /// A guarded update that matched no row either lost the CAS race or
    /// named an unknown reference; a follow-up read tells which.
    async fn transition_failure(&self, reference: &str) -> RepositoryError {
        match self.find(reference).await {
            Ok(_) => RepositoryError::InvalidTransition(reference.to_string()),
            Err(e) => e,
        }
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    reference: String,
    cart_id: Uuid,
    gateway: String,
    amount: bigdecimal::BigDecimal,
    currency: String,
    status: String,
    user_id: Option<Uuid>,
    created_at: chrono::DateTime<chrono::Utc>,
    modified_at: chrono::DateTime<chrono::Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        Ok(Transaction {
            id: self.id,
            reference: self.reference,
            cart_id: self.cart_id,
            gateway: self.gateway.parse().map_err(RepositoryError::Storage)?,
            amount: self.amount,
            currency: self.currency,
            status: self.status.parse().map_err(RepositoryError::Storage)?,
            user_id: self.user_id,
            created_at: self.created_at,
            modified_at: self.modified_at,
        })
    }
}
