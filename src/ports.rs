//! Repository ports consumed by the service layer. Postgres adapters live in
//! `crate::adapters`; tests substitute in-memory implementations.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Cart, LineItem, Transaction, User};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate reference: {0}")]
    DuplicateReference(String),

    #[error("invalid status transition for reference {0}")]
    InvalidTransition(String),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// The authoritative record of payment attempts.
///
/// `complete` and `fail` are compare-and-set transitions guarded on the
/// current status being `pending`; concurrent callers for one reference
/// serialize here, and the loser observes `InvalidTransition`.
#[async_trait]
pub trait TransactionLedger: Send + Sync {
    /// Insert a fresh `pending` attempt. `DuplicateReference` on collision.
    async fn open(&self, tx: &Transaction) -> RepositoryResult<Transaction>;

    async fn find(&self, reference: &str) -> RepositoryResult<Transaction>;

    /// Transition `pending -> completed` and, in the same unit of work, mark
    /// the owning cart paid and assign it to `owner`. No state where one is
    /// updated and not the other is ever observable.
    async fn complete(&self, reference: &str, owner: Option<Uuid>)
        -> RepositoryResult<Transaction>;

    /// Transition `pending -> failed`. The cart is left untouched.
    async fn fail(&self, reference: &str) -> RepositoryResult<Transaction>;
}

/// Cart collaborator: carts and their line items.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn get_or_create(&self, cart_code: &str) -> RepositoryResult<Cart>;

    async fn get_by_code(&self, cart_code: &str) -> RepositoryResult<Cart>;

    async fn line_items(&self, cart_id: Uuid) -> RepositoryResult<Vec<LineItem>>;

    async fn add_item(&self, cart_id: Uuid, product_id: Uuid) -> RepositoryResult<LineItem>;

    async fn update_quantity(&self, item_id: Uuid, quantity: i32) -> RepositoryResult<LineItem>;

    async fn remove_item(&self, item_id: Uuid) -> RepositoryResult<()>;
}

/// Read-only user lookup, used to build gateway customer payloads.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get(&self, id: Uuid) -> RepositoryResult<User>;
}
