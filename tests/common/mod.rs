//! Shared in-memory implementations of the repository ports.
//!
//! All three ports share one mutex-guarded world, so the ledger's
//! compare-and-set transitions and the cart flip happen under a single
//! lock, mirroring the one-unit-of-work guarantee of the Postgres
//! adapters.

#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use ventura_core::domain::{Cart, LineItem, Transaction, TransactionStatus, User};
use ventura_core::ports::{
    CartStore, RepositoryError, RepositoryResult, TransactionLedger, UserDirectory,
};

#[derive(Debug, Clone)]
struct StoredProduct {
    name: String,
    price: BigDecimal,
}

#[derive(Debug, Clone)]
struct StoredItem {
    id: Uuid,
    cart_id: Uuid,
    product_id: Uuid,
    quantity: i32,
}

#[derive(Default)]
struct WorldState {
    users: HashMap<Uuid, User>,
    products: HashMap<Uuid, StoredProduct>,
    carts: HashMap<Uuid, Cart>,
    items: HashMap<Uuid, StoredItem>,
    transactions: HashMap<String, Transaction>,
}

/// One shared world implementing every repository port.
#[derive(Clone, Default)]
pub struct InMemoryWorld {
    state: Arc<Mutex<WorldState>>,
}

impl InMemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, username: &str, email: &str) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            phone: None,
        };
        let id = user.id;
        self.state.lock().unwrap().users.insert(id, user);
        id
    }

    pub fn insert_product(&self, name: &str, price: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().products.insert(
            id,
            StoredProduct {
                name: name.to_string(),
                price: price.parse().unwrap(),
            },
        );
        id
    }

    pub fn insert_cart(&self, cart_code: &str) -> Cart {
        let cart = Cart::new(cart_code.to_string());
        self.state
            .lock()
            .unwrap()
            .carts
            .insert(cart.id, cart.clone());
        cart
    }

    pub fn insert_item(&self, cart_id: Uuid, product_id: Uuid, quantity: i32) -> Uuid {
        let item = StoredItem {
            id: Uuid::new_v4(),
            cart_id,
            product_id,
            quantity,
        };
        let id = item.id;
        self.state.lock().unwrap().items.insert(id, item);
        id
    }

    pub fn set_cart_paid(&self, cart_id: Uuid) {
        let mut state = self.state.lock().unwrap();
        let cart = state.carts.get_mut(&cart_id).unwrap();
        cart.paid = true;
    }

    pub fn cart(&self, cart_id: Uuid) -> Cart {
        self.state.lock().unwrap().carts[&cart_id].clone()
    }

    pub fn transaction(&self, reference: &str) -> Option<Transaction> {
        self.state
            .lock()
            .unwrap()
            .transactions
            .get(reference)
            .cloned()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.state
            .lock()
            .unwrap()
            .transactions
            .values()
            .cloned()
            .collect()
    }

    fn line_item(state: &WorldState, item: &StoredItem) -> RepositoryResult<LineItem> {
        let product = state
            .products
            .get(&item.product_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("product {}", item.product_id)))?;

        Ok(LineItem {
            id: item.id,
            product_id: item.product_id,
            product_name: product.name.clone(),
            unit_price: product.price.clone(),
            quantity: item.quantity,
        })
    }
}

#[async_trait]
impl TransactionLedger for InMemoryWorld {
    async fn open(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut state = self.state.lock().unwrap();
        if state.transactions.contains_key(&tx.reference) {
            return Err(RepositoryError::DuplicateReference(tx.reference.clone()));
        }
        state.transactions.insert(tx.reference.clone(), tx.clone());
        Ok(tx.clone())
    }

    async fn find(&self, reference: &str) -> RepositoryResult<Transaction> {
        self.state
            .lock()
            .unwrap()
            .transactions
            .get(reference)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(reference.to_string()))
    }

    async fn complete(
        &self,
        reference: &str,
        owner: Option<Uuid>,
    ) -> RepositoryResult<Transaction> {
        let mut state = self.state.lock().unwrap();

        let tx = state
            .transactions
            .get_mut(reference)
            .ok_or_else(|| RepositoryError::NotFound(reference.to_string()))?;
        if tx.status != TransactionStatus::Pending {
            return Err(RepositoryError::InvalidTransition(reference.to_string()));
        }

        tx.status = TransactionStatus::Completed;
        tx.user_id = owner.or(tx.user_id);
        tx.modified_at = Utc::now();
        let completed = tx.clone();

        // Same lock, same unit of work as the status flip.
        let cart = state
            .carts
            .get_mut(&completed.cart_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("cart {}", completed.cart_id)))?;
        cart.paid = true;
        cart.owner_id = owner.or(cart.owner_id);
        cart.modified_at = Utc::now();

        Ok(completed)
    }

    async fn fail(&self, reference: &str) -> RepositoryResult<Transaction> {
        let mut state = self.state.lock().unwrap();

        let tx = state
            .transactions
            .get_mut(reference)
            .ok_or_else(|| RepositoryError::NotFound(reference.to_string()))?;
        if tx.status != TransactionStatus::Pending {
            return Err(RepositoryError::InvalidTransition(reference.to_string()));
        }

        tx.status = TransactionStatus::Failed;
        tx.modified_at = Utc::now();
        Ok(tx.clone())
    }
}

#[async_trait]
impl CartStore for InMemoryWorld {
    async fn get_or_create(&self, cart_code: &str) -> RepositoryResult<Cart> {
        let mut state = self.state.lock().unwrap();
        if let Some(cart) = state.carts.values().find(|c| c.cart_code == cart_code) {
            return Ok(cart.clone());
        }
        let cart = Cart::new(cart_code.to_string());
        state.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn get_by_code(&self, cart_code: &str) -> RepositoryResult<Cart> {
        self.state
            .lock()
            .unwrap()
            .carts
            .values()
            .find(|c| c.cart_code == cart_code)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("cart {}", cart_code)))
    }

    async fn line_items(&self, cart_id: Uuid) -> RepositoryResult<Vec<LineItem>> {
        let state = self.state.lock().unwrap();
        state
            .items
            .values()
            .filter(|item| item.cart_id == cart_id)
            .map(|item| Self::line_item(&state, item))
            .collect()
    }

    async fn add_item(&self, cart_id: Uuid, product_id: Uuid) -> RepositoryResult<LineItem> {
        let mut state = self.state.lock().unwrap();
        if !state.products.contains_key(&product_id) {
            return Err(RepositoryError::NotFound(format!("product {}", product_id)));
        }

        if let Some(existing) = state
            .items
            .values_mut()
            .find(|item| item.cart_id == cart_id && item.product_id == product_id)
        {
            existing.quantity = 1;
            let existing = existing.clone();
            return Self::line_item(&state, &existing);
        }

        let item = StoredItem {
            id: Uuid::new_v4(),
            cart_id,
            product_id,
            quantity: 1,
        };
        state.items.insert(item.id, item.clone());
        Self::line_item(&state, &item)
    }

    async fn update_quantity(&self, item_id: Uuid, quantity: i32) -> RepositoryResult<LineItem> {
        let mut state = self.state.lock().unwrap();
        let item = state
            .items
            .get_mut(&item_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("cart item {}", item_id)))?;
        item.quantity = quantity;
        let item = item.clone();
        Self::line_item(&state, &item)
    }

    async fn remove_item(&self, item_id: Uuid) -> RepositoryResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .items
            .remove(&item_id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("cart item {}", item_id)))
    }
}

#[async_trait]
impl UserDirectory for InMemoryWorld {
    async fn get(&self, id: Uuid) -> RepositoryResult<User> {
        self.state
            .lock()
            .unwrap()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))
    }
}
