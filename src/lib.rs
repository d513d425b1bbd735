pub mod adapters;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod ports;
pub mod services;

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;

use crate::ports::{CartStore, TransactionLedger};
use crate::services::CheckoutService;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub checkout: Arc<CheckoutService>,
    pub ledger: Arc<dyn TransactionLedger>,
    pub carts: Arc<dyn CartStore>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/cart", get(handlers::carts::get_cart))
        .route(
            "/cart/items",
            post(handlers::carts::add_item).patch(handlers::carts::update_quantity),
        )
        .route("/cart/items/:id", delete(handlers::carts::remove_item))
        .route("/checkout/initiate", post(handlers::checkout::initiate))
        .route(
            "/checkout/callback",
            get(handlers::checkout::callback).post(handlers::checkout::callback),
        )
        .route(
            "/transactions/:reference",
            get(handlers::checkout::get_transaction),
        )
        .with_state(state)
}
