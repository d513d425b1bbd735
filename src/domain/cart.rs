//! Cart, line item and user entities, plus the shared total computation.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub id: Uuid,
    pub cart_code: String,
    pub owner_id: Option<Uuid>,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(cart_code: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            cart_code,
            owner_id: None,
            paid: false,
            created_at: now,
            modified_at: now,
        }
    }
}

/// One cart line joined with the product it references. `unit_price` is the
/// catalog price at read time; totals are always recomputed from it.
#[derive(Debug, Clone, Serialize)]
pub struct LineItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: BigDecimal,
    pub quantity: i32,
}

impl LineItem {
    pub fn line_total(&self) -> BigDecimal {
        &self.unit_price * BigDecimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Sum of `price * quantity` over the cart. The only place this sum is
/// computed; cart summaries and checkout both go through it.
pub fn order_total(lines: &[LineItem]) -> BigDecimal {
    lines
        .iter()
        .map(LineItem::line_total)
        .fold(BigDecimal::from(0), |acc, x| acc + x)
}

/// The amount actually charged: the order total plus the fixed tax
/// surcharge.
pub fn checkout_total(lines: &[LineItem], tax: &BigDecimal) -> BigDecimal {
    order_total(lines) + tax.clone()
}
