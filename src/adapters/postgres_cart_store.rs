//! Postgres implementation of CartStore.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Cart, LineItem};
use crate::ports::{CartStore, RepositoryError, RepositoryResult};

const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Clone)]
pub struct PostgresCartStore {
    pool: PgPool,
}

impl PostgresCartStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn line_item(&self, item_id: Uuid) -> RepositoryResult<LineItem> {
        let row = sqlx::query_as::<_, LineItemRow>(
            r#"
            SELECT ci.id, ci.product_id, p.name AS product_name,
                   p.price AS unit_price, ci.quantity
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.id = $1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        row.map(LineItemRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(format!("cart item {}", item_id)))
    }
}

#[async_trait]
impl CartStore for PostgresCartStore {
    async fn get_or_create(&self, cart_code: &str) -> RepositoryResult<Cart> {
        // The no-op conflict update makes RETURNING yield the existing row.
        let row = sqlx::query_as::<_, CartRow>(
            r#"
            INSERT INTO carts (id, cart_code)
            VALUES ($1, $2)
            ON CONFLICT (cart_code) DO UPDATE SET cart_code = EXCLUDED.cart_code
            RETURNING id, cart_code, owner_id, paid, created_at, modified_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(cart_code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(row.into_domain())
    }

    async fn get_by_code(&self, cart_code: &str) -> RepositoryResult<Cart> {
        let row = sqlx::query_as::<_, CartRow>("SELECT * FROM carts WHERE cart_code = $1")
            .bind(cart_code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        row.map(CartRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(format!("cart {}", cart_code)))
    }

    async fn line_items(&self, cart_id: Uuid) -> RepositoryResult<Vec<LineItem>> {
        let rows = sqlx::query_as::<_, LineItemRow>(
            r#"
            SELECT ci.id, ci.product_id, p.name AS product_name,
                   p.price AS unit_price, ci.quantity
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.id
            "#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(rows.into_iter().map(LineItemRow::into_domain).collect())
    }

    async fn add_item(&self, cart_id: Uuid, product_id: Uuid) -> RepositoryResult<LineItem> {
        // Re-adding a product resets its quantity to one.
        let item_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = 1
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(cart_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) => {
                RepositoryError::NotFound(format!("product {}", product_id))
            }
            _ => RepositoryError::Storage(e.to_string()),
        })?;

        self.line_item(item_id).await
    }

    async fn update_quantity(&self, item_id: Uuid, quantity: i32) -> RepositoryResult<LineItem> {
        let updated = sqlx::query_scalar::<_, Uuid>(
            "UPDATE cart_items SET quantity = $2 WHERE id = $1 RETURNING id",
        )
        .bind(item_id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        match updated {
            Some(id) => self.line_item(id).await,
            None => Err(RepositoryError::NotFound(format!("cart item {}", item_id))),
        }
    }

    async fn remove_item(&self, item_id: Uuid) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(item_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("cart item {}", item_id)));
        }

        Ok(())
    }
}

/// Internal row types for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    cart_code: String,
    owner_id: Option<Uuid>,
    paid: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    modified_at: chrono::DateTime<chrono::Utc>,
}

impl CartRow {
    fn into_domain(self) -> Cart {
        Cart {
            id: self.id,
            cart_code: self.cart_code,
            owner_id: self.owner_id,
            paid: self.paid,
            created_at: self.created_at,
            modified_at: self.modified_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineItemRow {
    id: Uuid,
    product_id: Uuid,
    product_name: String,
    unit_price: bigdecimal::BigDecimal,
    quantity: i32,
}

impl LineItemRow {
    fn into_domain(self) -> LineItem {
        LineItem {
            id: self.id,
            product_id: self.product_id,
            product_name: self.product_name,
            unit_price: self.unit_price,
            quantity: self.quantity,
        }
    }
}
