use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::AppState;
use crate::domain::{LineItem, order_total};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub cart_code: String,
    pub product_id: Uuid,
}

pub async fn add_item(
    State(state): State<AppState>,
    Json(request): Json<AddItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    let cart = state.carts.get_or_create(&request.cart_code).await?;
    let item = state.carts.add_item(cart.id, request.product_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "data": item,
            "message": "Cart item created successfully"
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub item_id: Uuid,
    pub quantity: i32,
}

pub async fn update_quantity(
    State(state): State<AppState>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.quantity < 1 {
        return Err(AppError::BadRequest(
            "quantity must be at least 1".to_string(),
        ));
    }

    let item = state
        .carts
        .update_quantity(request.item_id, request.quantity)
        .await?;

    Ok(Json(json!({
        "data": item,
        "message": "Cart item updated successfully!"
    })))
}

pub async fn remove_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.carts.remove_item(item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CartQuery {
    pub cart_code: String,
}

#[derive(Serialize)]
struct CartItemView {
    id: Uuid,
    product_id: Uuid,
    product_name: String,
    unit_price: BigDecimal,
    quantity: i32,
    line_total: BigDecimal,
}

impl From<LineItem> for CartItemView {
    fn from(item: LineItem) -> Self {
        let line_total = item.line_total();
        Self {
            id: item.id,
            product_id: item.product_id,
            product_name: item.product_name,
            unit_price: item.unit_price,
            quantity: item.quantity,
            line_total,
        }
    }
}

#[derive(Serialize)]
struct CartResponse {
    id: Uuid,
    cart_code: String,
    paid: bool,
    items: Vec<CartItemView>,
    total: BigDecimal,
}

pub async fn get_cart(
    State(state): State<AppState>,
    Query(query): Query<CartQuery>,
) -> Result<impl IntoResponse, AppError> {
    let cart = state.carts.get_by_code(&query.cart_code).await.map_err(|e| {
        match e {
            crate::ports::RepositoryError::NotFound(_) => {
                AppError::NotFound(format!("Cart {} not found", query.cart_code))
            }
            other => other.into(),
        }
    })?;

    let lines = state.carts.line_items(cart.id).await?;
    let total = order_total(&lines);

    Ok(Json(CartResponse {
        id: cart.id,
        cart_code: cart.cart_code,
        paid: cart.paid,
        items: lines.into_iter().map(CartItemView::from).collect(),
        total,
    }))
}
