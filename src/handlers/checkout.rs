use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::domain::GatewayKind;
use crate::error::AppError;
use crate::gateway::GatewayCallback;

#[derive(Debug, Deserialize)]
pub struct InitiateRequest {
    pub cart_code: String,
    #[serde(default)]
    pub gateway: Option<GatewayKind>,
}

pub async fn initiate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<InitiateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = user_id_from_headers(&headers)?
        .ok_or_else(|| AppError::Unauthorized("X-User-Id header is required".to_string()))?;

    let gateway = request.gateway.unwrap_or(GatewayKind::Flutterwave);
    let session = state
        .checkout
        .start_checkout(&request.cart_code, user_id, gateway)
        .await?;

    Ok(Json(session))
}

/// Redirect-callback query parameters. The two gateways use different
/// names for the same three things, so every field is optional here and
/// normalized below.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub status: Option<String>,
    pub tx_ref: Option<String>,
    pub transaction_id: Option<String>,
    #[serde(rename = "paymentId")]
    pub payment_id: Option<String>,
    #[serde(rename = "PayerID")]
    pub payer_id: Option<String>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
}

#[derive(Serialize)]
struct CallbackResponse {
    message: &'static str,
    #[serde(rename = "subMessage")]
    sub_message: &'static str,
}

pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = user_id_from_headers(&headers)?;

    let reference = params
        .tx_ref
        .or(params.reference)
        .ok_or_else(|| AppError::BadRequest("callback carries no transaction reference".to_string()))?;

    let callback = GatewayCallback {
        reference,
        provider_tx_id: params.transaction_id.or(params.payment_id),
        payer_id: params.payer_id,
        status: params.status,
    };

    let receipt = state.checkout.handle_callback(user_id, callback).await?;

    let status_code = if receipt.is_settled() || receipt.replayed {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };

    Ok((
        status_code,
        Json(CallbackResponse {
            message: receipt.message,
            sub_message: receipt.sub_message,
        }),
    ))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state.ledger.find(&reference).await?;
    Ok(Json(tx))
}

fn user_id_from_headers(headers: &HeaderMap) -> Result<Option<Uuid>, AppError> {
    let Some(value) = headers.get("X-User-Id") else {
        return Ok(None);
    };

    let raw = value
        .to_str()
        .map_err(|_| AppError::BadRequest("X-User-Id header is not valid text".to_string()))?;

    raw.parse::<Uuid>()
        .map(Some)
        .map_err(|_| AppError::BadRequest("X-User-Id header is not a valid UUID".to_string()))
}
