//! Payment gateway abstraction.
//!
//! Providers differ in protocol (redirect-and-verify vs. redirect-and-
//! confirm), so each adapter normalizes its provider into two operations:
//! `initiate` returning an opaque approval handle, and `verify` turning a
//! callback into a trusted settlement outcome. The orchestrator never sees
//! provider-specific shapes.

pub mod flutterwave;
pub mod paypal;

pub use flutterwave::FlutterwaveGateway;
pub use paypal::PaypalGateway;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::Serialize;
use thiserror::Error;

use crate::domain::GatewayKind;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Unreachable(String),

    #[error("gateway rejected the request: {0}")]
    Rejected(String),

    #[error("invalid response from gateway: {0}")]
    InvalidResponse(String),

    #[error("gateway circuit breaker open: {0}")]
    CircuitOpen(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::InvalidResponse(err.to_string())
        } else {
            // Timeouts, connect failures and request build errors all mean
            // we cannot tell whether the charge happened.
            GatewayError::Unreachable(err.to_string())
        }
    }
}

/// Customer details forwarded to the provider's initiation endpoint.
#[derive(Debug, Clone)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Normalized initiation request built by the orchestrator.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub reference: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub customer: CustomerInfo,
}

/// Opaque handle returned by a successful initiation; the client is
/// redirected to `approval_url` to approve the charge.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayHandle {
    pub approval_url: String,
}

/// Normalized redirect-callback parameters. `reference` is always our own
/// reference; provider-assigned identifiers ride along for verification.
#[derive(Debug, Clone)]
pub struct GatewayCallback {
    pub reference: String,
    pub provider_tx_id: Option<String>,
    pub payer_id: Option<String>,
    pub status: Option<String>,
}

/// Result of verifying a callback against the provider. `success` reflects
/// what the provider reports; reconciliation against the stored snapshot
/// happens in the orchestrator.
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub reference: String,
    pub success: bool,
    pub verified_amount: Option<BigDecimal>,
    pub verified_currency: Option<String>,
}

impl SettlementOutcome {
    /// Provider-reported failure; no amounts to reconcile.
    pub fn unsuccessful(reference: &str) -> Self {
        Self {
            reference: reference.to_string(),
            success: false,
            verified_amount: None,
            verified_currency: None,
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn kind(&self) -> GatewayKind;

    /// Currency this provider settles in; snapshotted onto the transaction
    /// at initiation.
    fn currency(&self) -> &str;

    async fn initiate(&self, request: &PaymentRequest) -> Result<GatewayHandle, GatewayError>;

    async fn verify(&self, callback: &GatewayCallback) -> Result<SettlementOutcome, GatewayError>;
}

/// Decode a JSON amount into an exact decimal. Numbers are re-parsed from
/// their literal text so they never round-trip through `f64`.
pub(crate) fn decimal_from_json(value: &serde_json::Value) -> Option<BigDecimal> {
    match value {
        serde_json::Value::Number(n) => n.to_string().parse().ok(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_integer_amounts() {
        assert_eq!(
            decimal_from_json(&json!(29)),
            Some("29".parse::<BigDecimal>().unwrap())
        );
    }

    #[test]
    fn decodes_fractional_amounts_exactly() {
        assert_eq!(
            decimal_from_json(&json!(29.0)),
            Some("29.0".parse::<BigDecimal>().unwrap())
        );
    }

    #[test]
    fn decodes_string_amounts() {
        assert_eq!(
            decimal_from_json(&json!("29.00")),
            Some("29.00".parse::<BigDecimal>().unwrap())
        );
    }

    #[test]
    fn rejects_non_numeric_values() {
        assert_eq!(decimal_from_json(&json!(null)), None);
        assert_eq!(decimal_from_json(&json!("not-a-number")), None);
        assert_eq!(decimal_from_json(&json!({"total": "29.00"})), None);
    }
}
