//! Transaction domain entity.
//! Framework-agnostic representation of a single payment attempt.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Terminal-or-pending status of a payment attempt. Transitions are
/// monotonic: `Pending` may move to `Completed` or `Failed`, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

/// Which provider a payment attempt was initiated against. Recorded on the
/// transaction so callbacks select the adapter by this field, never by
/// callback shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    Flutterwave,
    Paypal,
}

impl GatewayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayKind::Flutterwave => "flutterwave",
            GatewayKind::Paypal => "paypal",
        }
    }
}

impl fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GatewayKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "flutterwave" => Ok(GatewayKind::Flutterwave),
            "paypal" => Ok(GatewayKind::Paypal),
            other => Err(format!("unknown gateway '{}'", other)),
        }
    }
}

/// Domain entity representing one ledgered payment attempt.
///
/// `reference` is the idempotency key for the whole settlement flow; the
/// amount/currency pair is a snapshot taken at initiation and never changes.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub reference: String,
    pub cart_id: Uuid,
    pub gateway: GatewayKind,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        reference: String,
        cart_id: Uuid,
        gateway: GatewayKind,
        amount: BigDecimal,
        currency: String,
        user_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            reference,
            cart_id,
            gateway,
            amount,
            currency,
            status: TransactionStatus::Pending,
            user_id,
            created_at: now,
            modified_at: now,
        }
    }
}
