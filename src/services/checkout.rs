//! Settlement orchestrator.
//!
//! Coordinates ledger writes, gateway calls and cart state: a checkout
//! opens a pending ledger entry and hands the client to the gateway; the
//! gateway's callback is verified and reconciled against the stored
//! amount/currency snapshot before anything is marked paid.

use bigdecimal::BigDecimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{GatewayKind, Transaction, TransactionStatus, checkout_total};
use crate::error::AppError;
use crate::gateway::{CustomerInfo, GatewayCallback, GatewayError, PaymentGateway, PaymentRequest, SettlementOutcome};
use crate::ports::{CartStore, RepositoryError, TransactionLedger, UserDirectory};

const SETTLED_MESSAGE: &str = "Payment successful!";
const SETTLED_SUB_MESSAGE: &str =
    "You have successfully made payment for the items you purchased 😍";

const MISMATCH_MESSAGE: &str = "Payment verification failed.";
const MISMATCH_SUB_MESSAGE: &str = "Your payment verification failed, kindly try again. ✌️";

const UNVERIFIED_MESSAGE: &str = "Payment was not successful.";
const UNVERIFIED_SUB_MESSAGE: &str =
    "We couldn't verify your payment with the provider, try a different payment method. 👍";

/// What a client needs to continue a freshly opened checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub reference: String,
    pub approval_url: String,
}

/// Outcome of one callback. `replayed` marks a duplicate callback whose
/// stored result was returned without re-applying side effects.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementReceipt {
    pub reference: String,
    pub status: TransactionStatus,
    pub replayed: bool,
    pub message: &'static str,
    pub sub_message: &'static str,
}

impl SettlementReceipt {
    pub fn is_settled(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    fn settled(tx: &Transaction) -> Self {
        Self {
            reference: tx.reference.clone(),
            status: tx.status,
            replayed: false,
            message: SETTLED_MESSAGE,
            sub_message: SETTLED_SUB_MESSAGE,
        }
    }

    fn mismatched(tx: &Transaction) -> Self {
        Self {
            reference: tx.reference.clone(),
            status: tx.status,
            replayed: false,
            message: MISMATCH_MESSAGE,
            sub_message: MISMATCH_SUB_MESSAGE,
        }
    }

    fn unverified(tx: &Transaction) -> Self {
        Self {
            reference: tx.reference.clone(),
            status: tx.status,
            replayed: false,
            message: UNVERIFIED_MESSAGE,
            sub_message: UNVERIFIED_SUB_MESSAGE,
        }
    }

    fn replayed(tx: &Transaction) -> Self {
        let (message, sub_message) = match tx.status {
            TransactionStatus::Completed => (SETTLED_MESSAGE, SETTLED_SUB_MESSAGE),
            _ => (MISMATCH_MESSAGE, MISMATCH_SUB_MESSAGE),
        };
        Self {
            reference: tx.reference.clone(),
            status: tx.status,
            replayed: true,
            message,
            sub_message,
        }
    }
}

pub struct CheckoutService {
    ledger: Arc<dyn TransactionLedger>,
    carts: Arc<dyn CartStore>,
    users: Arc<dyn UserDirectory>,
    gateways: HashMap<GatewayKind, Arc<dyn PaymentGateway>>,
    tax: BigDecimal,
}

impl CheckoutService {
    pub fn new(
        ledger: Arc<dyn TransactionLedger>,
        carts: Arc<dyn CartStore>,
        users: Arc<dyn UserDirectory>,
        tax: BigDecimal,
    ) -> Self {
        Self {
            ledger,
            carts,
            users,
            gateways: HashMap::new(),
            tax,
        }
    }

    pub fn register_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateways.insert(gateway.kind(), gateway);
        self
    }

    fn gateway(&self, kind: GatewayKind) -> Result<&Arc<dyn PaymentGateway>, AppError> {
        self.gateways
            .get(&kind)
            .ok_or_else(|| AppError::Internal(format!("gateway {} is not configured", kind)))
    }

    /// Open a checkout for the cart: snapshot the total into a pending
    /// ledger entry and obtain the gateway's approval handle.
    pub async fn start_checkout(
        &self,
        cart_code: &str,
        user_id: Uuid,
        kind: GatewayKind,
    ) -> Result<CheckoutSession, AppError> {
        let cart = self.carts.get_by_code(cart_code).await.map_err(|e| match e {
            RepositoryError::NotFound(_) => {
                AppError::NotFound(format!("Cart {} not found", cart_code))
            }
            other => other.into(),
        })?;

        if cart.paid {
            return Err(AppError::AlreadyPaid(cart_code.to_string()));
        }

        let lines = self.carts.line_items(cart.id).await?;
        if lines.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Cart {} has no items to check out",
                cart_code
            )));
        }

        let user = self.users.get(user_id).await?;
        let gateway = self.gateway(kind)?;
        let total = checkout_total(&lines, &self.tax);
        let currency = gateway.currency().to_string();

        let opened = self
            .open_with_fresh_reference(cart.id, kind, &total, &currency, user_id)
            .await?;

        tracing::info!(
            reference = %opened.reference,
            cart_code = %cart_code,
            gateway = %kind,
            amount = %total,
            currency = %currency,
            "checkout opened"
        );

        let request = PaymentRequest {
            reference: opened.reference.clone(),
            amount: total,
            currency,
            customer: CustomerInfo {
                name: user.username,
                email: user.email,
                phone: user.phone,
            },
        };

        match gateway.initiate(&request).await {
            Ok(handle) => Ok(CheckoutSession {
                reference: opened.reference,
                approval_url: handle.approval_url,
            }),
            Err(e) => {
                // The attempt is dead; a fresh checkout gets a new reference.
                if let Err(fail_err) = self.ledger.fail(&opened.reference).await {
                    tracing::error!(
                        reference = %opened.reference,
                        error = %fail_err,
                        "failed to mark transaction failed after gateway error"
                    );
                }
                tracing::warn!(reference = %opened.reference, error = %e, "payment initiation failed");
                Err(map_gateway_error(e))
            }
        }
    }

    /// Reconcile a gateway callback against the ledger. Duplicate callbacks
    /// return the stored result without re-applying side effects.
    pub async fn handle_callback(
        &self,
        user_id: Option<Uuid>,
        callback: GatewayCallback,
    ) -> Result<SettlementReceipt, AppError> {
        let tx = self
            .ledger
            .find(&callback.reference)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(_) => AppError::NotFound(format!(
                    "Transaction {} not found",
                    callback.reference
                )),
                other => other.into(),
            })?;

        if tx.status != TransactionStatus::Pending {
            tracing::info!(reference = %tx.reference, status = %tx.status, "duplicate callback replayed");
            return Ok(SettlementReceipt::replayed(&tx));
        }

        let gateway = self.gateway(tx.gateway)?;
        let outcome = match gateway.verify(&callback).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(reference = %tx.reference, error = %e, "gateway verification errored");
                let _ = self.ledger.fail(&tx.reference).await;
                return Err(map_gateway_error(e));
            }
        };

        if !outcome.success {
            tracing::info!(reference = %tx.reference, "provider reported unsuccessful payment");
            return match self.ledger.fail(&tx.reference).await {
                Ok(failed) => Ok(SettlementReceipt::unverified(&failed)),
                Err(RepositoryError::InvalidTransition(_)) => self.replay(&tx.reference).await,
                Err(e) => Err(e.into()),
            };
        }

        if outcome_matches(&tx, &outcome) {
            let owner = user_id.or(tx.user_id);
            match self.ledger.complete(&tx.reference, owner).await {
                Ok(completed) => {
                    tracing::info!(reference = %completed.reference, "payment settled");
                    Ok(SettlementReceipt::settled(&completed))
                }
                Err(RepositoryError::InvalidTransition(_)) => self.replay(&tx.reference).await,
                Err(e) => Err(e.into()),
            }
        } else {
            tracing::warn!(
                reference = %tx.reference,
                expected_amount = %tx.amount,
                expected_currency = %tx.currency,
                verified_amount = ?outcome.verified_amount,
                verified_currency = ?outcome.verified_currency,
                "verification mismatch"
            );
            match self.ledger.fail(&tx.reference).await {
                Ok(failed) => Ok(SettlementReceipt::mismatched(&failed)),
                Err(RepositoryError::InvalidTransition(_)) => self.replay(&tx.reference).await,
                Err(e) => Err(e.into()),
            }
        }
    }

    async fn open_with_fresh_reference(
        &self,
        cart_id: Uuid,
        kind: GatewayKind,
        total: &BigDecimal,
        currency: &str,
        user_id: Uuid,
    ) -> Result<Transaction, AppError> {
        let attempt = Transaction::new(
            Uuid::new_v4().to_string(),
            cart_id,
            kind,
            total.clone(),
            currency.to_string(),
            Some(user_id),
        );

        match self.ledger.open(&attempt).await {
            Ok(tx) => Ok(tx),
            Err(RepositoryError::DuplicateReference(_)) => {
                // One retry with a new reference covers the collision case.
                let retry = Transaction::new(
                    Uuid::new_v4().to_string(),
                    cart_id,
                    kind,
                    total.clone(),
                    currency.to_string(),
                    Some(user_id),
                );
                Ok(self.ledger.open(&retry).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Lost the transition race to a concurrent callback: report whatever
    /// state the winner left behind.
    async fn replay(&self, reference: &str) -> Result<SettlementReceipt, AppError> {
        let tx = self.ledger.find(reference).await?;
        tracing::info!(reference = %reference, status = %tx.status, "concurrent callback replayed");
        Ok(SettlementReceipt::replayed(&tx))
    }
}

/// A callback settles its transaction only when the provider reports
/// success and the verified amount and currency both equal the stored
/// snapshot. Amounts compare as exact decimals.
fn outcome_matches(tx: &Transaction, outcome: &SettlementOutcome) -> bool {
    outcome.success
        && outcome.verified_amount.as_ref() == Some(&tx.amount)
        && outcome.verified_currency.as_deref() == Some(tx.currency.as_str())
}

fn map_gateway_error(err: GatewayError) -> AppError {
    match err {
        GatewayError::Rejected(details) => AppError::GatewayRejected(details),
        GatewayError::Unreachable(details) => AppError::GatewayUnreachable(details),
        GatewayError::CircuitOpen(details) => AppError::GatewayUnreachable(details),
        GatewayError::InvalidResponse(details) => AppError::GatewayUnreachable(details),
    }
}
