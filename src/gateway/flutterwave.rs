//! Flutterwave gateway adapter.
//!
//! Initiation is a hosted-payment call returning a checkout link; the
//! redirect callback is never trusted on its own and is re-verified with a
//! server-side round-trip before settlement.

use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{Config, Error as FailsafeError, StateMachine, backoff, failure_policy};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::FlutterwaveConfig;
use crate::domain::GatewayKind;
use crate::gateway::{
    GatewayCallback, GatewayError, GatewayHandle, PaymentGateway, PaymentRequest,
    SettlementOutcome, decimal_from_json,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct FlutterwaveGateway {
    client: Client,
    secret_key: String,
    base_url: String,
    currency: String,
    redirect_base: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl FlutterwaveGateway {
    pub fn new(config: FlutterwaveConfig, currency: String, redirect_base: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        FlutterwaveGateway {
            client,
            secret_key: config.secret_key,
            base_url: config.api_url,
            currency,
            redirect_base,
            circuit_breaker,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InitiateResponse {
    status: String,
    message: Option<String>,
    data: Option<InitiateData>,
}

#[derive(Debug, Deserialize)]
struct InitiateData {
    link: String,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    status: String,
    data: Option<VerifyData>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    amount: Option<serde_json::Value>,
    currency: Option<String>,
    tx_ref: Option<String>,
}

#[async_trait::async_trait]
impl PaymentGateway for FlutterwaveGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Flutterwave
    }

    fn currency(&self) -> &str {
        &self.currency
    }

    async fn initiate(&self, request: &PaymentRequest) -> Result<GatewayHandle, GatewayError> {
        let payload = json!({
            "tx_ref": request.reference,
            "amount": request.amount.to_string(),
            "currency": request.currency,
            "redirect_url": format!("{}/payment-status/", self.redirect_base.trim_end_matches('/')),
            "customer": {
                "email": request.customer.email,
                "name": request.customer.name,
                "phonenumber": request.customer.phone,
            },
            "customizations": {
                "title": "Ventura Payment"
            }
        });

        let client = self.client.clone();
        let url = format!("{}/payments", self.base_url.trim_end_matches('/'));
        let secret = self.secret_key.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .bearer_auth(&secret)
                    .json(&payload)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(GatewayError::Rejected(format!(
                        "payment initiation returned {}: {}",
                        status, body
                    )));
                }

                let body = response.json::<InitiateResponse>().await?;
                if body.status != "success" {
                    return Err(GatewayError::Rejected(body.message.unwrap_or_else(|| {
                        "payment initiation was not accepted".to_string()
                    })));
                }

                let link = body.data.map(|d| d.link).ok_or_else(|| {
                    GatewayError::InvalidResponse(
                        "initiation response carries no payment link".to_string(),
                    )
                })?;

                Ok(GatewayHandle { approval_url: link })
            })
            .await;

        match result {
            Ok(handle) => Ok(handle),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitOpen(
                "Flutterwave circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    async fn verify(&self, callback: &GatewayCallback) -> Result<SettlementOutcome, GatewayError> {
        // The redirect already reports a failed charge; no round-trip needed.
        if callback.status.as_deref() != Some("successful") {
            return Ok(SettlementOutcome::unsuccessful(&callback.reference));
        }

        let Some(provider_tx_id) = callback.provider_tx_id.clone() else {
            return Ok(SettlementOutcome::unsuccessful(&callback.reference));
        };

        let client = self.client.clone();
        let url = format!(
            "{}/transactions/{}/verify",
            self.base_url.trim_end_matches('/'),
            provider_tx_id
        );
        let secret = self.secret_key.clone();
        let reference = callback.reference.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.get(&url).bearer_auth(&secret).send().await?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(GatewayError::Rejected(format!(
                        "verification returned {}: {}",
                        status, body
                    )));
                }

                let body = response.json::<VerifyResponse>().await?;
                if body.status != "success" {
                    return Ok(SettlementOutcome::unsuccessful(&reference));
                }

                let data = body.data.ok_or_else(|| {
                    GatewayError::InvalidResponse(
                        "verification response carries no transaction data".to_string(),
                    )
                })?;

                // A verification naming some other reference settles nothing
                // for this one.
                if data.tx_ref.as_deref().is_some_and(|r| r != reference) {
                    return Ok(SettlementOutcome::unsuccessful(&reference));
                }

                Ok(SettlementOutcome {
                    reference,
                    success: data.status == "successful",
                    verified_amount: data.amount.as_ref().and_then(decimal_from_json),
                    verified_currency: data.currency,
                })
            })
            .await;

        match result {
            Ok(outcome) => Ok(outcome),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitOpen(
                "Flutterwave circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}
