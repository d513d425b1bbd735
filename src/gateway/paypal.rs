//! PayPal gateway adapter.
//!
//! Uses the REST payments API: a client-credentials token, a payment
//! creation call whose approval link the client is redirected to, and an
//! explicit execute call that confirms the approved payment during
//! verification.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{Config, Error as FailsafeError, StateMachine, backoff, failure_policy};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::PaypalConfig;
use crate::domain::GatewayKind;
use crate::gateway::{
    GatewayCallback, GatewayError, GatewayHandle, PaymentGateway, PaymentRequest,
    SettlementOutcome, decimal_from_json,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// PayPal checkouts settle in USD regardless of the storefront default.
const PAYPAL_CURRENCY: &str = "USD";

#[derive(Clone)]
pub struct PaypalGateway {
    client: Client,
    client_id: String,
    client_secret: String,
    base_url: String,
    redirect_base: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl PaypalGateway {
    pub fn new(config: PaypalConfig, redirect_base: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        PaypalGateway {
            client,
            client_id: config.client_id,
            client_secret: config.client_secret,
            base_url: config.api_url,
            redirect_base,
            circuit_breaker,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    state: Option<String>,
    links: Option<Vec<PaymentLink>>,
    transactions: Option<Vec<PaymentTransaction>>,
}

#[derive(Debug, Deserialize)]
struct PaymentLink {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct PaymentTransaction {
    amount: PaymentAmount,
}

#[derive(Debug, Deserialize)]
struct PaymentAmount {
    total: serde_json::Value,
    currency: String,
}

async fn fetch_access_token(
    client: &Client,
    base_url: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<String, GatewayError> {
    let credentials = BASE64.encode(format!("{}:{}", client_id, client_secret));
    let response = client
        .post(format!("{}/v1/oauth2/token", base_url.trim_end_matches('/')))
        .header(reqwest::header::AUTHORIZATION, format!("Basic {}", credentials))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::Rejected(format!(
            "token request returned {}: {}",
            status, body
        )));
    }

    let body = response.json::<TokenResponse>().await?;
    Ok(body.access_token)
}

#[async_trait::async_trait]
impl PaymentGateway for PaypalGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Paypal
    }

    fn currency(&self) -> &str {
        PAYPAL_CURRENCY
    }

    async fn initiate(&self, request: &PaymentRequest) -> Result<GatewayHandle, GatewayError> {
        let base = self.redirect_base.trim_end_matches('/').to_string();
        let payload = json!({
            "intent": "sale",
            "payer": {
                "payment_method": "paypal"
            },
            "redirect_urls": {
                "return_url": format!(
                    "{}/payment-status?paymentStatus=success&ref={}",
                    base, request.reference
                ),
                "cancel_url": format!("{}/payment-status?paymentStatus=cancel", base),
            },
            "transactions": [{
                "item_list": {
                    "items": [{
                        "name": "Cart Items",
                        "sku": "cart",
                        "price": request.amount.to_string(),
                        "currency": request.currency,
                        "quantity": 1
                    }]
                },
                "amount": {
                    "total": request.amount.to_string(),
                    "currency": request.currency
                },
                "description": "Payment for cart items."
            }]
        });

        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let client_id = self.client_id.clone();
        let client_secret = self.client_secret.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let token =
                    fetch_access_token(&client, &base_url, &client_id, &client_secret).await?;

                let response = client
                    .post(format!(
                        "{}/v1/payments/payment",
                        base_url.trim_end_matches('/')
                    ))
                    .bearer_auth(&token)
                    .json(&payload)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(GatewayError::Rejected(format!(
                        "payment creation returned {}: {}",
                        status, body
                    )));
                }

                let body = response.json::<PaymentResponse>().await?;
                let approval_url = body
                    .links
                    .unwrap_or_default()
                    .into_iter()
                    .find(|link| link.rel == "approval_url")
                    .map(|link| link.href)
                    .ok_or_else(|| {
                        GatewayError::InvalidResponse(
                            "payment response carries no approval link".to_string(),
                        )
                    })?;

                Ok(GatewayHandle { approval_url })
            })
            .await;

        match result {
            Ok(handle) => Ok(handle),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitOpen(
                "PayPal circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    async fn verify(&self, callback: &GatewayCallback) -> Result<SettlementOutcome, GatewayError> {
        // Both identifiers come back on the return redirect; a callback
        // missing either means the payer never approved the charge.
        let (Some(payment_id), Some(payer_id)) =
            (callback.provider_tx_id.clone(), callback.payer_id.clone())
        else {
            return Ok(SettlementOutcome::unsuccessful(&callback.reference));
        };

        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let client_id = self.client_id.clone();
        let client_secret = self.client_secret.clone();
        let reference = callback.reference.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let token =
                    fetch_access_token(&client, &base_url, &client_id, &client_secret).await?;

                let response = client
                    .post(format!(
                        "{}/v1/payments/payment/{}/execute",
                        base_url.trim_end_matches('/'),
                        payment_id
                    ))
                    .bearer_auth(&token)
                    .json(&json!({ "payer_id": payer_id }))
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    // The execute call rejects already-executed or expired
                    // payments; nothing settled for this attempt.
                    return Ok(SettlementOutcome::unsuccessful(&reference));
                }

                let body = response.json::<PaymentResponse>().await?;
                let amount = body
                    .transactions
                    .as_ref()
                    .and_then(|txs| txs.first())
                    .map(|tx| &tx.amount);

                Ok(SettlementOutcome {
                    reference,
                    success: body.state.as_deref() == Some("approved"),
                    verified_amount: amount.and_then(|a| decimal_from_json(&a.total)),
                    verified_currency: amount.map(|a| a.currency.clone()),
                })
            })
            .await;

        match result {
            Ok(outcome) => Ok(outcome),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitOpen(
                "PayPal circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaypalMode;
    use crate::gateway::CustomerInfo;
    use bigdecimal::BigDecimal;

    fn gateway(base_url: String) -> PaypalGateway {
        PaypalGateway::new(
            PaypalConfig {
                mode: PaypalMode::Sandbox,
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
                api_url: base_url,
            },
            "http://localhost:5173".to_string(),
        )
    }

    fn payment_request() -> PaymentRequest {
        PaymentRequest {
            reference: "ref-456".to_string(),
            amount: "29.00".parse().unwrap(),
            currency: "USD".to_string(),
            customer: CustomerInfo {
                name: "ada".to_string(),
                email: "ada@example.com".to_string(),
                phone: None,
            },
        }
    }

    async fn mock_token(server: &mut mockito::Server) -> mockito::Mock {
        server
            .mock("POST", "/v1/oauth2/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"A21AAF","token_type":"Bearer","expires_in":32400}"#)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn initiate_returns_approval_link() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _payment = server
            .mock("POST", "/v1/payments/payment")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":"PAY-1","state":"created","links":[
                    {"href":"https://api.sandbox.paypal.com/v1/payments/payment/PAY-1","rel":"self","method":"GET"},
                    {"href":"https://www.sandbox.paypal.com/cgi-bin/webscr?cmd=_express-checkout&token=EC-60U","rel":"approval_url","method":"REDIRECT"}
                ]}"#,
            )
            .create_async()
            .await;

        let handle = gateway(server.url())
            .initiate(&payment_request())
            .await
            .unwrap();
        assert!(handle.approval_url.contains("approval") || handle.approval_url.contains("webscr"));
    }

    #[tokio::test]
    async fn initiate_fails_without_approval_link() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _payment = server
            .mock("POST", "/v1/payments/payment")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"PAY-1","state":"created","links":[]}"#)
            .create_async()
            .await;

        let result = gateway(server.url()).initiate(&payment_request()).await;
        assert!(matches!(result, Err(GatewayError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn initiate_maps_rejected_credentials() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/v1/oauth2/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client"}"#)
            .create_async()
            .await;

        let result = gateway(server.url()).initiate(&payment_request()).await;
        assert!(matches!(result, Err(GatewayError::Rejected(_))));
    }

    #[tokio::test]
    async fn verify_executes_payment_and_maps_outcome() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _execute = server
            .mock("POST", "/v1/payments/payment/PAY-1/execute")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":"PAY-1","state":"approved","transactions":[{"amount":{"total":"29.00","currency":"USD"}}]}"#,
            )
            .create_async()
            .await;

        let callback = GatewayCallback {
            reference: "ref-456".to_string(),
            provider_tx_id: Some("PAY-1".to_string()),
            payer_id: Some("PAYER-9".to_string()),
            status: None,
        };

        let outcome = gateway(server.url()).verify(&callback).await.unwrap();
        assert!(outcome.success);
        assert_eq!(
            outcome.verified_amount,
            Some("29.00".parse::<BigDecimal>().unwrap())
        );
        assert_eq!(outcome.verified_currency.as_deref(), Some("USD"));
    }

    #[tokio::test]
    async fn verify_without_payer_id_is_unsuccessful() {
        let callback = GatewayCallback {
            reference: "ref-456".to_string(),
            provider_tx_id: Some("PAY-1".to_string()),
            payer_id: None,
            status: None,
        };

        // No network traffic expected.
        let outcome = gateway("http://127.0.0.1:1".to_string())
            .verify(&callback)
            .await
            .unwrap();
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn verify_treats_failed_execute_as_unsuccessful() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _execute = server
            .mock("POST", "/v1/payments/payment/PAY-1/execute")
            .with_status(400)
            .with_body(r#"{"name":"PAYMENT_ALREADY_DONE"}"#)
            .create_async()
            .await;

        let callback = GatewayCallback {
            reference: "ref-456".to_string(),
            provider_tx_id: Some("PAY-1".to_string()),
            payer_id: Some("PAYER-9".to_string()),
            status: None,
        };

        let outcome = gateway(server.url()).verify(&callback).await.unwrap();
        assert!(!outcome.success);
    }
}
