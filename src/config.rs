use anyhow::{Context, Result};
use bigdecimal::BigDecimal;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

const FLUTTERWAVE_LIVE_URL: &str = "https://api.flutterwave.com/v3";
const PAYPAL_SANDBOX_URL: &str = "https://api.sandbox.paypal.com";
const PAYPAL_LIVE_URL: &str = "https://api.paypal.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    /// Base URL of the storefront frontend; return links are built from it.
    pub frontend_base_url: String,
    pub default_currency: String,
    /// Fixed surcharge added to every checkout total.
    pub checkout_tax: BigDecimal,
    pub cors_allowed_origins: Option<String>,
    pub flutterwave: FlutterwaveConfig,
    pub paypal: PaypalConfig,
}

#[derive(Debug, Clone)]
pub struct FlutterwaveConfig {
    pub secret_key: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct PaypalConfig {
    pub mode: PaypalMode,
    pub client_id: String,
    pub client_secret: String,
    pub api_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaypalMode {
    Sandbox,
    Live,
}

impl PaypalMode {
    fn default_api_url(self) -> &'static str {
        match self {
            PaypalMode::Sandbox => PAYPAL_SANDBOX_URL,
            PaypalMode::Live => PAYPAL_LIVE_URL,
        }
    }
}

impl FromStr for PaypalMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "sandbox" => Ok(PaypalMode::Sandbox),
            "live" => Ok(PaypalMode::Live),
            other => anyhow::bail!("PAYPAL_MODE must be 'sandbox' or 'live', got '{}'", other),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present

        let paypal_mode: PaypalMode = env::var("PAYPAL_MODE")
            .unwrap_or_else(|_| "sandbox".to_string())
            .parse()?;

        let config = Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            frontend_base_url: env::var("FRONTEND_BASE_URL")
                .context("FRONTEND_BASE_URL must be set")?,
            default_currency: env::var("DEFAULT_CURRENCY").unwrap_or_else(|_| "NGN".to_string()),
            checkout_tax: env::var("CHECKOUT_TAX")
                .unwrap_or_else(|_| "4.00".to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("CHECKOUT_TAX is not a valid decimal: {}", e))?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
            flutterwave: FlutterwaveConfig {
                secret_key: env::var("FLUTTERWAVE_SECRET_KEY")
                    .context("FLUTTERWAVE_SECRET_KEY must be set")?,
                api_url: env::var("FLUTTERWAVE_API_URL")
                    .unwrap_or_else(|_| FLUTTERWAVE_LIVE_URL.to_string()),
            },
            paypal: PaypalConfig {
                mode: paypal_mode,
                client_id: env::var("PAYPAL_CLIENT_ID").context("PAYPAL_CLIENT_ID must be set")?,
                client_secret: env::var("PAYPAL_CLIENT_SECRET")
                    .context("PAYPAL_CLIENT_SECRET must be set")?,
                api_url: env::var("PAYPAL_API_URL")
                    .unwrap_or_else(|_| paypal_mode.default_api_url().to_string()),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server_port == 0 {
            anyhow::bail!("SERVER_PORT must be greater than 0");
        }
        if self.database_url.is_empty() {
            anyhow::bail!("DATABASE_URL is empty");
        }

        url::Url::parse(&self.frontend_base_url)
            .context("FRONTEND_BASE_URL is not a valid URL")?;
        url::Url::parse(&self.flutterwave.api_url)
            .context("FLUTTERWAVE_API_URL is not a valid URL")?;
        url::Url::parse(&self.paypal.api_url).context("PAYPAL_API_URL is not a valid URL")?;

        if self.default_currency.trim().is_empty() {
            anyhow::bail!("DEFAULT_CURRENCY is empty");
        }

        Ok(())
    }
}
