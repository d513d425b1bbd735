use axum::http::HeaderValue;
use sqlx::migrate::Migrator;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ventura_core::adapters::{PostgresCartStore, PostgresLedger, PostgresUserDirectory};
use ventura_core::config::Config;
use ventura_core::gateway::{FlutterwaveGateway, PaypalGateway};
use ventura_core::ports::{CartStore, TransactionLedger, UserDirectory};
use ventura_core::services::CheckoutService;
use ventura_core::{AppState, create_app, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database pool
    let pool = db::create_pool(&config).await?;

    // Run migrations
    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let ledger: Arc<dyn TransactionLedger> = Arc::new(PostgresLedger::new(pool.clone()));
    let carts: Arc<dyn CartStore> = Arc::new(PostgresCartStore::new(pool.clone()));
    let users: Arc<dyn UserDirectory> = Arc::new(PostgresUserDirectory::new(pool.clone()));

    let flutterwave = Arc::new(FlutterwaveGateway::new(
        config.flutterwave.clone(),
        config.default_currency.clone(),
        config.frontend_base_url.clone(),
    ));
    let paypal = Arc::new(PaypalGateway::new(
        config.paypal.clone(),
        config.frontend_base_url.clone(),
    ));
    tracing::info!(mode = ?config.paypal.mode, "payment gateways initialized");

    let checkout = Arc::new(
        CheckoutService::new(
            ledger.clone(),
            carts.clone(),
            users,
            config.checkout_tax.clone(),
        )
        .register_gateway(flutterwave)
        .register_gateway(paypal),
    );

    let state = AppState {
        db: pool,
        checkout,
        ledger,
        carts,
    };

    let app = create_app(state).layer(build_cors(&config)?);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

fn build_cors(config: &Config) -> anyhow::Result<CorsLayer> {
    match &config.cors_allowed_origins {
        None => Ok(CorsLayer::permissive()),
        Some(raw) => {
            let origins = raw
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(|entry| {
                    entry
                        .parse::<HeaderValue>()
                        .map_err(|e| anyhow::anyhow!("invalid CORS origin '{}': {}", entry, e))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            Ok(CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any))
        }
    }
}
