mod clock;
mod config;
mod errors;
mod geo;
mod handlers;
mod location;
mod models;
mod orchestrator;
mod payment;
mod report;
mod verification;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::clock::SystemClock;
use crate::config::Config;
use crate::location::LocationResolver;
use crate::models::Property;
use crate::orchestrator::{CreditCheckService, OrchestratorSettings};
use crate::payment::{LivePaymentProvider, MockPaymentProvider, PaymentProvider};
use crate::verification::{
    LiveVerificationProvider, MockVerificationProvider, VerificationProvider,
};

/// Main entry point for the application.
///
/// Initializes logging, configuration, the location resolver, and the
/// credit-check orchestrator (mock or live providers, chosen once here),
/// then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "maplenest_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let clock = Arc::new(SystemClock);
    let settings = OrchestratorSettings::from_config(&config);

    // Provider selection happens exactly once; nothing downstream branches
    // on mock-vs-live again.
    let (payment, verification): (Arc<dyn PaymentProvider>, Arc<dyn VerificationProvider>) =
        if config.use_mock_providers {
            tracing::info!("✓ Mock providers enabled (development mode)");
            (
                Arc::new(MockPaymentProvider::new()),
                Arc::new(MockVerificationProvider::new(
                    clock.clone(),
                    settings.processing_window,
                )),
            )
        } else {
            let payment = LivePaymentProvider::new(
                config.payment_base_url.clone(),
                config.payment_secret_key.clone(),
            )?;
            let verification = LiveVerificationProvider::new(
                config.trustii_base_url.clone(),
                config.trustii_api_token.clone(),
                clock.clone(),
                settings.processing_window,
            )?;
            tracing::info!("✓ Live providers initialized: {}", config.trustii_base_url);
            (Arc::new(payment), Arc::new(verification))
        };

    let credit_check = Arc::new(CreditCheckService::new(
        payment,
        verification,
        clock,
        settings,
    ));

    let resolver = LocationResolver::new(&config)?;
    tracing::info!("Location resolver initialized");

    // Build application state
    let app_state = Arc::new(handlers::AppState {
        config: config.clone(),
        resolver,
        credit_check,
        listings: Property::sample_catalog(),
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        .route("/api/v1/location/resolve", post(handlers::resolve_location))
        .route("/api/v1/properties/nearby", post(handlers::nearby_properties))
        .route(
            "/api/v1/credit-check/payment",
            post(handlers::process_payment),
        )
        .route(
            "/api/v1/credit-check/inquiries",
            post(handlers::initiate_inquiry),
        )
        .route(
            "/api/v1/credit-check/inquiries/:id/status",
            get(handlers::inquiry_status),
        )
        .route(
            "/api/v1/credit-check/inquiries/:id/report",
            get(handlers::inquiry_report),
        )
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload (these are small JSON bodies)
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
