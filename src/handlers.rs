use crate::config::Config;
use crate::errors::AppError;
use crate::location::LocationResolver;
use crate::models::*;
use crate::orchestrator::CreditCheckService;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;

const DEFAULT_NEARBY_LIMIT: usize = 4;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Location cascade resolver.
    pub resolver: LocationResolver,
    /// Credit-check workflow orchestrator.
    pub credit_check: Arc<CreditCheckService>,
    /// Listing catalog ranked by the nearby endpoint.
    pub listings: Vec<Property>,
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "maplenest-core",
            "version": "0.1.0"
        })),
    )
}

/// POST /api/v1/location/resolve
///
/// Resolves a best-effort user location from whatever hints the front end
/// could gather. Always succeeds; the worst case is the default city.
pub async fn resolve_location(
    State(state): State<Arc<AppState>>,
    Json(hint): Json<LocationHint>,
) -> Json<UserLocation> {
    tracing::info!("POST /location/resolve - hint: {:?}", hint);
    let location = state.resolver.resolve(&hint).await;
    Json(location)
}

/// POST /api/v1/properties/nearby
///
/// Resolves the user's location, then returns the closest listings ranked
/// by great-circle distance.
pub async fn nearby_properties(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NearbyRequest>,
) -> Json<NearbyResponse> {
    let limit = request.limit.unwrap_or(DEFAULT_NEARBY_LIMIT);
    let reference = state.resolver.resolve(&request.hint).await;
    let properties = LocationResolver::rank_properties(&reference, &state.listings, limit);

    tracing::info!(
        "Ranked {} listings near {}, {}",
        properties.len(),
        reference.city,
        reference.province
    );

    Json(NearbyResponse {
        reference,
        properties,
    })
}

/// POST /api/v1/credit-check/payment
///
/// Captures the credit-check fee. Declines are 200 responses with
/// `success: false`; only malformed input or provider transport failures
/// become errors.
pub async fn process_payment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<PaymentResult>, AppError> {
    tracing::info!(
        "POST /credit-check/payment - amount: {} {}",
        request.amount,
        request.currency
    );
    let result = state.credit_check.process_payment(&request).await?;
    Ok(Json(result))
}

/// POST /api/v1/credit-check/inquiries
///
/// Initiates a verification inquiry for a paid credit check.
pub async fn initiate_inquiry(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InquiryRequest>,
) -> Result<(StatusCode, Json<VerificationInquiry>), AppError> {
    tracing::info!(
        "POST /credit-check/inquiries - transaction: {}",
        request.transaction_id
    );
    let inquiry = state.credit_check.initiate_inquiry(&request).await?;
    Ok((StatusCode::CREATED, Json(inquiry)))
}

/// GET /api/v1/credit-check/inquiries/:id/status
///
/// Idempotent progress read; safe for the front end to call on a timer.
pub async fn inquiry_status(
    State(state): State<Arc<AppState>>,
    Path(inquiry_id): Path<String>,
) -> Result<Json<StatusSnapshot>, AppError> {
    let snapshot = state.credit_check.poll_status(&inquiry_id).await?;
    Ok(Json(snapshot))
}

/// GET /api/v1/credit-check/inquiries/:id/report
///
/// Returns the canonical report once the inquiry has completed; 409 before
/// then.
pub async fn inquiry_report(
    State(state): State<Arc<AppState>>,
    Path(inquiry_id): Path<String>,
) -> Result<Json<CreditReport>, AppError> {
    let report = state.credit_check.retrieve_report(&inquiry_id).await?;
    Ok(Json(report))
}
