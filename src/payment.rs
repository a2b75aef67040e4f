use crate::config::Config;
use crate::errors::AppError;
use crate::models::{PaymentRequest, PaymentResult, PaymentStatus};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde_json::json;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use uuid::Uuid;

/// Payment provider abstraction. Selected once at construction: the mock
/// implementation for development/test, the live one for production.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Attempts to capture the payment. Declines are `Ok` results with
    /// `success == false`; `Err` is reserved for provider/transport failures.
    async fn charge(&self, request: &PaymentRequest) -> Result<PaymentResult, AppError>;
}

const DECLINE_REASONS: &[&str] = &[
    "insufficient_funds",
    "card_declined",
    "expired_card",
    "processing_error",
];

/// Simulates a payment gateway: a short latency, then success with the
/// configured probability. Declines return a structured reason.
pub struct MockPaymentProvider {
    success_rate: f64,
    latency: Duration,
    rng: Mutex<StdRng>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::with_success_rate(0.9)
    }

    pub fn with_success_rate(success_rate: f64) -> Self {
        Self {
            success_rate,
            latency: Duration::from_millis(400),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic variant for tests.
    pub fn with_seed(success_rate: f64, seed: u64) -> Self {
        Self {
            success_rate,
            latency: Duration::ZERO,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn draw(&self) -> (f64, usize) {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        (rng.gen::<f64>(), rng.gen_range(0..DECLINE_REASONS.len()))
    }
}

impl Default for MockPaymentProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn charge(&self, request: &PaymentRequest) -> Result<PaymentResult, AppError> {
        // Simulated network latency
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let (roll, reason_index) = self.draw();
        if roll < self.success_rate {
            let transaction_id = format!("txn_mock_{}", Uuid::new_v4().simple());
            tracing::info!("Mock payment captured: {}", transaction_id);
            Ok(PaymentResult {
                success: true,
                transaction_id: Some(transaction_id),
                amount: request.amount,
                currency: request.currency.clone(),
                status: PaymentStatus::Succeeded,
                decline_reason: None,
            })
        } else {
            let reason = DECLINE_REASONS[reason_index];
            tracing::info!("Mock payment declined: {}", reason);
            Ok(PaymentResult {
                success: false,
                transaction_id: None,
                amount: request.amount,
                currency: request.currency.clone(),
                status: PaymentStatus::Declined,
                decline_reason: Some(reason.to_string()),
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct PaymentIntentResponse {
    #[serde(alias = "intentId")]
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct PaymentConfirmResponse {
    status: String,
    #[serde(alias = "transactionId", default)]
    transaction_id: Option<String>,
    #[serde(alias = "declineReason", alias = "decline_code", default)]
    decline_reason: Option<String>,
}

/// Stripe-like two-step gateway client: create an intent, then confirm it
/// with the payment method.
pub struct LivePaymentProvider {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl LivePaymentProvider {
    pub fn new(base_url: String, secret_key: String) -> Result<Self, AppError> {
        if Config::is_placeholder(&secret_key) {
            return Err(AppError::Configuration(
                "Payment secret key is missing or a placeholder".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::Provider(format!("Failed to create payment client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            secret_key,
        })
    }

    async fn create_intent(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentIntentResponse, AppError> {
        let url = format!("{}/v1/payment_intents", self.base_url);
        let body = json!({
            "amount": request.amount,
            "currency": request.currency,
            "description": request.description,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Payment intent request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Provider(format!(
                "Payment gateway returned {}: {}",
                status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::Provider(format!("Failed to parse payment intent response: {}", e))
        })
    }

    async fn confirm_intent(
        &self,
        intent_id: &str,
        payment_method: &str,
    ) -> Result<PaymentConfirmResponse, AppError> {
        let url = format!("{}/v1/payment_intents/{}/confirm", self.base_url, intent_id);
        let body = json!({ "payment_method": payment_method });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Payment confirm request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Provider(format!(
                "Payment confirmation returned {}: {}",
                status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::Provider(format!("Failed to parse payment confirm response: {}", e))
        })
    }
}

#[async_trait]
impl PaymentProvider for LivePaymentProvider {
    async fn charge(&self, request: &PaymentRequest) -> Result<PaymentResult, AppError> {
        let intent = self.create_intent(request).await?;
        tracing::info!("Payment intent {} created ({})", intent.id, intent.status);

        let confirmation = self
            .confirm_intent(&intent.id, &request.payment_method)
            .await?;

        if confirmation.status.eq_ignore_ascii_case("succeeded") {
            let transaction_id = confirmation
                .transaction_id
                .unwrap_or_else(|| intent.id.clone());
            tracing::info!("Payment captured: {}", transaction_id);
            Ok(PaymentResult {
                success: true,
                transaction_id: Some(transaction_id),
                amount: request.amount,
                currency: request.currency.clone(),
                status: PaymentStatus::Succeeded,
                decline_reason: None,
            })
        } else {
            let reason = confirmation
                .decline_reason
                .unwrap_or_else(|| confirmation.status.clone());
            tracing::warn!("Payment declined: {}", reason);
            Ok(PaymentResult {
                success: false,
                transaction_id: None,
                amount: request.amount,
                currency: request.currency.clone(),
                status: PaymentStatus::Declined,
                decline_reason: Some(reason),
            })
        }
    }
}
