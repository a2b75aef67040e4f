use crate::clock::Clock;
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{
    ApplicantInfo, InquiryStatus, ProviderInquiry, ReportPayload, VerificationInquiry, WireAccount,
    WireInquiryRecord, WirePublicRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use uuid::Uuid;

/// Identity/credit verification provider. One implementation is chosen at
/// construction; business logic never branches on mock-vs-live again.
#[async_trait]
pub trait VerificationProvider: Send + Sync {
    async fn create_inquiry(
        &self,
        applicant: &ApplicantInfo,
    ) -> Result<VerificationInquiry, AppError>;

    async fn retrieve_inquiry(&self, inquiry_id: &str) -> Result<ProviderInquiry, AppError>;
}

/// Synthesizes inquiries whose status advances with the injected clock:
/// pending for the first half of the processing window, processing for the
/// second, completed after it. Completed inquiries carry a canned report
/// history.
pub struct MockVerificationProvider {
    clock: Arc<dyn Clock>,
    processing_window: ChronoDuration,
    created: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MockVerificationProvider {
    pub fn new(clock: Arc<dyn Clock>, processing_window: ChronoDuration) -> Self {
        Self {
            clock,
            processing_window,
            created: Mutex::new(HashMap::new()),
        }
    }

    /// Fixed account history the synthetic report is built from. Mostly
    /// on-time payments, so derived scores land in the Good/Excellent band.
    pub fn sample_payload() -> ReportPayload {
        ReportPayload {
            accounts: vec![
                WireAccount {
                    account_type: Some("credit_card".to_string()),
                    status: Some("open".to_string()),
                    balance: Some(1240.0),
                    on_time_payments: Some(46),
                    late_payments: Some(2),
                },
                WireAccount {
                    account_type: Some("auto_loan".to_string()),
                    status: Some("open".to_string()),
                    balance: Some(8900.0),
                    on_time_payments: Some(22),
                    late_payments: Some(0),
                },
            ],
            inquiries: vec![WireInquiryRecord {
                creditor: Some("Maple Federal Credit Union".to_string()),
                date: Some("2025-02-14".to_string()),
            }],
            public_records: vec![],
        }
    }
}

#[async_trait]
impl VerificationProvider for MockVerificationProvider {
    async fn create_inquiry(
        &self,
        applicant: &ApplicantInfo,
    ) -> Result<VerificationInquiry, AppError> {
        let now = self.clock.now();
        let id = format!("inq_mock_{}", Uuid::new_v4().simple());

        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), now);

        tracing::info!(
            "Mock inquiry {} created for {} {}",
            id,
            applicant.first_name,
            applicant.last_name
        );

        Ok(VerificationInquiry {
            id,
            status: InquiryStatus::Pending,
            created_at: now,
            estimated_completion: now + self.processing_window,
            report_id: None,
        })
    }

    async fn retrieve_inquiry(&self, inquiry_id: &str) -> Result<ProviderInquiry, AppError> {
        let created_at = self
            .created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(inquiry_id)
            .copied()
            .ok_or_else(|| AppError::NotFound(format!("Unknown inquiry {}", inquiry_id)))?;

        let elapsed = self.clock.now() - created_at;
        let status = if elapsed >= self.processing_window {
            InquiryStatus::Completed
        } else if elapsed * 2 >= self.processing_window {
            InquiryStatus::Processing
        } else {
            InquiryStatus::Pending
        };

        let report = if status == InquiryStatus::Completed {
            Some(Self::sample_payload())
        } else {
            None
        };

        Ok(ProviderInquiry {
            id: inquiry_id.to_string(),
            status,
            report,
        })
    }
}

#[derive(Debug, Deserialize)]
struct InquiryCreatedResponse {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(alias = "estimatedCompletion", default)]
    estimated_completion: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct InquiryRetrievedResponse {
    id: String,
    status: String,
    #[serde(default)]
    report: Option<ReportPayload>,
}

/// Trustii-like HTTP client, authenticated via a bearer token. Refuses to
/// construct with a missing or placeholder token so misconfiguration
/// surfaces at startup instead of as mysterious 401s.
pub struct LiveVerificationProvider {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    clock: Arc<dyn Clock>,
    processing_window: ChronoDuration,
}

impl LiveVerificationProvider {
    pub fn new(
        base_url: String,
        api_token: String,
        clock: Arc<dyn Clock>,
        processing_window: ChronoDuration,
    ) -> Result<Self, AppError> {
        if Config::is_placeholder(&api_token) {
            return Err(AppError::Configuration(
                "Verification API token is missing or a placeholder".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::Provider(format!("Failed to create verification client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            api_token,
            clock,
            processing_window,
        })
    }
}

#[async_trait]
impl VerificationProvider for LiveVerificationProvider {
    async fn create_inquiry(
        &self,
        applicant: &ApplicantInfo,
    ) -> Result<VerificationInquiry, AppError> {
        let url = format!("{}/api/v1/inquiries", self.base_url);
        let body = json!({
            "firstName": applicant.first_name,
            "lastName": applicant.last_name,
            "email": applicant.email,
            "dateOfBirth": applicant.date_of_birth,
            "address": applicant.current_address,
            "serviceType": "credit_check",
        });

        tracing::info!("Creating verification inquiry for {}", applicant.email);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Inquiry creation failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Provider(format!(
                "Verification API returned {}: {}",
                status, error_text
            )));
        }

        let created: InquiryCreatedResponse = response.json().await.map_err(|e| {
            AppError::Provider(format!("Failed to parse inquiry response: {}", e))
        })?;

        let now = self.clock.now();
        let status = created
            .status
            .as_deref()
            .and_then(InquiryStatus::parse)
            .unwrap_or(InquiryStatus::Pending);

        tracing::info!("Verification inquiry {} created", created.id);

        Ok(VerificationInquiry {
            id: created.id,
            status,
            created_at: now,
            estimated_completion: created
                .estimated_completion
                .unwrap_or(now + self.processing_window),
            report_id: None,
        })
    }

    async fn retrieve_inquiry(&self, inquiry_id: &str) -> Result<ProviderInquiry, AppError> {
        let url = format!("{}/api/v1/inquiries/{}", self.base_url, inquiry_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Inquiry retrieval failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!(
                "Inquiry {} not found at provider",
                inquiry_id
            )));
        }
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Provider(format!(
                "Verification API returned {}: {}",
                status, error_text
            )));
        }

        let retrieved: InquiryRetrievedResponse = response.json().await.map_err(|e| {
            AppError::Provider(format!("Failed to parse inquiry response: {}", e))
        })?;

        let status = InquiryStatus::parse(&retrieved.status).ok_or_else(|| {
            AppError::Provider(format!(
                "Verification API returned unknown status '{}'",
                retrieved.status
            ))
        })?;

        Ok(ProviderInquiry {
            id: retrieved.id,
            status,
            report: retrieved.report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn applicant() -> ApplicantInfo {
        ApplicantInfo {
            first_name: "Avery".to_string(),
            last_name: "Chen".to_string(),
            email: "avery.chen@example.com".to_string(),
            date_of_birth: None,
            current_address: None,
        }
    }

    fn manual_clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn mock_inquiry_advances_with_clock() {
        let clock = manual_clock();
        let provider = MockVerificationProvider::new(
            Arc::new(clock.clone()),
            ChronoDuration::seconds(30),
        );

        let inquiry = provider.create_inquiry(&applicant()).await.unwrap();
        assert_eq!(inquiry.status, InquiryStatus::Pending);
        assert_eq!(
            inquiry.estimated_completion - inquiry.created_at,
            ChronoDuration::seconds(30)
        );

        let early = provider.retrieve_inquiry(&inquiry.id).await.unwrap();
        assert_eq!(early.status, InquiryStatus::Pending);
        assert!(early.report.is_none());

        clock.advance(ChronoDuration::seconds(16));
        let midway = provider.retrieve_inquiry(&inquiry.id).await.unwrap();
        assert_eq!(midway.status, InquiryStatus::Processing);
        assert!(midway.report.is_none());

        clock.advance(ChronoDuration::seconds(20));
        let done = provider.retrieve_inquiry(&inquiry.id).await.unwrap();
        assert_eq!(done.status, InquiryStatus::Completed);
        assert!(done.report.is_some());
    }

    #[tokio::test]
    async fn mock_retrieve_unknown_inquiry_is_not_found() {
        let provider = MockVerificationProvider::new(
            Arc::new(manual_clock()),
            ChronoDuration::seconds(30),
        );
        let result = provider.retrieve_inquiry("inq_missing").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn live_provider_rejects_placeholder_token() {
        let result = LiveVerificationProvider::new(
            "https://api.trustii.co".to_string(),
            "your_trustii_token_here".to_string(),
            Arc::new(manual_clock()),
            ChronoDuration::seconds(30),
        );
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }
}
