/// Live verification provider tests against a mocked HTTP API.
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use maplenest_core::clock::{Clock, ManualClock};
use maplenest_core::errors::AppError;
use maplenest_core::models::{ApplicantInfo, InquiryStatus};
use maplenest_core::verification::{LiveVerificationProvider, VerificationProvider};
use std::sync::Arc;
use wiremock::matchers::{bearer_token, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "trustii_tok_81aa02";

fn provider(base_url: String) -> LiveVerificationProvider {
    let clock: Arc<dyn Clock> =
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()));
    LiveVerificationProvider::new(base_url, TOKEN.to_string(), clock, ChronoDuration::seconds(30))
        .unwrap()
}

fn applicant() -> ApplicantInfo {
    ApplicantInfo {
        first_name: "Avery".to_string(),
        last_name: "Chen".to_string(),
        email: "avery.chen@example.com".to_string(),
        date_of_birth: None,
        current_address: None,
    }
}

#[tokio::test]
async fn create_inquiry_sends_bearer_token_and_parses_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/inquiries"))
        .and(bearer_token(TOKEN))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "inq_3f8a",
            "status": "pending"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(server.uri());
    let inquiry = provider.create_inquiry(&applicant()).await.unwrap();

    assert_eq!(inquiry.id, "inq_3f8a");
    assert_eq!(inquiry.status, InquiryStatus::Pending);
    // No estimate from the provider, so the configured window applies.
    assert_eq!(
        inquiry.estimated_completion - inquiry.created_at,
        ChronoDuration::seconds(30)
    );
}

#[tokio::test]
async fn retrieve_inquiry_maps_status_and_report() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/inquiries/inq_3f8a"))
        .and(bearer_token(TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "inq_3f8a",
            "status": "completed",
            "report": {
                "accounts": [
                    {"type": "credit_card", "status": "open", "balance": 1200.0,
                     "onTimePayments": 40, "latePayments": 2}
                ],
                "inquiries": [{"creditor": "Maple Bank", "date": "2025-02-14"}],
                "publicRecords": []
            }
        })))
        .mount(&server)
        .await;

    let provider = provider(server.uri());
    let remote = provider.retrieve_inquiry("inq_3f8a").await.unwrap();

    assert_eq!(remote.status, InquiryStatus::Completed);
    let report = remote.report.unwrap();
    assert_eq!(report.accounts.len(), 1);
    assert_eq!(report.accounts[0].on_time_payments, Some(40));
    assert_eq!(report.inquiries.len(), 1);
}

#[tokio::test]
async fn provider_spelling_variants_are_accepted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/inquiries/inq_9c"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "inq_9c",
            "status": "in_progress"
        })))
        .mount(&server)
        .await;

    let provider = provider(server.uri());
    let remote = provider.retrieve_inquiry("inq_9c").await.unwrap();
    assert_eq!(remote.status, InquiryStatus::Processing);
    assert!(remote.report.is_none());
}

#[tokio::test]
async fn server_error_is_a_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/inquiries"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let provider = provider(server.uri());
    let result = provider.create_inquiry(&applicant()).await;
    assert!(matches!(result, Err(AppError::Provider(_))));
}

#[tokio::test]
async fn missing_inquiry_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/inquiries/inq_missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let provider = provider(server.uri());
    let result = provider.retrieve_inquiry("inq_missing").await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn unknown_status_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/inquiries/inq_odd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "inq_odd",
            "status": "quarantined"
        })))
        .mount(&server)
        .await;

    let provider = provider(server.uri());
    let result = provider.retrieve_inquiry("inq_odd").await;
    assert!(matches!(result, Err(AppError::Provider(_))));
}

#[test]
fn placeholder_token_fails_fast() {
    let clock: Arc<dyn Clock> =
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()));
    let result = LiveVerificationProvider::new(
        "https://api.trustii.co".to_string(),
        "your_token_here".to_string(),
        clock,
        ChronoDuration::seconds(30),
    );
    assert!(matches!(result, Err(AppError::Configuration(_))));
}
