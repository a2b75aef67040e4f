use crate::clock::Clock;
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{
    ApplicantInfo, CreditReport, InquiryRequest, InquiryStatus, PaymentRequest, PaymentResult,
    StatusSnapshot, VerificationInquiry,
};
use crate::payment::PaymentProvider;
use crate::report;
use crate::verification::{MockVerificationProvider, VerificationProvider};
use chrono::Duration as ChronoDuration;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

const MAX_PAYMENT_AMOUNT: f64 = 10_000.0;

/// Callbacks for the background polling loop. Implementations must be cheap;
/// they run on the polling task.
pub trait PollListener: Send + Sync + 'static {
    fn on_update(&self, _snapshot: &StatusSnapshot) {}
    fn on_complete(&self, _report: &CreditReport) {}
    fn on_error(&self, _error: &AppError) {}
}

/// Tunables for the credit-check workflow.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Degrade provider failures to synthetic data. Development/test only;
    /// in production provider failures propagate as typed errors.
    pub mock_fallback: bool,
    pub poll_interval: Duration,
    /// Expected end-to-end processing time, used both for progress
    /// computation and for synthesizing `estimated_completion`.
    pub processing_window: ChronoDuration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mock_fallback: config.use_mock_providers,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            processing_window: ChronoDuration::seconds(config.mock_processing_secs as i64),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            mock_fallback: false,
            poll_interval: Duration::from_secs(5),
            processing_window: ChronoDuration::seconds(30),
        }
    }
}

struct InquiryRecord {
    inquiry: VerificationInquiry,
    /// High-water mark; reported progress never regresses.
    last_progress: f64,
    /// True for inquiries synthesized by the mock-fallback path. The
    /// provider has never heard of these, so polling skips it.
    fallback: bool,
}

struct Poller {
    epoch: u64,
    task: JoinHandle<()>,
}

/// Drives the four-step credit-check workflow: payment capture, inquiry
/// creation, status polling, report retrieval.
///
/// Workflow states: `Idle -> PaymentInFlight -> {PaymentFailed |
/// PaymentSucceeded}`, then `InquiryPending -> Polling -> {ReportReady |
/// InquiryFailed}`. Failed payments and inquiries are terminal, reported
/// states; the orchestrator never retries them on its own.
pub struct CreditCheckService {
    payment: Arc<dyn PaymentProvider>,
    verification: Arc<dyn VerificationProvider>,
    clock: Arc<dyn Clock>,
    settings: OrchestratorSettings,
    payments: Mutex<HashMap<String, PaymentResult>>,
    inquiries: Mutex<HashMap<String, InquiryRecord>>,
    poller: Mutex<Option<Poller>>,
    /// Bumped on every start/stop. Stale polling tasks notice the mismatch
    /// and discard their results instead of delivering callbacks.
    poll_epoch: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is a valid regex")
    })
}

fn status_for_progress(progress: f64) -> InquiryStatus {
    if progress >= 100.0 {
        InquiryStatus::Completed
    } else if progress >= 50.0 {
        InquiryStatus::Processing
    } else {
        InquiryStatus::Pending
    }
}

impl CreditCheckService {
    pub fn new(
        payment: Arc<dyn PaymentProvider>,
        verification: Arc<dyn VerificationProvider>,
        clock: Arc<dyn Clock>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            payment,
            verification,
            clock,
            settings,
            payments: Mutex::new(HashMap::new()),
            inquiries: Mutex::new(HashMap::new()),
            poller: Mutex::new(None),
            poll_epoch: AtomicU64::new(0),
        }
    }

    /// Step 1: capture payment. Malformed input is a `ValidationError`;
    /// provider declines are structured results, never errors.
    pub async fn process_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentResult, AppError> {
        if !request.amount.is_finite() || request.amount <= 0.0 {
            return Err(AppError::Validation(
                "Payment amount must be greater than zero".to_string(),
            ));
        }
        if request.amount > MAX_PAYMENT_AMOUNT {
            return Err(AppError::Validation(format!(
                "Payment amount must not exceed {}",
                MAX_PAYMENT_AMOUNT
            )));
        }
        if request.currency.trim().is_empty() {
            return Err(AppError::Validation("Currency is required".to_string()));
        }
        if request.payment_method.trim().is_empty() {
            return Err(AppError::Validation(
                "Payment method is required".to_string(),
            ));
        }

        let result = self.payment.charge(request).await?;

        if result.success {
            if let Some(transaction_id) = &result.transaction_id {
                lock(&self.payments).insert(transaction_id.clone(), result.clone());
            }
        }

        Ok(result)
    }

    /// Step 2: create the verification inquiry. Requires explicit consent
    /// and a prior successful payment. Under the mock-fallback policy a
    /// provider failure degrades to a synthetic inquiry instead of failing
    /// the caller.
    pub async fn initiate_inquiry(
        &self,
        request: &InquiryRequest,
    ) -> Result<VerificationInquiry, AppError> {
        if !request.consent {
            return Err(AppError::Validation(
                "Applicant consent is required for a credit check".to_string(),
            ));
        }
        validate_applicant(&request.applicant)?;

        if !lock(&self.payments).contains_key(&request.transaction_id) {
            return Err(AppError::Precondition(format!(
                "No successful payment found for transaction {}",
                request.transaction_id
            )));
        }

        match self.verification.create_inquiry(&request.applicant).await {
            Ok(mut inquiry) => {
                if inquiry.estimated_completion <= inquiry.created_at {
                    inquiry.estimated_completion =
                        inquiry.created_at + self.settings.processing_window;
                }
                self.store_inquiry(inquiry.clone(), false);
                tracing::info!("Inquiry {} initiated", inquiry.id);
                Ok(inquiry)
            }
            Err(AppError::Provider(message)) if self.settings.mock_fallback => {
                // Degraded mode: keep the wizard moving on synthetic data.
                // Logged, not surfaced to the caller.
                tracing::warn!(
                    "Verification provider unavailable ({}), continuing with synthetic inquiry",
                    message
                );
                let now = self.clock.now();
                let inquiry = VerificationInquiry {
                    id: format!("inq_local_{}", Uuid::new_v4().simple()),
                    status: InquiryStatus::Pending,
                    created_at: now,
                    estimated_completion: now + self.settings.processing_window,
                    report_id: None,
                };
                self.store_inquiry(inquiry.clone(), true);
                Ok(inquiry)
            }
            Err(e) => Err(e),
        }
    }

    fn store_inquiry(&self, inquiry: VerificationInquiry, fallback: bool) {
        lock(&self.inquiries).insert(
            inquiry.id.clone(),
            InquiryRecord {
                inquiry,
                last_progress: 0.0,
                fallback,
            },
        );
    }

    /// Step 3: idempotent status read. Progress is
    /// `min(elapsed / expected_total, 1.0) * 100`, bucketed into
    /// pending/processing/completed, and never moves backward for a given
    /// inquiry. A reachable provider can only push the status forward;
    /// transient provider errors leave the time-derived value in place.
    pub async fn poll_status(&self, inquiry_id: &str) -> Result<StatusSnapshot, AppError> {
        let (inquiry, last_progress, fallback) = {
            let records = lock(&self.inquiries);
            let record = records
                .get(inquiry_id)
                .ok_or_else(|| AppError::NotFound(format!("Unknown inquiry {}", inquiry_id)))?;
            (
                record.inquiry.clone(),
                record.last_progress,
                record.fallback,
            )
        };

        if inquiry.status.is_terminal() {
            let progress = if inquiry.status == InquiryStatus::Completed {
                100.0
            } else {
                last_progress
            };
            return Ok(StatusSnapshot {
                inquiry_id: inquiry.id,
                status: inquiry.status,
                progress,
                estimated_completion: inquiry.estimated_completion,
            });
        }

        let now = self.clock.now();
        let elapsed_ms = (now - inquiry.created_at).num_milliseconds().max(0) as f64;
        let total_ms = (inquiry.estimated_completion - inquiry.created_at)
            .num_milliseconds()
            .max(1) as f64;
        let mut progress = (elapsed_ms / total_ms).min(1.0) * 100.0;
        let mut status = status_for_progress(progress);

        if !fallback {
            match self.verification.retrieve_inquiry(inquiry_id).await {
                Ok(remote) => {
                    // A failure reported by the provider is definitive and
                    // outranks a completion that is merely derived from
                    // elapsed time.
                    if remote.status == InquiryStatus::Failed {
                        status = InquiryStatus::Failed;
                    } else if remote.status.rank() > status.rank() {
                        status = remote.status;
                        if status == InquiryStatus::Completed {
                            progress = 100.0;
                        }
                    }
                }
                Err(AppError::Configuration(message)) => {
                    return Err(AppError::Configuration(message));
                }
                Err(e) => {
                    // Transient; the next poll simply tries again.
                    tracing::debug!("Status check for {} fell back to elapsed time: {}", inquiry_id, e);
                }
            }
        }

        // Monotonic guard: neither progress nor status may regress.
        progress = progress.max(last_progress);
        if inquiry.status.rank() > status.rank() {
            status = inquiry.status;
        }

        {
            let mut records = lock(&self.inquiries);
            if let Some(record) = records.get_mut(inquiry_id) {
                record.last_progress = record.last_progress.max(progress);
                if !record.inquiry.status.is_terminal()
                    && status.rank() >= record.inquiry.status.rank()
                {
                    record.inquiry.status = status;
                }
                status = record.inquiry.status;
                progress = record.last_progress;
            }
        }

        Ok(StatusSnapshot {
            inquiry_id: inquiry.id,
            status,
            progress,
            estimated_completion: inquiry.estimated_completion,
        })
    }

    /// Step 4: retrieve the canonical report. Precondition: the inquiry is
    /// `Completed`; anything else is a `PreconditionError`.
    pub async fn retrieve_report(&self, inquiry_id: &str) -> Result<CreditReport, AppError> {
        let snapshot = self.poll_status(inquiry_id).await?;
        match snapshot.status {
            InquiryStatus::Completed => {}
            InquiryStatus::Failed => {
                return Err(AppError::Precondition(format!(
                    "Inquiry {} failed; no report is available",
                    inquiry_id
                )));
            }
            _ => {
                return Err(AppError::Precondition(format!(
                    "Report for inquiry {} is not ready yet",
                    inquiry_id
                )));
            }
        }

        let fallback = lock(&self.inquiries)
            .get(inquiry_id)
            .map(|r| r.fallback)
            .unwrap_or(false);

        let payload = if fallback {
            MockVerificationProvider::sample_payload()
        } else {
            match self.verification.retrieve_inquiry(inquiry_id).await {
                Ok(remote) => match remote.report {
                    Some(payload) => payload,
                    None if self.settings.mock_fallback => {
                        tracing::warn!(
                            "Completed inquiry {} has no report payload, using synthetic data",
                            inquiry_id
                        );
                        MockVerificationProvider::sample_payload()
                    }
                    None => {
                        return Err(AppError::Provider(format!(
                            "Completed inquiry {} has no report payload",
                            inquiry_id
                        )));
                    }
                },
                Err(e) if self.settings.mock_fallback => {
                    tracing::warn!(
                        "Report retrieval for {} failed ({}), using synthetic data",
                        inquiry_id,
                        e
                    );
                    MockVerificationProvider::sample_payload()
                }
                Err(e) => return Err(e),
            }
        };

        let report = report::build_report(inquiry_id, &payload);

        if let Some(record) = lock(&self.inquiries).get_mut(inquiry_id) {
            record.inquiry.report_id = Some(report.id.clone());
        }

        Ok(report)
    }

    /// Begins a recurring poll for `inquiry_id`. On `Completed` the report
    /// is retrieved once and `on_complete` fires; on `Failed` (or a
    /// definitive error) `on_error` fires; either way the loop stops.
    ///
    /// At most one polling task is active per service instance: starting a
    /// new poll atomically replaces any prior one, and callbacks from a
    /// superseded poller are discarded even if a request was already in
    /// flight when it was replaced.
    pub fn start_polling(self: Arc<Self>, inquiry_id: &str, listener: Arc<dyn PollListener>) {
        let inquiry_id = inquiry_id.to_string();
        let service = Arc::clone(&self);

        // Epoch allocation and slot replacement happen under the same lock:
        // concurrent starts serialize, and the installed poller always holds
        // the current epoch.
        let mut slot = lock(&self.poller);
        let epoch = self.poll_epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.settings.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if !service.epoch_is_current(epoch) {
                    return;
                }

                match service.poll_status(&inquiry_id).await {
                    Ok(snapshot) => {
                        // Result may have arrived after cancellation.
                        if !service.epoch_is_current(epoch) {
                            return;
                        }
                        match snapshot.status {
                            InquiryStatus::Completed => {
                                let outcome = service.retrieve_report(&inquiry_id).await;
                                if !service.epoch_is_current(epoch) {
                                    return;
                                }
                                match outcome {
                                    Ok(report) => listener.on_complete(&report),
                                    Err(e) => listener.on_error(&e),
                                }
                                return;
                            }
                            InquiryStatus::Failed => {
                                listener.on_error(&AppError::Provider(format!(
                                    "Inquiry {} failed",
                                    inquiry_id
                                )));
                                return;
                            }
                            _ => listener.on_update(&snapshot),
                        }
                    }
                    Err(e) => {
                        // poll_status only errors on definitive failures
                        // (unknown inquiry, broken configuration).
                        if service.epoch_is_current(epoch) {
                            listener.on_error(&e);
                        }
                        return;
                    }
                }
            }
        });

        if let Some(previous) = slot.take() {
            tracing::debug!("Replacing polling task from epoch {}", previous.epoch);
            previous.task.abort();
        }
        *slot = Some(Poller { epoch, task });
    }

    /// Stops the active polling loop, if any. Safe to call at any time; no
    /// further callbacks are delivered afterwards, including from requests
    /// already in flight.
    pub fn stop_polling(&self) {
        let mut slot = lock(&self.poller);
        self.poll_epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = slot.take() {
            previous.task.abort();
            tracing::debug!("Polling stopped (was epoch {})", previous.epoch);
        }
    }

    fn epoch_is_current(&self, epoch: u64) -> bool {
        self.poll_epoch.load(Ordering::SeqCst) == epoch
    }
}

fn validate_applicant(applicant: &ApplicantInfo) -> Result<(), AppError> {
    if applicant.first_name.trim().is_empty() || applicant.last_name.trim().is_empty() {
        return Err(AppError::Validation(
            "Applicant first and last name are required".to_string(),
        ));
    }
    if !email_regex().is_match(applicant.email.trim()) {
        return Err(AppError::Validation(format!(
            "Invalid applicant email: {}",
            applicant.email
        )));
    }
    Ok(())
}
