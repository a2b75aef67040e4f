use crate::geo::{Coordinate, Locatable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// Which cascade strategy produced a resolved location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    Device,
    IpAddress,
    Timezone,
    Default,
}

/// A best-effort user location. Immutable once returned by the resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLocation {
    #[serde(flatten)]
    pub coordinate: Coordinate,
    pub city: String,
    pub province: String,
    /// Reported accuracy in meters, when the device supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub source: LocationSource,
}

/// What a front end can tell us about where the user might be. Every field
/// is optional; the resolver works with whatever is present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationHint {
    pub coordinate: Option<Coordinate>,
    pub accuracy: Option<f64>,
    pub ip: Option<String>,
    /// IANA timezone identifier, e.g. "America/Toronto".
    pub timezone: Option<String>,
}

/// A rental listing known to the marketplace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub title: String,
    pub city: String,
    pub province: String,
    pub monthly_rent: f64,
    pub bedrooms: u8,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl Locatable for Property {
    fn coordinate(&self) -> Option<Coordinate> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)),
            _ => None,
        }
    }
}

/// A property augmented with its distance from a reference location.
#[derive(Debug, Clone, Serialize)]
pub struct RankedProperty {
    #[serde(flatten)]
    pub property: Property,
    pub distance_km: f64,
}

/// Request body for the nearby-properties endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct NearbyRequest {
    #[serde(default)]
    pub hint: LocationHint,
    pub limit: Option<usize>,
}

/// Response body for the nearby-properties endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct NearbyResponse {
    pub reference: UserLocation,
    pub properties: Vec<RankedProperty>,
}

// ---------------------------------------------------------------------------
// Payment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub amount: f64,
    pub currency: String,
    /// Opaque payment-method token from the front end.
    pub payment_method: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Succeeded,
    Declined,
}

/// Outcome of a single payment attempt. Declines are structured results,
/// not errors, and carry no transaction id.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decline_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Verification inquiry
// ---------------------------------------------------------------------------

/// Inquiry lifecycle. Transitions are monotonic:
/// `Pending -> Processing -> {Completed | Failed}`, never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InquiryStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl InquiryStatus {
    /// Ordering used to enforce monotonic transitions. Both terminal states
    /// share the top rank; neither can be replaced by the other.
    pub fn rank(self) -> u8 {
        match self {
            InquiryStatus::Pending => 0,
            InquiryStatus::Processing => 1,
            InquiryStatus::Completed | InquiryStatus::Failed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InquiryStatus::Completed | InquiryStatus::Failed)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "pending" | "created" => Some(InquiryStatus::Pending),
            "processing" | "in_progress" => Some(InquiryStatus::Processing),
            "completed" | "complete" | "done" => Some(InquiryStatus::Completed),
            "failed" | "error" | "cancelled" => Some(InquiryStatus::Failed),
            _ => None,
        }
    }
}

/// One verification attempt. Created once; status only moves forward.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationInquiry {
    pub id: String,
    pub status: InquiryStatus,
    pub created_at: DateTime<Utc>,
    pub estimated_completion: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
}

/// Idempotent view of an inquiry's progress, returned by `poll_status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub inquiry_id: String,
    pub status: InquiryStatus,
    /// Percentage in `[0, 100]`, monotonically non-decreasing per inquiry.
    pub progress: f64,
    pub estimated_completion: DateTime<Utc>,
}

/// Personal data the verification provider needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicantInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub current_address: Option<String>,
}

/// Request body for initiating a credit-check inquiry.
#[derive(Debug, Clone, Deserialize)]
pub struct InquiryRequest {
    pub transaction_id: String,
    pub applicant: ApplicantInfo,
    /// Explicit applicant consent to the credit check.
    pub consent: bool,
}

// ---------------------------------------------------------------------------
// Credit report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreRange {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl ScoreRange {
    /// Fixed thresholds: >=750 Excellent, >=650 Good, >=550 Fair, else Poor.
    pub fn from_score(score: u16) -> Self {
        match score {
            750..=u16::MAX => ScoreRange::Excellent,
            650..=749 => ScoreRange::Good,
            550..=649 => ScoreRange::Fair,
            _ => ScoreRange::Poor,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportFactors {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreditAccount {
    pub account_type: String,
    pub status: String,
    pub balance: f64,
    pub on_time_payments: u32,
    pub late_payments: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreditInquiryRecord {
    pub creditor: String,
    pub date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicRecord {
    pub record_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Canonical credit report. Immutable once its inquiry is completed, and
/// never exposed to callers before then.
#[derive(Debug, Clone, Serialize)]
pub struct CreditReport {
    pub id: String,
    pub status: InquiryStatus,
    /// Clamped to `[300, 850]`.
    pub score: u16,
    pub score_range: ScoreRange,
    pub factors: ReportFactors,
    pub accounts: Vec<CreditAccount>,
    pub inquiries: Vec<CreditInquiryRecord>,
    pub public_records: Vec<PublicRecord>,
}

// ---------------------------------------------------------------------------
// Provider wire models
//
// The free geocoding/IP endpoints disagree on field names, so these models
// accept the common variants via serde aliases and treat everything as
// optional.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReverseGeocodeResponse {
    #[serde(default, alias = "locality", alias = "cityName")]
    pub city: Option<String>,
    #[serde(
        default,
        alias = "principalSubdivision",
        alias = "region",
        alias = "state"
    )]
    pub province: Option<String>,
    #[serde(default, alias = "countryCode")]
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpGeolocationResponse {
    #[serde(default, alias = "countryCode")]
    pub country_code: Option<String>,
    #[serde(default, alias = "country_name")]
    pub country: Option<String>,
    #[serde(default, alias = "lat")]
    pub latitude: Option<f64>,
    #[serde(default, alias = "lon", alias = "lng")]
    pub longitude: Option<f64>,
    #[serde(default, alias = "locality")]
    pub city: Option<String>,
    #[serde(default, alias = "regionName", alias = "region_code", alias = "state")]
    pub region: Option<String>,
}

/// Account history as the verification provider reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct WireAccount {
    #[serde(alias = "type", alias = "accountType", default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(alias = "onTimePayments", alias = "payments_on_time", default)]
    pub on_time_payments: Option<u32>,
    #[serde(alias = "latePayments", alias = "payments_late", default)]
    pub late_payments: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireInquiryRecord {
    #[serde(default)]
    pub creditor: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WirePublicRecord {
    #[serde(alias = "type", default)]
    pub record_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Raw report payload from the verification provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportPayload {
    #[serde(default)]
    pub accounts: Vec<WireAccount>,
    #[serde(default)]
    pub inquiries: Vec<WireInquiryRecord>,
    #[serde(alias = "publicRecords", default)]
    pub public_records: Vec<WirePublicRecord>,
}

/// Provider-side view of an inquiry, as returned by `retrieve_inquiry`.
#[derive(Debug, Clone)]
pub struct ProviderInquiry {
    pub id: String,
    pub status: InquiryStatus,
    pub report: Option<ReportPayload>,
}

// ---------------------------------------------------------------------------
// Listing catalog
// ---------------------------------------------------------------------------

impl Property {
    /// Built-in listing catalog used until the real inventory service is
    /// wired in. One listing per major market.
    pub fn sample_catalog() -> Vec<Property> {
        fn listing(
            title: &str,
            city: &str,
            province: &str,
            monthly_rent: f64,
            bedrooms: u8,
            lat: f64,
            lng: f64,
        ) -> Property {
            Property {
                id: Uuid::new_v4(),
                title: title.to_string(),
                city: city.to_string(),
                province: province.to_string(),
                monthly_rent,
                bedrooms,
                lat: Some(lat),
                lng: Some(lng),
            }
        }

        vec![
            listing("Downtown 1BR near St. Lawrence Market", "Toronto", "ON", 2350.0, 1, 43.6489, -79.3715),
            listing("Liberty Village loft", "Toronto", "ON", 2600.0, 1, 43.6371, -79.4210),
            listing("Plateau 2BR walk-up", "Montreal", "QC", 1850.0, 2, 45.5231, -73.5817),
            listing("Yaletown studio with harbour view", "Vancouver", "BC", 2450.0, 0, 49.2744, -123.1216),
            listing("Centretown 2BR near Parliament", "Ottawa", "ON", 2100.0, 2, 45.4186, -75.6976),
            listing("Beltline high-rise 1BR", "Calgary", "AB", 1700.0, 1, 51.0392, -114.0719),
            listing("North End heritage flat", "Halifax", "NS", 1550.0, 1, 44.6570, -63.5920),
            listing("Exchange District 1BR", "Winnipeg", "MB", 1300.0, 1, 49.8994, -97.1376),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inquiry_status_never_ranks_backward() {
        assert!(InquiryStatus::Processing.rank() > InquiryStatus::Pending.rank());
        assert!(InquiryStatus::Completed.rank() > InquiryStatus::Processing.rank());
        assert_eq!(
            InquiryStatus::Completed.rank(),
            InquiryStatus::Failed.rank()
        );
    }

    #[test]
    fn inquiry_status_parses_provider_spellings() {
        assert_eq!(InquiryStatus::parse("PENDING"), Some(InquiryStatus::Pending));
        assert_eq!(
            InquiryStatus::parse("in_progress"),
            Some(InquiryStatus::Processing)
        );
        assert_eq!(
            InquiryStatus::parse("complete"),
            Some(InquiryStatus::Completed)
        );
        assert_eq!(InquiryStatus::parse("error"), Some(InquiryStatus::Failed));
        assert_eq!(InquiryStatus::parse("weird"), None);
    }

    #[test]
    fn score_range_thresholds() {
        assert_eq!(ScoreRange::from_score(780), ScoreRange::Excellent);
        assert_eq!(ScoreRange::from_score(750), ScoreRange::Excellent);
        assert_eq!(ScoreRange::from_score(700), ScoreRange::Good);
        assert_eq!(ScoreRange::from_score(650), ScoreRange::Good);
        assert_eq!(ScoreRange::from_score(600), ScoreRange::Fair);
        assert_eq!(ScoreRange::from_score(550), ScoreRange::Fair);
        assert_eq!(ScoreRange::from_score(400), ScoreRange::Poor);
        assert_eq!(ScoreRange::from_score(300), ScoreRange::Poor);
    }

    #[test]
    fn geocode_response_tolerates_field_variants() {
        let bigdatacloud: ReverseGeocodeResponse = serde_json::from_str(
            r#"{"locality": "Toronto", "principalSubdivision": "Ontario", "countryCode": "CA"}"#,
        )
        .unwrap();
        assert_eq!(bigdatacloud.city.as_deref(), Some("Toronto"));
        assert_eq!(bigdatacloud.province.as_deref(), Some("Ontario"));

        let plain: ReverseGeocodeResponse =
            serde_json::from_str(r#"{"city": "Halifax", "region": "Nova Scotia"}"#).unwrap();
        assert_eq!(plain.city.as_deref(), Some("Halifax"));
        assert_eq!(plain.province.as_deref(), Some("Nova Scotia"));
    }

    #[test]
    fn ip_response_tolerates_field_variants() {
        let ip_api: IpGeolocationResponse = serde_json::from_str(
            r#"{"countryCode": "CA", "lat": 43.65, "lon": -79.38, "city": "Toronto", "regionName": "Ontario"}"#,
        )
        .unwrap();
        assert_eq!(ip_api.country_code.as_deref(), Some("CA"));
        assert_eq!(ip_api.latitude, Some(43.65));
        assert_eq!(ip_api.longitude, Some(-79.38));

        let ipapi_co: IpGeolocationResponse = serde_json::from_str(
            r#"{"country_code": "CA", "latitude": 45.50, "longitude": -73.57, "city": "Montreal", "region_code": "QC"}"#,
        )
        .unwrap();
        assert_eq!(ipapi_co.country_code.as_deref(), Some("CA"));
        assert_eq!(ipapi_co.latitude, Some(45.50));
    }

    #[test]
    fn sample_catalog_listings_are_all_located() {
        let catalog = Property::sample_catalog();
        assert_eq!(catalog.len(), 8);
        assert!(catalog.iter().all(|p| p.coordinate().is_some()));
    }
}
