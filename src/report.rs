use crate::models::{
    CreditAccount, CreditInquiryRecord, CreditReport, InquiryStatus, PublicRecord, ReportFactors,
    ReportPayload, ScoreRange, WireAccount,
};

const SCORE_FLOOR: u16 = 300;
const SCORE_CEILING: u16 = 850;
const SCORE_BASE: f64 = 650.0;
const ON_TIME_WEIGHT: f64 = 200.0;

/// Derives a score from payment history: base 650 plus up to 200 points for
/// the on-time-payment ratio, clamped to `[300, 850]`. The formula is a
/// placeholder heuristic; the clamp and range thresholds are contractual.
pub fn derive_score(accounts: &[WireAccount]) -> u16 {
    let on_time: u32 = accounts
        .iter()
        .filter_map(|a| a.on_time_payments)
        .sum();
    let late: u32 = accounts.iter().filter_map(|a| a.late_payments).sum();

    let total = on_time + late;
    let ratio = if total == 0 {
        0.0
    } else {
        f64::from(on_time) / f64::from(total)
    };

    let raw = SCORE_BASE + ratio * ON_TIME_WEIGHT;
    (raw.round() as i64).clamp(i64::from(SCORE_FLOOR), i64::from(SCORE_CEILING)) as u16
}

/// Human-readable factors derived from the same history signals as the score.
pub fn derive_factors(payload: &ReportPayload, score: u16) -> ReportFactors {
    let mut factors = ReportFactors::default();

    let late: u32 = payload
        .accounts
        .iter()
        .filter_map(|a| a.late_payments)
        .sum();
    let on_time: u32 = payload
        .accounts
        .iter()
        .filter_map(|a| a.on_time_payments)
        .sum();

    if on_time > 0 && late == 0 {
        factors
            .positive
            .push("Perfect on-time payment history".to_string());
    } else if on_time > late * 10 {
        factors
            .positive
            .push("Strong on-time payment history".to_string());
    }
    if payload.public_records.is_empty() {
        factors.positive.push("No public records".to_string());
    }

    if late > 0 {
        factors
            .negative
            .push(format!("{} late payment(s) on record", late));
    }
    if !payload.public_records.is_empty() {
        factors
            .negative
            .push("Public records present".to_string());
    }
    if payload.inquiries.len() > 3 {
        factors
            .negative
            .push("Multiple recent credit inquiries".to_string());
    }
    if ScoreRange::from_score(score) == ScoreRange::Poor {
        factors
            .negative
            .push("Score in the lowest band".to_string());
    }

    factors
}

/// Maps a raw provider payload into the canonical report shape for a
/// completed inquiry.
pub fn build_report(inquiry_id: &str, payload: &ReportPayload) -> CreditReport {
    let score = derive_score(&payload.accounts);
    let factors = derive_factors(payload, score);

    let accounts = payload
        .accounts
        .iter()
        .map(|a| CreditAccount {
            account_type: a.account_type.clone().unwrap_or_else(|| "unknown".to_string()),
            status: a.status.clone().unwrap_or_else(|| "unknown".to_string()),
            balance: a.balance.unwrap_or(0.0),
            on_time_payments: a.on_time_payments.unwrap_or(0),
            late_payments: a.late_payments.unwrap_or(0),
        })
        .collect();

    let inquiries = payload
        .inquiries
        .iter()
        .map(|i| CreditInquiryRecord {
            creditor: i.creditor.clone().unwrap_or_else(|| "unknown".to_string()),
            date: i.date.clone().unwrap_or_default(),
        })
        .collect();

    let public_records = payload
        .public_records
        .iter()
        .map(|r| PublicRecord {
            record_type: r.record_type.clone().unwrap_or_else(|| "unknown".to_string()),
            description: r.description.clone(),
        })
        .collect();

    CreditReport {
        id: format!("rpt_{}", inquiry_id),
        status: InquiryStatus::Completed,
        score,
        score_range: ScoreRange::from_score(score),
        factors,
        accounts,
        inquiries,
        public_records,
    }
}
