//! Reporting views derived from the ledger.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{PaymentStatus, Period};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentStatusReport {
    pub month: Period,
    pub summary: RentSummary,
    pub unpaid: Vec<UnpaidTenant>,
    pub paid: Vec<PaidTenant>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentSummary {
    pub total_tenants: usize,
    pub paid_count: usize,
    pub unpaid_count: usize,
    pub total_expected: u64,
    pub total_collected: u64,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpaidTenant {
    pub id: String,
    pub name: String,
    pub room_number: Option<String>,
    pub amount: u64,
    /// Fine-grained state folded into the unpaid bucket.
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaidTenant {
    pub id: String,
    pub name: String,
    pub room_number: Option<String>,
    pub amount: u64,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyIncome {
    pub month: Period,
    pub amount: u64,
}
