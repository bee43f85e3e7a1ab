use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Period;

/// Lifecycle state of a single rent obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    ProofSubmitted,
    Confirmed,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::ProofSubmitted => "proof_submitted",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tenant's rent obligation for one billing month.
///
/// `id`, `tenant_id`, `period` and `amount_due` never change after creation.
/// `version` increases by one on every applied transition and backs the
/// store's compare-and-swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: String,
    pub tenant_id: String,
    pub period: Period,
    /// Smallest currency unit.
    pub amount_due: u64,
    pub status: PaymentStatus,
    pub proof_url: Option<String>,
    pub payment_note: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// A fresh `unpaid` obligation.
    pub fn open(tenant_id: &str, period: Period, amount_due: u64, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            period,
            amount_due,
            status: PaymentStatus::Unpaid,
            proof_url: None,
            payment_note: None,
            submitted_at: None,
            confirmed_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == PaymentStatus::Confirmed
    }
}

/// Directory entry for a tenant, owned by tenant management.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantProfile {
    pub id: String,
    pub name: String,
    pub room_number: Option<String>,
}
