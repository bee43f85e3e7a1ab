//! Aggregation engine: read-only reports folded over ledger snapshots.
//!
//! Reports are recomputed on every call. A scan may interleave with
//! concurrent transitions; the result is advisory.

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{
    MonthlyIncome, PaidTenant, PaymentRecord, Period, RentStatusReport, RentSummary,
    TenantProfile, UnpaidTenant,
};
use crate::services::clock::Clock;
use crate::services::store::{RecordStore, StoreError};

pub const DEFAULT_INCOME_WINDOW: u32 = 12;
pub const MAX_INCOME_WINDOW: u32 = 120;

#[derive(Clone)]
pub struct StatsService {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl StatsService {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn current_period(&self) -> Period {
        Period::containing(self.clock.now())
    }

    /// Collection status for `period`, defaulting to the current month.
    pub async fn rent_status(
        &self,
        period: Option<Period>,
    ) -> Result<RentStatusReport, StoreError> {
        let period = period.unwrap_or_else(|| self.current_period());
        let records = self.store.list_by_period(period).await?;

        let tenant_ids: Vec<String> = records.iter().map(|r| r.tenant_id.clone()).collect();
        let profiles = self.store.tenant_profiles(&tenant_ids).await?;

        let report = fold_rent_status(period, &records, &profiles);

        tracing::debug!(
            period = %period,
            total_tenants = report.summary.total_tenants,
            paid_count = report.summary.paid_count,
            "Computed rent status"
        );

        Ok(report)
    }

    /// Confirmed income per month over the trailing `months`, oldest first,
    /// ending at the current month.
    pub async fn monthly_income(&self, months: u32) -> Result<Vec<MonthlyIncome>, StoreError> {
        let window = self.current_period().trailing(months);
        let mut series = Vec::with_capacity(window.len());

        for month in window {
            let records = self.store.list_by_confirmed_month(month).await?;
            series.push(MonthlyIncome {
                month,
                amount: confirmed_total(&records, month),
            });
        }

        Ok(series)
    }
}

/// Partition the period's records into paid and unpaid and summarize.
pub fn fold_rent_status(
    period: Period,
    records: &[PaymentRecord],
    profiles: &HashMap<String, TenantProfile>,
) -> RentStatusReport {
    let mut paid = Vec::new();
    let mut unpaid = Vec::new();
    let mut total_expected = 0u64;
    let mut total_collected = 0u64;

    for record in records.iter().filter(|r| r.period == period) {
        let (name, room_number) = match profiles.get(&record.tenant_id) {
            Some(profile) => (profile.name.clone(), profile.room_number.clone()),
            None => (record.tenant_id.clone(), None),
        };

        total_expected += record.amount_due;

        if record.is_confirmed() {
            total_collected += record.amount_due;
            paid.push(PaidTenant {
                id: record.tenant_id.clone(),
                name,
                room_number,
                amount: record.amount_due,
                paid_at: record.confirmed_at,
            });
        } else {
            unpaid.push(UnpaidTenant {
                id: record.tenant_id.clone(),
                name,
                room_number,
                amount: record.amount_due,
                status: record.status,
            });
        }
    }

    paid.sort_by(|a, b| {
        (&a.room_number, &a.name, &a.id).cmp(&(&b.room_number, &b.name, &b.id))
    });
    unpaid.sort_by(|a, b| {
        (&a.room_number, &a.name, &a.id).cmp(&(&b.room_number, &b.name, &b.id))
    });

    let completion_rate = if total_expected == 0 {
        0.0
    } else {
        total_collected as f64 / total_expected as f64
    };

    RentStatusReport {
        month: period,
        summary: RentSummary {
            total_tenants: paid.len() + unpaid.len(),
            paid_count: paid.len(),
            unpaid_count: unpaid.len(),
            total_expected,
            total_collected,
            completion_rate,
        },
        unpaid,
        paid,
    }
}

/// Sum of amounts confirmed within `month`, regardless of billing period.
pub fn confirmed_total(records: &[PaymentRecord], month: Period) -> u64 {
    records
        .iter()
        .filter(|r| r.is_confirmed())
        .filter(|r| r.confirmed_at.map(Period::containing) == Some(month))
        .map(|r| r.amount_due)
        .sum()
}
