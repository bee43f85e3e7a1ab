//! Record store seam.
//!
//! The ledger consumes the store as a collection of single-record atomic
//! operations. Per-record serialization is the ledger's job; `replace` adds a
//! version compare-and-swap so concurrent writers on other replicas cannot
//! both win.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use service_core::error::AppError;
use std::collections::HashMap;
use thiserror::Error;

use crate::models::{PaymentRecord, PaymentSettings, PaymentStatus, Period, TenantProfile};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a record already exists for this tenant and period")]
    Duplicate,
    #[error("record was modified concurrently")]
    VersionConflict,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => AppError::Conflict(anyhow::anyhow!(err)),
            StoreError::VersionConflict => AppError::InvalidTransition(anyhow::anyhow!(err)),
            StoreError::Backend(e) => AppError::DatabaseError(e),
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, tenant_id: &str, period: Period)
        -> Result<Option<PaymentRecord>, StoreError>;

    async fn list_by_period(&self, period: Period) -> Result<Vec<PaymentRecord>, StoreError>;

    /// Records whose `confirmed_at` falls in `month`.
    async fn list_by_confirmed_month(&self, month: Period)
        -> Result<Vec<PaymentRecord>, StoreError>;

    async fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<PaymentRecord>, StoreError>;

    async fn list_by_status(&self, status: PaymentStatus)
        -> Result<Vec<PaymentRecord>, StoreError>;

    /// Insert a new record. Fails with `Duplicate` if (tenant, period) exists.
    async fn insert(&self, record: &PaymentRecord) -> Result<(), StoreError>;

    /// Replace the stored record only if its version is still `expected_version`.
    async fn replace(&self, record: &PaymentRecord, expected_version: u64)
        -> Result<(), StoreError>;

    /// Directory entries for the given tenants. Unknown ids are omitted.
    async fn tenant_profiles(
        &self,
        tenant_ids: &[String],
    ) -> Result<HashMap<String, TenantProfile>, StoreError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load_settings(&self) -> Result<Option<PaymentSettings>, StoreError>;

    async fn save_settings(&self, settings: &PaymentSettings) -> Result<(), StoreError>;
}
