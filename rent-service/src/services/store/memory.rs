use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{RecordStore, SettingsStore, StoreError};
use crate::models::{PaymentRecord, PaymentSettings, PaymentStatus, Period, TenantProfile};

/// In-process store for local runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(String, Period), PaymentRecord>>,
    tenants: RwLock<HashMap<String, TenantProfile>>,
    settings: RwLock<Option<PaymentSettings>>,
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Backend(anyhow::anyhow!("Memory store lock poisoned: {}", e))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_tenant(&self, profile: TenantProfile) -> Result<(), StoreError> {
        self.tenants
            .write()
            .map_err(poisoned)?
            .insert(profile.id.clone(), profile);
        Ok(())
    }

    fn filter_records<F>(&self, predicate: F) -> Result<Vec<PaymentRecord>, StoreError>
    where
        F: Fn(&PaymentRecord) -> bool,
    {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.values().filter(|r| predicate(r)).cloned().collect())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(
        &self,
        tenant_id: &str,
        period: Period,
    ) -> Result<Option<PaymentRecord>, StoreError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(&(tenant_id.to_string(), period)).cloned())
    }

    async fn list_by_period(&self, period: Period) -> Result<Vec<PaymentRecord>, StoreError> {
        self.filter_records(|r| r.period == period)
    }

    async fn list_by_confirmed_month(
        &self,
        month: Period,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        self.filter_records(|r| r.confirmed_at.map(Period::containing) == Some(month))
    }

    async fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<PaymentRecord>, StoreError> {
        self.filter_records(|r| r.tenant_id == tenant_id)
    }

    async fn list_by_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        self.filter_records(|r| r.status == status)
    }

    async fn insert(&self, record: &PaymentRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(poisoned)?;
        let key = (record.tenant_id.clone(), record.period);
        if records.contains_key(&key) {
            return Err(StoreError::Duplicate);
        }
        records.insert(key, record.clone());
        Ok(())
    }

    async fn replace(
        &self,
        record: &PaymentRecord,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(poisoned)?;
        match records.get_mut(&(record.tenant_id.clone(), record.period)) {
            Some(stored) if stored.version == expected_version => {
                *stored = record.clone();
                Ok(())
            }
            _ => Err(StoreError::VersionConflict),
        }
    }

    async fn tenant_profiles(
        &self,
        tenant_ids: &[String],
    ) -> Result<HashMap<String, TenantProfile>, StoreError> {
        let tenants = self.tenants.read().map_err(poisoned)?;
        Ok(tenant_ids
            .iter()
            .filter_map(|id| tenants.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load_settings(&self) -> Result<Option<PaymentSettings>, StoreError> {
        Ok(self.settings.read().map_err(poisoned)?.clone())
    }

    async fn save_settings(&self, settings: &PaymentSettings) -> Result<(), StoreError> {
        *self.settings.write().map_err(poisoned)? = Some(settings.clone());
        Ok(())
    }
}
