use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, FindOptions, IndexOptions, ReplaceOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::collections::HashMap;

use super::{RecordStore, SettingsStore, StoreError};
use crate::models::{PaymentRecord, PaymentSettings, PaymentStatus, Period, TenantProfile};

const SETTINGS_ID: &str = "default";
const DUPLICATE_KEY: i32 = 11000;

/// Stored form of a record: the record plus the derived month of its
/// confirmation, which the income report queries on.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    #[serde(flatten)]
    record: PaymentRecord,
    confirmed_month: Option<String>,
}

impl From<&PaymentRecord> for StoredRecord {
    fn from(record: &PaymentRecord) -> Self {
        Self {
            record: record.clone(),
            confirmed_month: record
                .confirmed_at
                .map(|at| Period::containing(at).to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTenant {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    room_number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSettings {
    #[serde(rename = "_id")]
    id: String,
    #[serde(flatten)]
    settings: PaymentSettings,
}

fn backend(e: mongodb::error::Error) -> StoreError {
    StoreError::Backend(anyhow::Error::new(e))
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        &*e.kind,
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY
    )
}

#[derive(Clone)]
pub struct MongoStore {
    records: Collection<StoredRecord>,
    tenants: Collection<StoredTenant>,
    settings: Collection<StoredSettings>,
}

impl MongoStore {
    pub fn new(db: &Database) -> Self {
        Self {
            records: db.collection("payment_records"),
            tenants: db.collection("tenants"),
            settings: db.collection("payment_settings"),
        }
    }

    /// Connect to MongoDB and select `db_name`.
    pub async fn connect(url: &str, db_name: &str) -> Result<Self, AppError> {
        let mut client_options = ClientOptions::parse(url).await.map_err(|e| {
            tracing::error!("Failed to parse MongoDB connection string: {}", e);
            AppError::DatabaseError(e.into())
        })?;
        client_options.app_name = Some("rent-service".to_string());

        let client = Client::with_options(client_options).map_err(|e| {
            tracing::error!("Failed to create MongoDB client: {}", e);
            AppError::DatabaseError(e.into())
        })?;

        Ok(Self::new(&client.database(db_name)))
    }

    pub async fn init_indexes(&self) -> anyhow::Result<()> {
        // One obligation per tenant and month.
        let obligation_index = IndexModel::builder()
            .keys(doc! { "tenantId": 1, "period": 1 })
            .options(
                IndexOptions::builder()
                    .name("tenant_period_unique_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        let period_index = IndexModel::builder()
            .keys(doc! { "period": 1 })
            .options(
                IndexOptions::builder()
                    .name("period_idx".to_string())
                    .build(),
            )
            .build();

        let confirmed_month_index = IndexModel::builder()
            .keys(doc! { "confirmedMonth": 1 })
            .options(
                IndexOptions::builder()
                    .name("confirmed_month_idx".to_string())
                    .sparse(true)
                    .build(),
            )
            .build();

        let status_index = IndexModel::builder()
            .keys(doc! { "status": 1, "submittedAt": 1 })
            .options(
                IndexOptions::builder()
                    .name("status_submitted_idx".to_string())
                    .build(),
            )
            .build();

        self.records
            .create_indexes(
                [
                    obligation_index,
                    period_index,
                    confirmed_month_index,
                    status_index,
                ],
                None,
            )
            .await?;

        tracing::info!("Rent service indexes initialized");
        Ok(())
    }

    async fn find_records(&self, filter: Document) -> Result<Vec<PaymentRecord>, StoreError> {
        let options = FindOptions::builder().sort(doc! { "period": 1 }).build();
        let cursor = self
            .records
            .find(filter, Some(options))
            .await
            .map_err(backend)?;
        let stored: Vec<StoredRecord> = cursor.try_collect().await.map_err(backend)?;
        Ok(stored.into_iter().map(|s| s.record).collect())
    }
}

#[async_trait]
impl RecordStore for MongoStore {
    async fn get(
        &self,
        tenant_id: &str,
        period: Period,
    ) -> Result<Option<PaymentRecord>, StoreError> {
        let filter = doc! { "tenantId": tenant_id, "period": period.to_string() };
        let stored = self
            .records
            .find_one(filter, None)
            .await
            .map_err(backend)?;
        Ok(stored.map(|s| s.record))
    }

    async fn list_by_period(&self, period: Period) -> Result<Vec<PaymentRecord>, StoreError> {
        self.find_records(doc! { "period": period.to_string() })
            .await
    }

    async fn list_by_confirmed_month(
        &self,
        month: Period,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        self.find_records(doc! { "confirmedMonth": month.to_string() })
            .await
    }

    async fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<PaymentRecord>, StoreError> {
        self.find_records(doc! { "tenantId": tenant_id }).await
    }

    async fn list_by_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        self.find_records(doc! { "status": status.as_str() }).await
    }

    async fn insert(&self, record: &PaymentRecord) -> Result<(), StoreError> {
        match self
            .records
            .insert_one(StoredRecord::from(record), None)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Duplicate),
            Err(e) => Err(backend(e)),
        }
    }

    async fn replace(
        &self,
        record: &PaymentRecord,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let filter = doc! {
            "tenantId": record.tenant_id.as_str(),
            "period": record.period.to_string(),
            "version": expected_version as i64,
        };
        let result = self
            .records
            .replace_one(filter, StoredRecord::from(record), None)
            .await
            .map_err(backend)?;

        if result.matched_count == 0 {
            return Err(StoreError::VersionConflict);
        }
        Ok(())
    }

    async fn tenant_profiles(
        &self,
        tenant_ids: &[String],
    ) -> Result<HashMap<String, TenantProfile>, StoreError> {
        if tenant_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let cursor = self
            .tenants
            .find(doc! { "_id": { "$in": tenant_ids.to_vec() } }, None)
            .await
            .map_err(backend)?;
        let stored: Vec<StoredTenant> = cursor.try_collect().await.map_err(backend)?;

        Ok(stored
            .into_iter()
            .map(|t| {
                (
                    t.id.clone(),
                    TenantProfile {
                        id: t.id,
                        name: t.name,
                        room_number: t.room_number,
                    },
                )
            })
            .collect())
    }
}

#[async_trait]
impl SettingsStore for MongoStore {
    async fn load_settings(&self) -> Result<Option<PaymentSettings>, StoreError> {
        let stored = self
            .settings
            .find_one(doc! { "_id": SETTINGS_ID }, None)
            .await
            .map_err(backend)?;
        Ok(stored.map(|s| s.settings))
    }

    async fn save_settings(&self, settings: &PaymentSettings) -> Result<(), StoreError> {
        let stored = StoredSettings {
            id: SETTINGS_ID.to_string(),
            settings: settings.clone(),
        };
        self.settings
            .replace_one(
                doc! { "_id": SETTINGS_ID },
                stored,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await
            .map_err(backend)?;
        Ok(())
    }
}
