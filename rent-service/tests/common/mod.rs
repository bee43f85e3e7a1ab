#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use rent_service::{
    build_router,
    config::{AuthConfig, Config, ServerConfig, StoreBackend, StoreConfig},
    models::{PaymentRecord, PaymentSettings, PaymentStatus, Period, Principal, Role, TenantProfile},
    services::{
        JwtPrincipalResolver, ManualClock, MemoryStore, PaymentLedger, RecordStore,
        SettingsService, SettingsStore, StatsService, StoreError,
    },
    AppState,
};
use secrecy::Secret;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_JWT_SECRET: &str = "rent-service-test-secret";
pub const ADMIN_ID: &str = "admin-1";

/// 2024-03-15 09:00 UTC.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()
}

pub fn period(s: &str) -> Period {
    s.parse().unwrap()
}

pub fn test_config() -> Config {
    Config {
        common: service_core::config::Config {
            log_level: "error".to_string(),
            otlp_endpoint: None,
            environment: service_core::config::Environment::Dev,
        },
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        store: StoreConfig {
            backend: StoreBackend::Memory,
            url: Secret::new(String::new()),
            db_name: String::new(),
        },
        auth: AuthConfig {
            jwt_secret: Secret::new(TEST_JWT_SECRET.to_string()),
            access_token_expiry_minutes: 15,
        },
        service_name: "rent-service-test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
    }
}

/// Record store wrapper that counts every call reaching the backend.
pub struct CountingStore {
    inner: Arc<MemoryStore>,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn get(
        &self,
        tenant_id: &str,
        period: Period,
    ) -> Result<Option<PaymentRecord>, StoreError> {
        self.hit();
        self.inner.get(tenant_id, period).await
    }

    async fn list_by_period(&self, period: Period) -> Result<Vec<PaymentRecord>, StoreError> {
        self.hit();
        self.inner.list_by_period(period).await
    }

    async fn list_by_confirmed_month(
        &self,
        month: Period,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        self.hit();
        self.inner.list_by_confirmed_month(month).await
    }

    async fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<PaymentRecord>, StoreError> {
        self.hit();
        self.inner.list_by_tenant(tenant_id).await
    }

    async fn list_by_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        self.hit();
        self.inner.list_by_status(status).await
    }

    async fn insert(&self, record: &PaymentRecord) -> Result<(), StoreError> {
        self.hit();
        self.inner.insert(record).await
    }

    async fn replace(
        &self,
        record: &PaymentRecord,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        self.hit();
        self.inner.replace(record, expected_version).await
    }

    async fn tenant_profiles(
        &self,
        tenant_ids: &[String],
    ) -> Result<HashMap<String, TenantProfile>, StoreError> {
        self.hit();
        self.inner.tenant_profiles(tenant_ids).await
    }
}

#[async_trait]
impl SettingsStore for CountingStore {
    async fn load_settings(&self) -> Result<Option<PaymentSettings>, StoreError> {
        self.hit();
        self.inner.load_settings().await
    }

    async fn save_settings(&self, settings: &PaymentSettings) -> Result<(), StoreError> {
        self.hit();
        self.inner.save_settings(settings).await
    }
}

/// Record store wrapper that yields to the scheduler after every read, so a
/// concurrent writer can run between a transition's `get` and its `replace`.
pub struct YieldingStore {
    inner: Arc<MemoryStore>,
    replaces: AtomicUsize,
}

impl YieldingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            replaces: AtomicUsize::new(0),
        }
    }

    /// Successful and refused `replace` calls alike.
    pub fn replaces(&self) -> usize {
        self.replaces.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for YieldingStore {
    async fn get(
        &self,
        tenant_id: &str,
        period: Period,
    ) -> Result<Option<PaymentRecord>, StoreError> {
        let record = self.inner.get(tenant_id, period).await;
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        record
    }

    async fn list_by_period(&self, period: Period) -> Result<Vec<PaymentRecord>, StoreError> {
        self.inner.list_by_period(period).await
    }

    async fn list_by_confirmed_month(
        &self,
        month: Period,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        self.inner.list_by_confirmed_month(month).await
    }

    async fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<PaymentRecord>, StoreError> {
        self.inner.list_by_tenant(tenant_id).await
    }

    async fn list_by_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        self.inner.list_by_status(status).await
    }

    async fn insert(&self, record: &PaymentRecord) -> Result<(), StoreError> {
        self.inner.insert(record).await
    }

    async fn replace(
        &self,
        record: &PaymentRecord,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        self.replaces.fetch_add(1, Ordering::SeqCst);
        self.inner.replace(record, expected_version).await
    }

    async fn tenant_profiles(
        &self,
        tenant_ids: &[String],
    ) -> Result<HashMap<String, TenantProfile>, StoreError> {
        self.inner.tenant_profiles(tenant_ids).await
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub spy: Arc<CountingStore>,
    pub clock: Arc<ManualClock>,
    pub ledger: PaymentLedger,
    pub principals: JwtPrincipalResolver,
}

impl TestApp {
    pub fn new() -> Self {
        let config = test_config();
        let store = Arc::new(MemoryStore::new());
        let spy = Arc::new(CountingStore::new(store.clone()));
        let clock = Arc::new(ManualClock::new(test_now()));
        let principals = JwtPrincipalResolver::new(
            &config.auth.jwt_secret,
            config.auth.access_token_expiry_minutes,
        );

        let ledger = PaymentLedger::new(spy.clone(), clock.clone());
        let state = AppState {
            config,
            ledger: ledger.clone(),
            stats: StatsService::new(spy.clone(), clock.clone()),
            settings: SettingsService::new(spy.clone(), clock.clone()),
            principals: Arc::new(principals.clone()),
        };

        Self {
            router: build_router(state),
            store,
            spy,
            clock,
            ledger,
            principals,
        }
    }

    pub fn token(&self, id: &str, role: Role) -> String {
        self.principals
            .issue_access_token(&Principal {
                id: id.to_string(),
                role,
            })
            .expect("Failed to issue test token")
    }

    pub fn admin_token(&self) -> String {
        self.token(ADMIN_ID, Role::Admin)
    }

    pub fn tenant_token(&self, tenant_id: &str) -> String {
        self.token(tenant_id, Role::Tenant)
    }

    pub fn add_tenant(&self, id: &str, name: &str, room: &str) {
        self.store
            .upsert_tenant(TenantProfile {
                id: id.to_string(),
                name: name.to_string(),
                room_number: Some(room.to_string()),
            })
            .expect("Failed to add tenant");
    }

    /// Open an obligation directly through the ledger.
    pub async fn open(&self, tenant_id: &str, p: &str, amount: u64) -> PaymentRecord {
        self.ledger
            .open_obligation(tenant_id, period(p), amount)
            .await
            .expect("Failed to open obligation")
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request("PUT", uri, token, Some(body)).await
    }
}
