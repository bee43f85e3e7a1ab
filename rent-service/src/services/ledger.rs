//! Payment ledger.
//!
//! The only component that mutates payment state. Every transition for a
//! (tenant, period) key runs under that key's mutex: read, guard check and
//! write happen as one unit. The store's version compare-and-swap covers
//! writers in other processes.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use service_core::error::AppError;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::{PaymentRecord, PaymentStatus, Period};
use crate::services::clock::Clock;
use crate::services::metrics::{record_confirmed_amount, record_transition};
use crate::services::store::{RecordStore, StoreError};

const MAX_PROOF_URL_LEN: usize = 2048;
const MAX_NOTE_LEN: usize = 1000;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("no payment record for tenant {tenant_id} in {period}")]
    NotFound { tenant_id: String, period: Period },

    #[error("cannot {event} a record in state {from}")]
    InvalidTransition {
        from: PaymentStatus,
        event: &'static str,
    },

    #[error("{0}")]
    Validation(String),

    #[error("tenant {tenant_id} already has an obligation for {period}")]
    Duplicate { tenant_id: String, period: Period },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound { .. } => AppError::NotFound(anyhow::anyhow!(err)),
            LedgerError::InvalidTransition { .. } => {
                AppError::InvalidTransition(anyhow::anyhow!(err))
            }
            LedgerError::Validation(_) => AppError::UnprocessableEntity(anyhow::anyhow!(err)),
            LedgerError::Duplicate { .. } => AppError::Conflict(anyhow::anyhow!(err)),
            LedgerError::Store(e) => AppError::DatabaseError(e),
        }
    }
}

/// Events the state machine accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    SubmitProof { proof_url: String },
    Review { confirmed: bool, note: Option<String> },
    Annotate { note: String },
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::SubmitProof { .. } => "submit_proof",
            LedgerEvent::Review { .. } => "confirm",
            LedgerEvent::Annotate { .. } => "annotate",
        }
    }
}

/// Apply `event` to `record`, returning the successor or the guard failure.
///
/// Pure: the input record is never modified, so a rejected event leaves
/// nothing behind.
pub fn apply(
    record: &PaymentRecord,
    event: &LedgerEvent,
    now: DateTime<Utc>,
) -> Result<PaymentRecord, LedgerError> {
    let mut next = record.clone();

    match (record.status, event) {
        (
            PaymentStatus::Unpaid | PaymentStatus::Rejected,
            LedgerEvent::SubmitProof { proof_url },
        ) => {
            next.status = PaymentStatus::ProofSubmitted;
            next.proof_url = Some(proof_url.clone());
            next.submitted_at = Some(now);
            next.payment_note = None;
        }
        (PaymentStatus::ProofSubmitted, LedgerEvent::Review { confirmed: true, note }) => {
            next.status = PaymentStatus::Confirmed;
            next.confirmed_at = Some(record.confirmed_at.unwrap_or(now));
            next.payment_note = note.clone();
        }
        (PaymentStatus::ProofSubmitted, LedgerEvent::Review { confirmed: false, note }) => {
            next.status = PaymentStatus::Rejected;
            next.payment_note = note.clone();
        }
        (PaymentStatus::Confirmed, LedgerEvent::Annotate { note }) => {
            next.payment_note = Some(match &record.payment_note {
                Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, note),
                _ => note.clone(),
            });
        }
        (from, event) => {
            return Err(LedgerError::InvalidTransition {
                from,
                event: event.name(),
            });
        }
    }

    next.version = record.version + 1;
    next.updated_at = now;
    Ok(next)
}

fn validate_proof_url(proof_url: &str) -> Result<String, LedgerError> {
    let trimmed = proof_url.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::Validation(
            "proof URL must not be empty".to_string(),
        ));
    }
    if trimmed.len() > MAX_PROOF_URL_LEN {
        return Err(LedgerError::Validation(format!(
            "proof URL must be at most {} characters",
            MAX_PROOF_URL_LEN
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_note(note: Option<String>) -> Result<Option<String>, LedgerError> {
    match note {
        Some(n) if n.chars().count() > MAX_NOTE_LEN => Err(LedgerError::Validation(format!(
            "payment note must be at most {} characters",
            MAX_NOTE_LEN
        ))),
        other => Ok(other),
    }
}

type RecordKey = (String, Period);
type LockMap = DashMap<RecordKey, Arc<Mutex<()>>>;

/// One transition's claim on a key's mutex. Dropping it removes the map
/// entry once no other transition holds the key, including when the
/// transition future is cancelled.
struct KeyLock<'a> {
    locks: &'a LockMap,
    key: RecordKey,
    mutex: Arc<Mutex<()>>,
}

impl<'a> KeyLock<'a> {
    fn acquire(locks: &'a LockMap, key: RecordKey) -> Self {
        let mutex = locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Self { locks, key, mutex }
    }
}

impl Drop for KeyLock<'_> {
    fn drop(&mut self) {
        // The map's handle plus ours.
        self.locks.remove_if(&self.key, |_, m| Arc::strong_count(m) == 2);
    }
}

#[derive(Clone)]
pub struct PaymentLedger {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    locks: Arc<LockMap>,
}

impl PaymentLedger {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Open a billing period for a tenant with an `unpaid` obligation.
    pub async fn open_obligation(
        &self,
        tenant_id: &str,
        period: Period,
        amount_due: u64,
    ) -> Result<PaymentRecord, LedgerError> {
        if tenant_id.trim().is_empty() {
            return Err(LedgerError::Validation(
                "tenant id must not be empty".to_string(),
            ));
        }
        if amount_due == 0 {
            return Err(LedgerError::Validation(
                "amount due must be positive".to_string(),
            ));
        }

        let record = PaymentRecord::open(tenant_id, period, amount_due, self.clock.now());

        match self.store.insert(&record).await {
            Ok(()) => {}
            Err(StoreError::Duplicate) => {
                return Err(LedgerError::Duplicate {
                    tenant_id: tenant_id.to_string(),
                    period,
                });
            }
            Err(e) => return Err(store_failure(e)),
        }

        tracing::info!(
            tenant_id = %tenant_id,
            period = %period,
            amount_due = amount_due,
            record_id = %record.id,
            "Opened payment obligation"
        );
        record_transition("open", "applied");

        Ok(record)
    }

    pub async fn get(&self, tenant_id: &str, period: Period) -> Result<PaymentRecord, LedgerError> {
        self.store
            .get(tenant_id, period)
            .await
            .map_err(store_failure)?
            .ok_or_else(|| LedgerError::NotFound {
                tenant_id: tenant_id.to_string(),
                period,
            })
    }

    /// Tenant submits proof of payment for an `unpaid` or `rejected` record.
    pub async fn submit_proof(
        &self,
        tenant_id: &str,
        period: Period,
        proof_url: &str,
    ) -> Result<PaymentRecord, LedgerError> {
        let proof_url = validate_proof_url(proof_url)?;
        self.transition(tenant_id, period, LedgerEvent::SubmitProof { proof_url })
            .await
    }

    /// Administrator accepts (`confirmed = true`) or rejects a submitted proof.
    pub async fn confirm(
        &self,
        tenant_id: &str,
        period: Period,
        confirmed: bool,
        note: Option<String>,
    ) -> Result<PaymentRecord, LedgerError> {
        let note = validate_note(note)?;
        let record = self
            .transition(tenant_id, period, LedgerEvent::Review { confirmed, note })
            .await?;

        if record.is_confirmed() {
            record_confirmed_amount(record.amount_due);
        }
        Ok(record)
    }

    /// Append an administrator note to a confirmed record.
    pub async fn annotate(
        &self,
        tenant_id: &str,
        period: Period,
        note: &str,
    ) -> Result<PaymentRecord, LedgerError> {
        let note = note.trim();
        if note.is_empty() {
            return Err(LedgerError::Validation("note must not be empty".to_string()));
        }
        let note = validate_note(Some(note.to_string()))?.unwrap_or_default();
        self.transition(tenant_id, period, LedgerEvent::Annotate { note })
            .await
    }

    /// A tenant's records, newest period first.
    pub async fn records_for_tenant(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<PaymentRecord>, LedgerError> {
        let mut records = self
            .store
            .list_by_tenant(tenant_id)
            .await
            .map_err(store_failure)?;
        records.sort_by(|a, b| b.period.cmp(&a.period));
        records.truncate(limit);
        Ok(records)
    }

    /// Records awaiting review, oldest submission first.
    pub async fn pending(&self) -> Result<Vec<PaymentRecord>, LedgerError> {
        let mut records = self
            .store
            .list_by_status(PaymentStatus::ProofSubmitted)
            .await
            .map_err(store_failure)?;
        records.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        Ok(records)
    }

    pub async fn pending_count(&self) -> Result<usize, LedgerError> {
        Ok(self
            .store
            .list_by_status(PaymentStatus::ProofSubmitted)
            .await
            .map_err(store_failure)?
            .len())
    }

    async fn transition(
        &self,
        tenant_id: &str,
        period: Period,
        event: LedgerEvent,
    ) -> Result<PaymentRecord, LedgerError> {
        let key_lock = KeyLock::acquire(&self.locks, (tenant_id.to_string(), period));
        let result = {
            let _guard = key_lock.mutex.lock().await;
            self.apply_locked(tenant_id, period, &event).await
        };
        drop(key_lock);

        let outcome = match &result {
            Ok(_) => "applied",
            Err(LedgerError::InvalidTransition { .. }) => "rejected",
            Err(LedgerError::NotFound { .. }) => "not_found",
            Err(_) => "error",
        };
        record_transition(event.name(), outcome);

        result
    }

    async fn apply_locked(
        &self,
        tenant_id: &str,
        period: Period,
        event: &LedgerEvent,
    ) -> Result<PaymentRecord, LedgerError> {
        let current = self.get(tenant_id, period).await?;

        let next = apply(&current, event, self.clock.now()).inspect_err(|_| {
            tracing::warn!(
                tenant_id = %tenant_id,
                period = %period,
                status = %current.status,
                event = event.name(),
                "Rejected invalid payment transition"
            );
        })?;

        match self.store.replace(&next, current.version).await {
            Ok(()) => {}
            Err(StoreError::VersionConflict) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    period = %period,
                    event = event.name(),
                    "Payment record changed underneath transition"
                );
                return Err(LedgerError::InvalidTransition {
                    from: current.status,
                    event: event.name(),
                });
            }
            Err(e) => return Err(store_failure(e)),
        }

        tracing::info!(
            tenant_id = %tenant_id,
            period = %period,
            from = %current.status,
            to = %next.status,
            event = event.name(),
            "Payment record transitioned"
        );

        Ok(next)
    }
}

fn store_failure(e: StoreError) -> LedgerError {
    match e {
        StoreError::Backend(inner) => {
            tracing::error!(error = %inner, "Record store failure");
            LedgerError::Store(inner)
        }
        other => LedgerError::Store(anyhow::anyhow!(other)),
    }
}
