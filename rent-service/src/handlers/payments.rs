//! Payment record and settings handlers.
//!
//! Every handler takes its `Authorized<_>` extractor first. Path segments and
//! bodies are parsed only once the caller has passed the role check, and the
//! ownership check runs before the ledger is consulted.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::{ApiResponse, AppError};

use super::parse_period;
use crate::{
    dtos::{
        AnnotateRequest, ConfirmPaymentRequest, OpenRecordRequest, PendingCountResponse,
        SubmitProofRequest, UpdateSettingsRequest,
    },
    middleware::{AdminOnly, Authorized, TenantOrAdmin, ValidatedJson},
    models::{PaymentRecord, PaymentSettings},
    services::authorize_owner,
    AppState,
};

const MY_RECORDS_LIMIT: usize = 24;

/// Open a billing period for a tenant.
pub async fn open_record(
    State(state): State<AppState>,
    auth: Authorized<AdminOnly>,
    ValidatedJson(payload): ValidatedJson<OpenRecordRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentRecord>>), AppError> {
    let period = parse_period(&payload.period)?;

    tracing::info!(
        admin_id = %auth.principal.id,
        tenant_id = %payload.tenant_id,
        period = %period,
        "Opening payment obligation"
    );

    let record = state
        .ledger
        .open_obligation(&payload.tenant_id, period, payload.amount_due)
        .await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(record)))
}

pub async fn get_record(
    State(state): State<AppState>,
    auth: Authorized<TenantOrAdmin>,
    Path((tenant_id, period)): Path<(String, String)>,
) -> Result<Json<ApiResponse<PaymentRecord>>, AppError> {
    authorize_owner(&auth.principal, &tenant_id)?;
    let period = parse_period(&period)?;

    let record = state.ledger.get(&tenant_id, period).await?;
    Ok(ApiResponse::ok(record))
}

/// Tenant submits (or resubmits) proof of payment.
pub async fn submit_proof(
    State(state): State<AppState>,
    auth: Authorized<TenantOrAdmin>,
    Path((tenant_id, period)): Path<(String, String)>,
    ValidatedJson(payload): ValidatedJson<SubmitProofRequest>,
) -> Result<Json<ApiResponse<PaymentRecord>>, AppError> {
    authorize_owner(&auth.principal, &tenant_id)?;
    let period = parse_period(&period)?;

    tracing::info!(
        principal_id = %auth.principal.id,
        tenant_id = %tenant_id,
        period = %period,
        "Submitting payment proof"
    );

    let record = state
        .ledger
        .submit_proof(&tenant_id, period, &payload.proof_url)
        .await?;

    Ok(ApiResponse::ok(record))
}

/// Administrator confirms or rejects a submitted proof.
pub async fn confirm_payment(
    State(state): State<AppState>,
    auth: Authorized<AdminOnly>,
    Path((tenant_id, period)): Path<(String, String)>,
    ValidatedJson(payload): ValidatedJson<ConfirmPaymentRequest>,
) -> Result<Json<ApiResponse<PaymentRecord>>, AppError> {
    let period = parse_period(&period)?;

    tracing::info!(
        admin_id = %auth.principal.id,
        tenant_id = %tenant_id,
        period = %period,
        confirmed = payload.confirmed,
        "Reviewing payment proof"
    );

    let record = state
        .ledger
        .confirm(&tenant_id, period, payload.confirmed, payload.payment_note)
        .await?;

    Ok(ApiResponse::ok(record))
}

pub async fn annotate_payment(
    State(state): State<AppState>,
    _auth: Authorized<AdminOnly>,
    Path((tenant_id, period)): Path<(String, String)>,
    ValidatedJson(payload): ValidatedJson<AnnotateRequest>,
) -> Result<Json<ApiResponse<PaymentRecord>>, AppError> {
    let period = parse_period(&period)?;
    let record = state
        .ledger
        .annotate(&tenant_id, period, &payload.note)
        .await?;

    Ok(ApiResponse::ok(record))
}

/// Records awaiting review, oldest submission first.
pub async fn pending_payments(
    State(state): State<AppState>,
    _auth: Authorized<AdminOnly>,
) -> Result<Json<ApiResponse<Vec<PaymentRecord>>>, AppError> {
    let records = state.ledger.pending().await?;
    Ok(ApiResponse::ok(records))
}

pub async fn pending_count(
    State(state): State<AppState>,
    _auth: Authorized<AdminOnly>,
) -> Result<Json<ApiResponse<PendingCountResponse>>, AppError> {
    let count = state.ledger.pending_count().await?;
    Ok(ApiResponse::ok(PendingCountResponse { count }))
}

/// The caller's own records, newest period first.
pub async fn my_records(
    State(state): State<AppState>,
    auth: Authorized<TenantOrAdmin>,
) -> Result<Json<ApiResponse<Vec<PaymentRecord>>>, AppError> {
    let records = state
        .ledger
        .records_for_tenant(&auth.principal.id, MY_RECORDS_LIMIT)
        .await?;
    Ok(ApiResponse::ok(records))
}

pub async fn get_settings(
    State(state): State<AppState>,
    _auth: Authorized<TenantOrAdmin>,
) -> Result<Json<ApiResponse<PaymentSettings>>, AppError> {
    let settings = state.settings.get().await?;
    Ok(ApiResponse::ok(settings))
}

pub async fn update_settings(
    State(state): State<AppState>,
    auth: Authorized<AdminOnly>,
    ValidatedJson(payload): ValidatedJson<UpdateSettingsRequest>,
) -> Result<Json<ApiResponse<PaymentSettings>>, AppError> {
    tracing::info!(admin_id = %auth.principal.id, "Replacing payment settings");

    let settings = state
        .settings
        .replace(payload.wechat_qr_code_url, payload.payment_note)
        .await?;
    Ok(ApiResponse::ok(settings))
}
