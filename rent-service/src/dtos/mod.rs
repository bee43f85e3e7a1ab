use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OpenRecordRequest {
    #[validate(length(min = 1, max = 128, message = "Tenant id is required"))]
    pub tenant_id: String,
    /// Billing month, `YYYY-MM`.
    pub period: String,
    #[validate(range(min = 1, message = "Amount due must be positive"))]
    pub amount_due: u64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitProofRequest {
    #[serde(alias = "paymentProofUrl")]
    #[validate(length(max = 2048, message = "Proof URL is too long"))]
    pub proof_url: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    pub confirmed: bool,
    #[validate(length(max = 1000, message = "Payment note is too long"))]
    pub payment_note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateRequest {
    #[validate(length(min = 1, max = 1000, message = "Note must be 1-1000 characters"))]
    pub note: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    #[validate(length(max = 2048, message = "QR code URL is too long"))]
    pub wechat_qr_code_url: Option<String>,
    #[validate(length(max = 1000, message = "Payment note is too long"))]
    pub payment_note: Option<String>,
}

/// Query strings stay unparsed until the caller has been authorized.
#[derive(Debug, Deserialize)]
pub struct RentStatusQuery {
    pub period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MonthlyIncomeQuery {
    pub months: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PendingCountResponse {
    pub count: usize,
}
