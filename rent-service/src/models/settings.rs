use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display data shown to tenants on the payment screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSettings {
    pub wechat_qr_code_url: Option<String>,
    pub payment_note: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}
