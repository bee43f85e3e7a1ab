use std::sync::Arc;

use crate::models::PaymentSettings;
use crate::services::clock::Clock;
use crate::services::store::{SettingsStore, StoreError};

/// Owner of the payment display settings.
#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
}

impl SettingsService {
    pub fn new(store: Arc<dyn SettingsStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Current settings, or empty defaults if an administrator never saved any.
    pub async fn get(&self) -> Result<PaymentSettings, StoreError> {
        Ok(self.store.load_settings().await?.unwrap_or_default())
    }

    /// Replace the settings wholesale.
    pub async fn replace(
        &self,
        wechat_qr_code_url: Option<String>,
        payment_note: Option<String>,
    ) -> Result<PaymentSettings, StoreError> {
        let settings = PaymentSettings {
            wechat_qr_code_url,
            payment_note,
            updated_at: Some(self.clock.now()),
        };
        self.store.save_settings(&settings).await?;

        tracing::info!("Payment settings updated");
        Ok(settings)
    }
}
