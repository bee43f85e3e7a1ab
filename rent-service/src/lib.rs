pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

use std::sync::Arc;

use config::Config;
use services::{PaymentLedger, PrincipalResolver, SettingsService, StatsService};

pub use startup::{build_router, Application};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub ledger: PaymentLedger,
    pub stats: StatsService,
    pub settings: SettingsService,
    pub principals: Arc<dyn PrincipalResolver>,
}
