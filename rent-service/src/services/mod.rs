pub mod access;
pub mod clock;
pub mod ledger;
pub mod metrics;
pub mod principal;
pub mod settings;
pub mod stats;
pub mod store;

pub use access::{authorize, authorize_owner, AccessError, RoleSet, ADMIN_ONLY, TENANT_OR_ADMIN};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::{LedgerError, LedgerEvent, PaymentLedger};
pub use metrics::{get_metrics, init_metrics};
pub use principal::{JwtPrincipalResolver, PrincipalResolver};
pub use settings::SettingsService;
pub use stats::StatsService;
pub use store::{MemoryStore, MongoStore, RecordStore, SettingsStore, StoreError};
