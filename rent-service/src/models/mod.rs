pub mod period;
pub mod principal;
pub mod record;
pub mod report;
pub mod settings;

pub use period::{Period, PeriodError};
pub use principal::{Principal, Role};
pub use record::{PaymentRecord, PaymentStatus, TenantProfile};
pub use report::{MonthlyIncome, PaidTenant, RentStatusReport, RentSummary, UnpaidTenant};
pub use settings::PaymentSettings;
