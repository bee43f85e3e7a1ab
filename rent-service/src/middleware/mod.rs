pub mod auth;
pub mod validated_json;

pub use auth::{AdminOnly, Authorized, Policy, TenantOrAdmin};
pub use validated_json::ValidatedJson;
