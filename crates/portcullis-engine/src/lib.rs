pub mod bootstrap;
pub mod proxy_engine;
pub mod quota;
pub mod schedulers;
pub mod state;
pub mod upstream_client;

pub use quota::{ConcurrencyGuard, QuotaDenialReason, QuotaEnforcer};
