pub mod access_rules;
pub mod api;
pub mod auth;
pub mod constants;
pub mod context;
pub mod entities;
pub mod error;
pub mod geo;
pub mod priority;
pub mod rate_limit;
pub mod repository;
pub mod services;
pub mod sla;
pub mod verification;
pub mod visibility;

pub fn default_timestamp() -> i64 {
    chrono::Utc::now().timestamp_micros()
}
