use chrono::Duration;
use lazy_static::lazy_static;

lazy_static! {
    pub static ref DURATION: Duration = Duration::days(7);
}

pub const MICROS_PER_HOUR: i64 = 3_600_000_000;

pub const DUPLICATE_RADIUS_METERS: f64 = 50.0;
pub const DUPLICATE_WINDOW_DAYS: i64 = 7;
pub const DUPLICATE_LIMIT: i64 = 5;

pub const PUBLIC_CACHE_SECONDS: i64 = 300;

pub const ANONYMOUS_NAME: &str = "Anonymous Citizen";

pub const MAX_PAGE_SIZE: u64 = 100;
