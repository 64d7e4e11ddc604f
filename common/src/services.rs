use std::env::var;

use lazy_static::lazy_static;

lazy_static! {
    pub static ref PROTOCOL: String = var("PROTOCOL").unwrap_or_else(|_| "http".to_string());
    pub static ref FRONTEND: String = var("FRONTEND").unwrap_or_default();
    pub static ref DATABASE: String = var("DATABASE").unwrap_or_else(|_| "civic".to_string());
    /// Notifications are skipped when unset.
    pub static ref MAIL_SERVICE: Option<String> =
        var("MAIL_SERVICE_URL").ok().filter(|url| !url.is_empty());
}
