pub mod dashboard;
pub mod issue;
pub mod lifecycle;
pub mod notification;
pub mod performance;
