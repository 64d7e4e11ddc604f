use serde::{Deserialize, Serialize};

use crate::{
    constants::MICROS_PER_HOUR,
    entities::issue::{Issue, Priority},
};

pub const MAX_ESCALATION_LEVEL: i32 = 3;

pub fn sla_hours(priority: Priority) -> i64 {
    match priority {
        Priority::Urgent => 24,
        Priority::High => 48,
        Priority::Medium => 72,
        Priority::Low => 120,
    }
}

pub fn deadline(priority: Priority, from: i64) -> i64 {
    from + sla_hours(priority) * MICROS_PER_HOUR
}

pub fn next_escalation_level(level: i32) -> i32 {
    (level + 1).min(MAX_ESCALATION_LEVEL)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlaStatus {
    pub deadline: i64,
    pub hours_remaining: f64,
    pub is_overdue: bool,
    pub escalation_level: i32,
    pub breached: bool,
}

pub fn sla_status(issue: &Issue, now: i64) -> SlaStatus {
    let hours_remaining = (issue.sla.deadline - now) as f64 / MICROS_PER_HOUR as f64;
    SlaStatus {
        deadline: issue.sla.deadline,
        hours_remaining,
        is_overdue: hours_remaining < 0.0 && issue.status.is_open(),
        escalation_level: issue.sla.escalation_level,
        breached: issue.sla.breached,
    }
}

/// Whether a resolution at `resolved_at` met the deadline in force.
pub fn resolved_within_sla(issue: &Issue, resolved_at: i64) -> bool {
    !issue.sla.breached && resolved_at <= issue.sla.deadline
}
