use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::{
    constants::MICROS_PER_HOUR, default_timestamp, impl_has_last_modified, repository::Entity,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaffPerformance {
    /// Same as the staff member's user id, one document per user.
    pub id: ObjectId,
    #[serde(default)]
    pub department_id: Option<ObjectId>,
    #[serde(default)]
    pub resolved: i64,
    #[serde(default)]
    pub within_sla: i64,
    #[serde(default)]
    pub penalties: i64,
    #[serde(default)]
    pub total_resolution_hours: f64,
    #[serde(default)]
    pub last_resolved_at: Option<i64>,
    #[serde(default = "default_timestamp")]
    pub last_modified: i64,
}

impl_has_last_modified!(StaffPerformance);

impl Entity for StaffPerformance {
    fn id(&self) -> ObjectId {
        self.id
    }
}

impl StaffPerformance {
    pub fn new(user_id: ObjectId, department_id: Option<ObjectId>) -> Self {
        Self {
            id: user_id,
            department_id,
            resolved: 0,
            within_sla: 0,
            penalties: 0,
            total_resolution_hours: 0.0,
            last_resolved_at: None,
            last_modified: default_timestamp(),
        }
    }

    pub fn record_resolution(&mut self, hours: f64, within_sla: bool, resolved_at: i64) {
        self.resolved += 1;
        self.within_sla += within_sla as i64;
        self.total_resolution_hours += hours;
        self.last_resolved_at = Some(resolved_at);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepartmentPerformance {
    /// Same as the department id.
    pub id: ObjectId,
    #[serde(default)]
    pub resolved: i64,
    #[serde(default)]
    pub within_sla: i64,
    #[serde(default)]
    pub breached: i64,
    #[serde(default)]
    pub escalated: i64,
    #[serde(default)]
    pub total_resolution_hours: f64,
    #[serde(default = "default_timestamp")]
    pub last_modified: i64,
}

impl_has_last_modified!(DepartmentPerformance);

impl Entity for DepartmentPerformance {
    fn id(&self) -> ObjectId {
        self.id
    }
}

impl DepartmentPerformance {
    pub fn new(department_id: ObjectId) -> Self {
        Self {
            id: department_id,
            resolved: 0,
            within_sla: 0,
            breached: 0,
            escalated: 0,
            total_resolution_hours: 0.0,
            last_modified: default_timestamp(),
        }
    }

    pub fn record_resolution(&mut self, hours: f64, within_sla: bool) {
        self.resolved += 1;
        if within_sla {
            self.within_sla += 1;
        } else {
            self.breached += 1;
        }
        self.total_resolution_hours += hours;
    }
}

fn average(total: f64, count: i64) -> Option<f64> {
    (count > 0).then(|| total / count as f64)
}

fn rate(part: i64, count: i64) -> Option<f64> {
    (count > 0).then(|| part as f64 * 100.0 / count as f64)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicStaffPerformance {
    pub user_id: String,
    pub department_id: Option<String>,
    pub resolved: i64,
    pub within_sla: i64,
    pub sla_compliance: Option<f64>,
    /// Removed for viewers outside management.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalties: Option<i64>,
    pub average_resolution_hours: Option<f64>,
    pub last_resolved_at: Option<i64>,
}

impl From<StaffPerformance> for PublicStaffPerformance {
    fn from(staff: StaffPerformance) -> Self {
        Self {
            user_id: staff.id.to_hex(),
            department_id: staff.department_id.map(|id| id.to_hex()),
            resolved: staff.resolved,
            within_sla: staff.within_sla,
            sla_compliance: rate(staff.within_sla, staff.resolved),
            penalties: Some(staff.penalties),
            average_resolution_hours: average(staff.total_resolution_hours, staff.resolved),
            last_resolved_at: staff.last_resolved_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicDepartmentPerformance {
    pub department_id: String,
    pub resolved: i64,
    pub within_sla: i64,
    pub breached: i64,
    pub escalated: i64,
    pub sla_compliance: Option<f64>,
    pub average_resolution_hours: Option<f64>,
}

impl From<DepartmentPerformance> for PublicDepartmentPerformance {
    fn from(department: DepartmentPerformance) -> Self {
        Self {
            department_id: department.id.to_hex(),
            resolved: department.resolved,
            within_sla: department.within_sla,
            breached: department.breached,
            escalated: department.escalated,
            sla_compliance: rate(department.within_sla, department.resolved),
            average_resolution_hours: average(
                department.total_resolution_hours,
                department.resolved,
            ),
        }
    }
}

pub fn hours_between(from: i64, to: i64) -> f64 {
    (to - from) as f64 / MICROS_PER_HOUR as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_are_derived_on_read() {
        let mut department = DepartmentPerformance::new(ObjectId::new());
        assert_eq!(
            PublicDepartmentPerformance::from(department.clone()).average_resolution_hours,
            None
        );

        department.record_resolution(10.0, true);
        department.record_resolution(30.0, false);

        let public = PublicDepartmentPerformance::from(department);
        assert_eq!(public.resolved, 2);
        assert_eq!(public.breached, 1);
        assert_eq!(public.average_resolution_hours, Some(20.0));
        assert_eq!(public.sla_compliance, Some(50.0));
    }

    #[test]
    fn hours_between_uses_micros() {
        assert_eq!(hours_between(0, 2 * MICROS_PER_HOUR), 2.0);
    }
}
