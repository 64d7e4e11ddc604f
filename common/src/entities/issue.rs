use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::{
    default_timestamp,
    error::{self, AddCode},
    geo::GeoPoint,
    impl_has_last_modified,
    repository::Entity,
    sla,
};

use super::role::Role;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Roads,
    WaterDrainage,
    Electricity,
    Sanitation,
    StreetLighting,
    PublicSafety,
    Parks,
    Noise,
    Other,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Roads,
        Category::WaterDrainage,
        Category::Electricity,
        Category::Sanitation,
        Category::StreetLighting,
        Category::PublicSafety,
        Category::Parks,
        Category::Noise,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Roads => "roads",
            Category::WaterDrainage => "water-drainage",
            Category::Electricity => "electricity",
            Category::Sanitation => "sanitation",
            Category::StreetLighting => "street-lighting",
            Category::PublicSafety => "public-safety",
            Category::Parks => "parks",
            Category::Noise => "noise",
            Category::Other => "other",
        }
    }

    pub fn subcategories(&self) -> &'static [&'static str] {
        match self {
            Category::Roads => &[
                "pothole",
                "road-damage",
                "road-collapse",
                "blocked-road",
                "missing-signage",
                "broken-footpath",
            ],
            Category::WaterDrainage => &[
                "water-leak",
                "pipe-burst",
                "sewage-overflow",
                "open-manhole",
                "flooding",
                "no-water-supply",
                "blocked-drain",
            ],
            Category::Electricity => &[
                "power-outage",
                "live-wire",
                "transformer-fault",
                "voltage-fluctuation",
            ],
            Category::Sanitation => &[
                "garbage-not-collected",
                "overflowing-bin",
                "illegal-dumping",
                "dead-animal",
                "public-toilet",
            ],
            Category::StreetLighting => &["light-not-working", "light-always-on", "damaged-pole"],
            Category::PublicSafety => &[
                "fire-hazard",
                "gas-leak",
                "fallen-tree",
                "stray-animals",
                "unsafe-structure",
            ],
            Category::Parks => &[
                "damaged-equipment",
                "overgrown-vegetation",
                "park-maintenance",
            ],
            Category::Noise => &["construction-noise", "loudspeaker", "traffic-noise"],
            Category::Other => &["other"],
        }
    }

    pub fn validate_subcategory(&self, subcategory: Option<&str>) -> error::Result<()> {
        match subcategory {
            Some(sub) if !self.subcategories().contains(&sub) => Err(anyhow::anyhow!(
                "subcategory: '{}' is not valid for category '{}'",
                sub,
                self.as_str()
            )
            .code(400)),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Pending,
    Acknowledged,
    Assigned,
    InProgress,
    Resolved,
    Rejected,
    Reopened,
    Escalated,
}

impl Status {
    pub const ALL: [Status; 8] = [
        Status::Pending,
        Status::Acknowledged,
        Status::Assigned,
        Status::InProgress,
        Status::Resolved,
        Status::Rejected,
        Status::Reopened,
        Status::Escalated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Acknowledged => "acknowledged",
            Status::Assigned => "assigned",
            Status::InProgress => "in-progress",
            Status::Resolved => "resolved",
            Status::Rejected => "rejected",
            Status::Reopened => "reopened",
            Status::Escalated => "escalated",
        }
    }

    pub fn is_open(&self) -> bool {
        !self.is_closed()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Status::Resolved | Status::Rejected)
    }

    pub fn open() -> Vec<&'static str> {
        Self::ALL
            .iter()
            .filter(|status| status.is_open())
            .map(Status::as_str)
            .collect()
    }

    /// The single transition table every endpoint goes through.
    pub fn apply(&self, action: &Action) -> Option<Status> {
        match (self, action) {
            (Status::Pending, Action::Acknowledge) => Some(Status::Acknowledged),
            (Status::Pending, Action::Assign) => Some(Status::Assigned),
            (Status::Pending, Action::Reject) => Some(Status::Rejected),
            (Status::Pending, Action::Escalate) => Some(Status::Escalated),

            (Status::Acknowledged, Action::Assign) => Some(Status::Assigned),
            (Status::Acknowledged, Action::Reject) => Some(Status::Rejected),
            (Status::Acknowledged, Action::Escalate) => Some(Status::Escalated),

            (Status::Assigned, Action::Assign) => Some(Status::Assigned),
            (Status::Assigned, Action::Start) => Some(Status::InProgress),
            (Status::Assigned, Action::Reject) => Some(Status::Rejected),
            (Status::Assigned, Action::Escalate) => Some(Status::Escalated),

            (Status::InProgress, Action::Assign) => Some(Status::Assigned),
            (Status::InProgress, Action::Resolve) => Some(Status::Resolved),
            (Status::InProgress, Action::Reject) => Some(Status::Rejected),
            (Status::InProgress, Action::Escalate) => Some(Status::Escalated),

            (Status::Resolved, Action::Reopen) => Some(Status::Reopened),
            (Status::Rejected, Action::Reopen) => Some(Status::Reopened),

            (Status::Reopened, Action::Acknowledge) => Some(Status::Acknowledged),
            (Status::Reopened, Action::Assign) => Some(Status::Assigned),
            (Status::Reopened, Action::Reject) => Some(Status::Rejected),
            (Status::Reopened, Action::Escalate) => Some(Status::Escalated),

            (Status::Escalated, Action::Assign) => Some(Status::Assigned),
            (Status::Escalated, Action::Start) => Some(Status::InProgress),
            (Status::Escalated, Action::Resolve) => Some(Status::Resolved),
            (Status::Escalated, Action::Reject) => Some(Status::Rejected),

            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Acknowledge,
    Assign,
    Start,
    Resolve,
    Reject,
    Reopen,
    Escalate,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Acknowledge => "acknowledge",
            Action::Assign => "assign",
            Action::Start => "start",
            Action::Resolve => "resolve",
            Action::Reject => "reject",
            Action::Reopen => "reopen",
            Action::Escalate => "escalate",
        }
    }

    /// Role half of the lifecycle rules. Ownership (citizens reopening their
    /// own issue, staff acting inside their department) is checked by the
    /// caller against the concrete issue.
    pub fn allowed_for(&self, role: Role) -> bool {
        match role {
            Role::Admin | Role::Municipal => true,
            Role::Department => matches!(self, Action::Start | Action::Resolve),
            Role::Citizen => matches!(self, Action::Reopen),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn bump(&self) -> Priority {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High | Priority::Urgent => Priority::Urgent,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Location {
    pub address: String,
    pub point: GeoPoint,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Comment {
    pub id: ObjectId,
    pub author: ObjectId,
    pub author_role: Role,
    pub text: String,
    pub created_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Sla {
    pub deadline: i64,
    #[serde(default)]
    pub escalation_level: i32,
    #[serde(default)]
    pub escalated_at: Option<i64>,
    #[serde(default)]
    pub breached: bool,
}

impl Sla {
    pub fn new(priority: Priority, created_at: i64) -> Self {
        Self {
            deadline: sla::deadline(priority, created_at),
            escalation_level: 0,
            escalated_at: None,
            breached: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Escalation {
    pub level: i32,
    pub from_priority: Priority,
    pub to_priority: Priority,
    pub escalated_by: Option<ObjectId>,
    pub reason: String,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Feedback {
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Issue {
    pub id: ObjectId,
    pub title: String,
    pub description: String,
    pub category: Category,
    #[serde(default)]
    pub subcategory: Option<String>,
    pub status: Status,
    pub priority: Priority,
    #[serde(default)]
    pub priority_score: i32,
    pub location: Location,
    pub reporter: ObjectId,
    #[serde(default)]
    pub assigned_department: Option<ObjectId>,
    #[serde(default)]
    pub assigned_to: Option<ObjectId>,
    #[serde(default)]
    pub upvotes: Vec<ObjectId>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub images: Vec<String>,
    pub sla: Sla,
    #[serde(default)]
    pub escalation_history: Vec<Escalation>,
    #[serde(default)]
    pub feedback: Option<Feedback>,
    pub created_at: i64,
    #[serde(default)]
    pub status_changed_at: i64,
    #[serde(default)]
    pub resolved_at: Option<i64>,
    #[serde(default = "default_timestamp")]
    pub last_modified: i64,
}

impl_has_last_modified!(Issue);

impl Entity for Issue {
    fn id(&self) -> ObjectId {
        self.id
    }
}

impl Issue {
    /// Timestamp for the next state history row: never earlier than the
    /// previous one, so rows of one issue stay strictly ordered.
    pub fn next_transition_time(&self, now: i64) -> i64 {
        now.max(self.status_changed_at + 1)
    }

    pub fn hours_to_resolve(&self) -> Option<f64> {
        self.resolved_at.map(|resolved| {
            (resolved - self.created_at) as f64 / crate::constants::MICROS_PER_HOUR as f64
        })
    }

    /// Bumps priority and escalation level and restarts the SLA clock.
    pub fn escalate(&mut self, by: Option<ObjectId>, reason: String, now: i64) -> Escalation {
        let from_priority = self.priority;
        let to_priority = from_priority.bump();
        let level = sla::next_escalation_level(self.sla.escalation_level);

        self.priority = to_priority;
        self.sla.breached |= now > self.sla.deadline;
        self.sla.escalation_level = level;
        self.sla.escalated_at = Some(now);
        self.sla.deadline = sla::deadline(to_priority, now);

        let escalation = Escalation {
            level,
            from_priority,
            to_priority,
            escalated_by: by,
            reason,
            timestamp: now,
        };
        self.escalation_history.push(escalation.clone());
        escalation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_serde() {
        for status in Status::ALL {
            assert_eq!(
                serde_json::to_string(&status).unwrap(),
                format!("\"{}\"", status.as_str())
            );
        }
        for category in Category::ALL {
            assert_eq!(
                serde_json::to_string(&category).unwrap(),
                format!("\"{}\"", category.as_str())
            );
        }
        for priority in Priority::ALL {
            assert_eq!(
                serde_json::to_string(&priority).unwrap(),
                format!("\"{}\"", priority.as_str())
            );
        }
    }

    #[test]
    fn staff_workflow_follows_the_table() {
        let status = Status::Pending;
        let status = status.apply(&Action::Acknowledge).unwrap();
        let status = status.apply(&Action::Assign).unwrap();
        assert_eq!(status, Status::Assigned);
        assert_eq!(status.apply(&Action::Resolve), None);
        let status = status.apply(&Action::Start).unwrap();
        assert_eq!(status, Status::InProgress);
        let status = status.apply(&Action::Resolve).unwrap();
        assert_eq!(status, Status::Resolved);
        assert_eq!(status.apply(&Action::Escalate), None);
        assert_eq!(status.apply(&Action::Reopen), Some(Status::Reopened));
    }

    #[test]
    fn closed_issues_only_reopen() {
        let actions = [
            Action::Acknowledge,
            Action::Assign,
            Action::Start,
            Action::Resolve,
            Action::Reject,
            Action::Escalate,
        ];
        for status in [Status::Resolved, Status::Rejected] {
            for action in actions {
                assert_eq!(status.apply(&action), None, "{:?} {:?}", status, action);
            }
        }
    }

    #[test]
    fn role_table() {
        assert!(Action::Start.allowed_for(Role::Department));
        assert!(Action::Resolve.allowed_for(Role::Department));
        assert!(!Action::Assign.allowed_for(Role::Department));
        assert!(!Action::Reject.allowed_for(Role::Department));
        assert!(Action::Reopen.allowed_for(Role::Citizen));
        assert!(!Action::Resolve.allowed_for(Role::Citizen));
        assert!(Action::Reject.allowed_for(Role::Municipal));
    }

    #[test]
    fn open_statuses() {
        let open = Status::open();
        assert_eq!(open.len(), 6);
        assert!(!open.contains(&"resolved"));
        assert!(!open.contains(&"rejected"));
    }

    #[test]
    fn subcategories_are_checked_against_category() {
        assert!(Category::WaterDrainage.validate_subcategory(Some("pipe-burst")).is_ok());
        assert!(Category::WaterDrainage.validate_subcategory(None).is_ok());
        assert!(Category::Roads.validate_subcategory(Some("pipe-burst")).is_err());
    }

    #[test]
    fn escalation_bumps_priority_and_restarts_clock() {
        let created = 1_000_000_000_000;
        let mut issue = Issue {
            id: ObjectId::new(),
            title: "Broken light".to_string(),
            description: "Street light broken for a week".to_string(),
            category: Category::StreetLighting,
            subcategory: None,
            status: Status::Assigned,
            priority: Priority::Medium,
            priority_score: 50,
            location: Location {
                address: "1 Main St, Springfield".to_string(),
                point: GeoPoint::zeroed(),
            },
            reporter: ObjectId::new(),
            assigned_department: None,
            assigned_to: None,
            upvotes: vec![],
            comments: vec![],
            images: vec![],
            sla: Sla::new(Priority::Medium, created),
            escalation_history: vec![],
            feedback: None,
            created_at: created,
            status_changed_at: created,
            resolved_at: None,
            last_modified: created,
        };

        let now = created + 80 * crate::constants::MICROS_PER_HOUR;
        let escalation = issue.escalate(None, "SLA breached".to_string(), now);

        assert_eq!(escalation.from_priority, Priority::Medium);
        assert_eq!(issue.priority, Priority::High);
        assert_eq!(issue.sla.escalation_level, 1);
        assert!(issue.sla.breached);
        assert_eq!(issue.sla.deadline, now + 48 * crate::constants::MICROS_PER_HOUR);
        assert_eq!(issue.escalation_history.len(), 1);

        for _ in 0..5 {
            issue.escalate(None, "again".to_string(), now);
        }
        assert_eq!(issue.sla.escalation_level, sla::MAX_ESCALATION_LEVEL);
        assert_eq!(issue.priority, Priority::Urgent);
    }
}
