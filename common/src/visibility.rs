use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::{
    auth::Auth,
    constants::ANONYMOUS_NAME,
    entities::{
        issue::{Category, Comment, Escalation, Feedback, Issue, Location, Priority, Status},
        performance::PublicStaffPerformance,
        role::Role,
        user::{PublicUser, User},
    },
    geo::GeoPoint,
    sla::{sla_status, SlaStatus},
};

const REDACTED: &str = "[redacted]";

/// What a viewer may see of a record they request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Visibility {
    Full { viewer: Option<ObjectId> },
    Redacted { viewer: Option<ObjectId> },
}

impl Visibility {
    /// Management, services and the record's owner see everything.
    pub fn for_viewer(auth: &Auth, owner: Option<&ObjectId>) -> Self {
        let viewer = auth.id().copied();
        if auth.full_access() || (viewer.is_some() && viewer.as_ref() == owner) {
            Visibility::Full { viewer }
        } else {
            Visibility::Redacted { viewer }
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Visibility::Full { .. })
    }

    pub fn viewer(&self) -> Option<&ObjectId> {
        match self {
            Visibility::Full { viewer } | Visibility::Redacted { viewer } => viewer.as_ref(),
        }
    }

    pub fn project_issue(&self, issue: Issue, reporter: Option<&User>, now: i64) -> PublicIssue {
        let sla = sla_status(&issue, now);
        let upvoted = self
            .viewer()
            .map_or(false, |viewer| issue.upvotes.contains(viewer));

        let mut reporter = PublicReporter {
            id: Some(issue.reporter.to_hex()),
            name: reporter.map(|user| user.name.clone()),
            email: reporter.map(|user| user.email.clone()),
            phone: reporter.and_then(|user| user.phone.clone()),
        };

        let mut public = PublicIssue {
            id: issue.id.to_hex(),
            title: issue.title,
            description: issue.description,
            category: issue.category,
            subcategory: issue.subcategory,
            status: issue.status,
            priority: issue.priority,
            priority_score: issue.priority_score,
            location: issue.location,
            reporter: None,
            assigned_department: issue.assigned_department.map(|id| id.to_hex()),
            assigned_to: issue.assigned_to.map(|id| id.to_hex()),
            upvotes: issue.upvotes.len(),
            upvoted,
            comments: issue.comments,
            images: issue.images,
            sla,
            escalation_history: Some(issue.escalation_history),
            feedback: issue.feedback,
            created_at: issue.created_at,
            status_changed_at: issue.status_changed_at,
            resolved_at: issue.resolved_at,
            last_modified: issue.last_modified,
        };

        if let Visibility::Redacted { viewer } = self {
            reporter.id = None;
            reporter.name = Some(ANONYMOUS_NAME.to_string());
            reporter.email = reporter.email.as_deref().map(mask_email);
            reporter.phone = reporter.phone.as_deref().map(mask_phone);

            public.location = Location {
                address: truncate_address(&public.location.address),
                point: GeoPoint::zeroed(),
            };
            public.assigned_to = None;
            public
                .comments
                .retain(|comment| Some(comment.author) == *viewer);
            public.escalation_history = None;
        }

        public.reporter = Some(reporter);
        public
    }

    pub fn project_user(&self, user: User) -> PublicUser {
        let mut public = PublicUser::from(user);
        if !self.is_full() {
            if public.role == Role::Citizen {
                public.name = ANONYMOUS_NAME.to_string();
            }
            public.email = public.email.as_deref().map(mask_email);
            public.phone = public.phone.as_deref().map(mask_phone);
        }
        public
    }

    pub fn project_staff(&self, mut staff: PublicStaffPerformance) -> PublicStaffPerformance {
        if !self.is_full() {
            staff.penalties = None;
        }
        staff
    }
}

/// `asha@example.com` becomes `a***@example.com`.
pub fn mask_email(email: &str) -> String {
    let masked = match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let first: String = local.chars().take(1).collect();
            format!("{}***@{}", first, domain)
        }
        _ => REDACTED.to_string(),
    };
    never_original(masked, email)
}

/// Keeps the last four digits: `+91 98450 12345` becomes `********2345`.
pub fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
    let masked = if digits.len() <= 4 {
        "*".repeat(digits.len().max(4))
    } else {
        let hidden = digits.len() - 4;
        "*".repeat(hidden) + &digits[hidden..].iter().collect::<String>()
    };
    never_original(masked, phone)
}

fn never_original(masked: String, original: &str) -> String {
    if masked == original {
        REDACTED.to_string()
    } else {
        masked
    }
}

/// First two comma separated parts of an address.
pub fn truncate_address(address: &str) -> String {
    address
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .take(2)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicReporter {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicIssue {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub subcategory: Option<String>,
    pub status: Status,
    pub priority: Priority,
    pub priority_score: i32,
    pub location: Location,
    pub reporter: Option<PublicReporter>,
    pub assigned_department: Option<String>,
    pub assigned_to: Option<String>,
    pub upvotes: usize,
    #[serde(default)]
    pub upvoted: bool,
    pub comments: Vec<Comment>,
    pub images: Vec<String>,
    pub sla: SlaStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_history: Option<Vec<Escalation>>,
    pub feedback: Option<Feedback>,
    pub created_at: i64,
    pub status_changed_at: i64,
    pub resolved_at: Option<i64>,
    pub last_modified: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::issue::Sla;

    fn user(role: Role) -> User {
        User {
            id: ObjectId::new(),
            name: "Ravi Kumar".to_string(),
            email: "ravi.kumar@example.com".to_string(),
            password: String::new(),
            salt: String::new(),
            phone: Some("+91 98450 12345".to_string()),
            role,
            department: None,
            is_active: true,
            created_at: 0,
            last_modified: 0,
        }
    }

    fn issue(reporter: &User) -> Issue {
        let comment = |author: ObjectId| Comment {
            id: ObjectId::new(),
            author,
            author_role: Role::Citizen,
            text: "Still broken".to_string(),
            created_at: 0,
        };
        Issue {
            id: ObjectId::new(),
            title: "Broken street light".to_string(),
            description: "Dark stretch at night".to_string(),
            category: Category::StreetLighting,
            subcategory: None,
            status: Status::Assigned,
            priority: Priority::Medium,
            priority_score: 60,
            location: Location {
                address: "12 MG Road, Indiranagar, Bengaluru, 560038".to_string(),
                point: GeoPoint::new(12.97, 77.64).unwrap(),
            },
            reporter: reporter.id,
            assigned_department: Some(ObjectId::new()),
            assigned_to: Some(ObjectId::new()),
            upvotes: vec![],
            comments: vec![comment(reporter.id), comment(ObjectId::new())],
            images: vec![],
            sla: Sla::new(Priority::Medium, 0),
            escalation_history: vec![Escalation {
                level: 1,
                from_priority: Priority::Low,
                to_priority: Priority::Medium,
                escalated_by: None,
                reason: "SLA breached".to_string(),
                timestamp: 0,
            }],
            feedback: None,
            created_at: 0,
            status_changed_at: 0,
            resolved_at: None,
            last_modified: 0,
        }
    }

    #[test]
    fn owner_and_management_see_everything() {
        let reporter = user(Role::Citizen);
        let issue = issue(&reporter);

        for auth in [
            Auth::Citizen(reporter.id),
            Auth::Admin(ObjectId::new()),
            Auth::Municipal(ObjectId::new()),
        ] {
            let view = Visibility::for_viewer(&auth, Some(&issue.reporter));
            assert!(view.is_full());
            let public = view.project_issue(issue.clone(), Some(&reporter), 0);
            assert_eq!(public.reporter.unwrap().email.unwrap(), reporter.email);
            assert_eq!(public.comments.len(), 2);
            assert_eq!(public.location.point, issue.location.point);
            assert!(public.assigned_to.is_some());
        }
    }

    #[test]
    fn other_citizens_get_redacted_view() {
        let reporter = user(Role::Citizen);
        let issue = issue(&reporter);
        let stranger = ObjectId::new();

        let view = Visibility::for_viewer(&Auth::Citizen(stranger), Some(&issue.reporter));
        let public = view.project_issue(issue, Some(&reporter), 0);

        let shown = public.reporter.unwrap();
        assert_eq!(shown.id, None);
        assert_eq!(shown.name.as_deref(), Some(ANONYMOUS_NAME));
        assert_ne!(shown.email.as_deref(), Some(reporter.email.as_str()));
        assert_ne!(shown.phone, reporter.phone);
        assert_eq!(public.location.point.coordinates, [0.0, 0.0]);
        assert_eq!(public.location.address, "12 MG Road, Indiranagar");
        assert_eq!(public.assigned_to, None);
        assert!(public.comments.is_empty());
        assert_eq!(public.escalation_history, None);
    }

    #[test]
    fn upvoted_is_reported_for_every_viewer() {
        let reporter = user(Role::Citizen);
        let mut issue = issue(&reporter);
        let admin = ObjectId::new();
        let citizen = ObjectId::new();
        issue.upvotes = vec![admin, citizen];

        for auth in [Auth::Admin(admin), Auth::Citizen(citizen)] {
            let view = Visibility::for_viewer(&auth, Some(&issue.reporter));
            assert!(view.project_issue(issue.clone(), Some(&reporter), 0).upvoted);
        }
        let view = Visibility::for_viewer(&Auth::Municipal(ObjectId::new()), Some(&issue.reporter));
        assert!(!view.project_issue(issue, Some(&reporter), 0).upvoted);
    }

    #[test]
    fn department_staff_count_as_others() {
        let reporter = user(Role::Citizen);
        let issue = issue(&reporter);
        let auth = Auth::Department(ObjectId::new(), ObjectId::new());
        assert!(!Visibility::for_viewer(&auth, Some(&issue.reporter)).is_full());
        assert!(!Visibility::for_viewer(&Auth::None, Some(&issue.reporter)).is_full());
    }

    #[test]
    fn missing_reporter_stays_absent() {
        let reporter = user(Role::Citizen);
        let issue = issue(&reporter);
        let public = Visibility::Redacted { viewer: None }.project_issue(issue, None, 0);
        let shown = public.reporter.unwrap();
        assert_eq!(shown.email, None);
        assert_eq!(shown.phone, None);
    }

    #[test]
    fn masks_never_equal_the_original() {
        assert_eq!(mask_email("ravi.kumar@example.com"), "r***@example.com");
        assert_eq!(mask_email("a***@x.io"), REDACTED);
        assert_eq!(mask_email("no-at-sign"), REDACTED);
        assert_eq!(mask_phone("+91 98450 12345"), "********2345");
        assert_eq!(mask_phone("123"), "****");
        assert_eq!(mask_phone("****"), REDACTED);
    }

    #[test]
    fn users_are_masked_too() {
        let citizen = user(Role::Citizen);
        let public = Visibility::Redacted { viewer: None }.project_user(citizen.clone());
        assert_eq!(public.name, ANONYMOUS_NAME);
        assert_ne!(public.email.as_deref(), Some(citizen.email.as_str()));

        let staff = user(Role::Department);
        let public = Visibility::Redacted { viewer: None }.project_user(staff.clone());
        assert_eq!(public.name, staff.name);
    }

    #[test]
    fn address_truncation() {
        assert_eq!(truncate_address("A, B, C"), "A, B");
        assert_eq!(truncate_address("Single"), "Single");
        assert_eq!(truncate_address(""), "");
    }
}
