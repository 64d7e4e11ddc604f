use mongodb::bson::oid::ObjectId;

use crate::{
    auth::Auth,
    entities::{
        issue::{Action, Issue, Status},
        role::Role,
        user::User,
    },
};

pub trait AccessRules<Object, Subject> {
    fn get_access(&self, object: Object, subject: Subject) -> bool;
}

pub struct Edit;

pub struct Delete;

/// Applying a lifecycle action to a concrete issue.
pub struct Transition(pub Action);

impl<'a, 'b> AccessRules<&'a Auth, &'b User> for Edit {
    fn get_access(&self, auth: &'a Auth, user: &'b User) -> bool {
        match auth {
            Auth::Service(_, _) | Auth::Admin(_) => true,
            _ => auth.id() == Some(&user.id),
        }
    }
}

impl<'a, 'b> AccessRules<&'a Auth, &'b Issue> for Edit {
    fn get_access(&self, auth: &'a Auth, issue: &'b Issue) -> bool {
        match auth {
            Auth::Service(_, _) | Auth::Admin(_) | Auth::Municipal(_) => true,
            Auth::Citizen(id) => id == &issue.reporter && issue.status == Status::Pending,
            Auth::Department(_, _) | Auth::None => false,
        }
    }
}

impl<'a, 'b> AccessRules<&'a Auth, &'b Issue> for Delete {
    fn get_access(&self, auth: &'a Auth, _issue: &'b Issue) -> bool {
        auth.is_admin()
    }
}

impl<'a, 'b> AccessRules<&'a Auth, &'b Issue> for Transition {
    fn get_access(&self, auth: &'a Auth, issue: &'b Issue) -> bool {
        let Transition(action) = self;
        match auth {
            Auth::Service(_, _) => action == &Action::Escalate,
            Auth::Admin(_) | Auth::Municipal(_) => true,
            Auth::Department(_, department) => {
                action.allowed_for(Role::Department)
                    && issue.assigned_department.as_ref() == Some(department)
            }
            Auth::Citizen(id) => action.allowed_for(Role::Citizen) && id == &issue.reporter,
            Auth::None => false,
        }
    }
}

/// Counters of one department.
pub struct ReadPerformance;

impl<'a, 'b> AccessRules<&'a Auth, &'b ObjectId> for ReadPerformance {
    fn get_access(&self, auth: &'a Auth, department: &'b ObjectId) -> bool {
        auth.full_access() || auth.department() == Some(department)
    }
}

pub struct Administer;

impl<'a> AccessRules<&'a Auth, ()> for Administer {
    fn get_access(&self, auth: &'a Auth, _: ()) -> bool {
        auth.is_admin()
    }
}

pub struct SendMail;

impl<'a> AccessRules<&'a Auth, ()> for SendMail {
    fn get_access(&self, auth: &'a Auth, _: ()) -> bool {
        matches!(auth, Auth::Service(_, _) | Auth::Admin(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::Service,
        entities::issue::{Category, Location, Priority, Sla},
        geo::GeoPoint,
    };

    fn issue(reporter: ObjectId, department: Option<ObjectId>) -> Issue {
        Issue {
            id: ObjectId::new(),
            title: "Overflowing bin".to_string(),
            description: "Bin not emptied for days".to_string(),
            category: Category::Sanitation,
            subcategory: None,
            status: Status::Pending,
            priority: Priority::Medium,
            priority_score: 60,
            location: Location {
                address: "Market Road".to_string(),
                point: GeoPoint::zeroed(),
            },
            reporter,
            assigned_department: department,
            assigned_to: None,
            upvotes: vec![],
            comments: vec![],
            images: vec![],
            sla: Sla::new(Priority::Medium, 0),
            escalation_history: vec![],
            feedback: None,
            created_at: 0,
            status_changed_at: 0,
            resolved_at: None,
            last_modified: 0,
        }
    }

    #[test]
    fn staff_only_act_inside_their_department() {
        let department = ObjectId::new();
        let issue = issue(ObjectId::new(), Some(department));

        let own = Auth::Department(ObjectId::new(), department);
        let other = Auth::Department(ObjectId::new(), ObjectId::new());

        assert!(Transition(Action::Resolve).get_access(&own, &issue));
        assert!(!Transition(Action::Resolve).get_access(&other, &issue));
        assert!(!Transition(Action::Reject).get_access(&own, &issue));
    }

    #[test]
    fn citizens_only_reopen_their_own() {
        let reporter = ObjectId::new();
        let issue = issue(reporter, None);

        assert!(Transition(Action::Reopen).get_access(&Auth::Citizen(reporter), &issue));
        assert!(!Transition(Action::Reopen).get_access(&Auth::Citizen(ObjectId::new()), &issue));
        assert!(!Transition(Action::Resolve).get_access(&Auth::Citizen(reporter), &issue));
    }

    #[test]
    fn services_may_only_escalate() {
        let issue = issue(ObjectId::new(), None);
        let service = Auth::Service(Service::Issues, false);
        assert!(Transition(Action::Escalate).get_access(&service, &issue));
        assert!(!Transition(Action::Resolve).get_access(&service, &issue));
    }

    #[test]
    fn owners_edit_only_pending_issues() {
        let reporter = ObjectId::new();
        let mut issue = issue(reporter, None);
        assert!(Edit.get_access(&Auth::Citizen(reporter), &issue));
        issue.status = Status::Acknowledged;
        assert!(!Edit.get_access(&Auth::Citizen(reporter), &issue));
        assert!(Edit.get_access(&Auth::Municipal(ObjectId::new()), &issue));
    }

    #[test]
    fn performance_is_scoped_to_department() {
        let department = ObjectId::new();
        assert!(ReadPerformance.get_access(&Auth::Municipal(ObjectId::new()), &department));
        let colleague = Auth::Department(ObjectId::new(), department);
        let outsider = Auth::Department(ObjectId::new(), ObjectId::new());
        assert!(ReadPerformance.get_access(&colleague, &department));
        assert!(!ReadPerformance.get_access(&outsider, &department));
        assert!(!ReadPerformance.get_access(&Auth::Citizen(ObjectId::new()), &department));
    }
}
