use mongodb::bson::{doc, oid::ObjectId, Bson};
use serde::{Deserialize, Serialize};

use common::{
    access_rules::{AccessRules, Administer, Transition},
    auth::Auth,
    context::Context,
    default_timestamp,
    entities::{
        department::Department,
        history::StateHistory,
        issue::{Action, Issue, Status},
        role::Role,
        user::User,
    },
    error::{self, AddCode},
    sla,
    visibility::PublicIssue,
};

use super::{
    issue::{history_row, load_issue, project_for_caller},
    notification, performance,
};

const SWEEP_REASON: &str = "SLA deadline passed";

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusChange {
    pub action: Action,
    pub comment: Option<String>,
    pub department: Option<String>,
    pub assignee: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EscalationRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SweepResult {
    pub checked: usize,
    pub escalated: Vec<String>,
    pub failed: usize,
}

pub struct LifecycleService {
    context: Context,
}

impl LifecycleService {
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    pub async fn change_status(
        &self,
        id: ObjectId,
        change: StatusChange,
    ) -> error::Result<PublicIssue> {
        let issue = load_issue(&self.context, id).await?;
        let issue = self.apply(issue, change, self.context.auth()).await?;
        project_for_caller(&self.context, issue).await
    }

    pub async fn escalate(
        &self,
        id: ObjectId,
        request: EscalationRequest,
    ) -> error::Result<PublicIssue> {
        let change = StatusChange {
            action: Action::Escalate,
            comment: request.reason,
            department: None,
            assignee: None,
        };
        self.change_status(id, change).await
    }

    /// Escalates every open issue whose deadline has passed and which is not
    /// escalated already. One failing issue does not stop the rest.
    pub async fn sweep(&self) -> error::Result<SweepResult> {
        let auth = self.context.auth();
        if !Administer.get_access(&auth, ()) {
            return Err(auth.forbidden("Only administrators can run the escalation sweep"));
        }

        let issues = self.context.try_get_repository::<Issue>()?;
        let candidates: Vec<&str> = Status::ALL
            .iter()
            .filter(|status| status.is_open() && **status != Status::Escalated)
            .map(Status::as_str)
            .collect();

        let overdue = issues
            .find_by_filter(
                doc! {
                    "status": {"$in": candidates},
                    "sla.deadline": {"$lt": default_timestamp()},
                },
                Some(doc! {"sla.deadline": 1}),
                0,
                0,
            )
            .await?;

        let checked = overdue.len();
        let mut escalated = Vec::new();
        let mut failed = 0;

        for issue in overdue {
            let id = issue.id;
            let change = StatusChange {
                action: Action::Escalate,
                comment: Some(SWEEP_REASON.to_string()),
                department: None,
                assignee: None,
            };
            match self.apply(issue, change, self.context.server_auth()).await {
                Ok(issue) => escalated.push(issue.id.to_hex()),
                Err(err) => {
                    log::warn!("Failed to escalate overdue issue {}: {}", id, err);
                    failed += 1;
                }
            }
        }

        log::info!(
            "Escalation sweep: {} overdue, {} escalated, {} failed",
            checked,
            escalated.len(),
            failed
        );
        Ok(SweepResult {
            checked,
            escalated,
            failed,
        })
    }

    async fn apply(
        &self,
        mut issue: Issue,
        change: StatusChange,
        auth: Auth,
    ) -> error::Result<Issue> {
        let action = change.action;
        if !Transition(action).get_access(&auth, &issue) {
            return Err(auth.forbidden(&format!(
                "You are not allowed to {} this issue",
                action.as_str()
            )));
        }

        let Some(next) = issue.status.apply(&action) else {
            return Err(anyhow::anyhow!(
                "Cannot {} an issue that is {}",
                action.as_str(),
                issue.status.as_str()
            )
            .code(400));
        };

        let comment = change
            .comment
            .map(|comment| comment.trim().to_string())
            .filter(|comment| !comment.is_empty());
        if action == Action::Reject && comment.is_none() {
            return Err(anyhow::anyhow!("comment: a reason is required when rejecting").code(400));
        }

        let issues = self.context.try_get_repository::<Issue>()?;
        let history = self.context.try_get_repository::<StateHistory>()?;

        let now = default_timestamp();
        let from = issue.status;

        match action {
            Action::Assign => {
                let Some(department) = change.department else {
                    return Err(anyhow::anyhow!("department: required when assigning").code(400));
                };
                let department = self.active_department(department.parse()?).await?;
                let assignee = match change.assignee {
                    Some(assignee) => Some(self.staff_member(assignee.parse()?, department).await?),
                    None => None,
                };
                issue.assigned_department = Some(department);
                issue.assigned_to = assignee;
            }
            Action::Start | Action::Resolve => {
                if let (Auth::Department(user, _), None) = (auth, issue.assigned_to) {
                    issue.assigned_to = Some(user);
                }
                if action == Action::Resolve {
                    issue.resolved_at = Some(now);
                }
            }
            Action::Reopen => {
                issue.resolved_at = None;
                issue.sla.deadline = sla::deadline(issue.priority, now);
                issue.sla.breached = false;
            }
            Action::Escalate => {
                let reason = comment
                    .clone()
                    .unwrap_or_else(|| "Escalated manually".to_string());
                issue.escalate(auth.id().copied(), reason, now);
            }
            Action::Acknowledge | Action::Reject => {}
        }

        issue.status = next;
        issue.status_changed_at = issue.next_transition_time(now);

        let issue = issues.update_one(doc! {"id": issue.id}, &issue).await?;
        let row = history_row(&issue, Some(from), Some(action), &auth, comment.clone());
        if let Err(err) = history.insert(&row).await {
            log::error!(
                "Issue {} moved to {} without a history row: {}",
                issue.id,
                issue.status.as_str(),
                err
            );
            return Err(err);
        }

        log::info!(
            "Issue {}: {} -> {} ({})",
            issue.id,
            from.as_str(),
            issue.status.as_str(),
            action.as_str()
        );

        match action {
            Action::Resolve => performance::record_resolution(&self.context, &issue, now).await,
            Action::Escalate => performance::record_escalation(&self.context, &issue).await,
            _ => {}
        }

        notification::status_changed(&self.context, &issue, comment.as_deref()).await;
        if action == Action::Assign {
            notification::department_assigned(&self.context, &issue).await;
        }

        Ok(issue)
    }

    async fn active_department(&self, id: ObjectId) -> error::Result<ObjectId> {
        let departments = self.context.try_get_repository::<Department>()?;
        match departments.find("id", &Bson::ObjectId(id)).await? {
            Some(department) if department.is_active => Ok(department.id),
            Some(_) => Err(anyhow::anyhow!("department: is not active").code(400)),
            None => Err(anyhow::anyhow!("department: not found").code(400)),
        }
    }

    async fn staff_member(&self, id: ObjectId, department: ObjectId) -> error::Result<ObjectId> {
        let users = self.context.try_get_repository::<User>()?;
        let Some(user) = users.find("id", &Bson::ObjectId(id)).await? else {
            return Err(anyhow::anyhow!("assignee: not found").code(400));
        };

        if user.role != Role::Department || user.department != Some(department) || !user.is_active {
            return Err(
                anyhow::anyhow!("assignee: must be active staff of the department").code(400),
            );
        }
        Ok(user.id)
    }
}
