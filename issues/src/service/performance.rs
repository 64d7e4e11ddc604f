use mongodb::bson::{doc, oid::ObjectId, Bson};
use serde::{de::DeserializeOwned, Serialize};

use common::{
    access_rules::{AccessRules, ReadPerformance},
    auth::Auth,
    context::Context,
    entities::{
        issue::Issue,
        performance::{
            hours_between, DepartmentPerformance, PublicDepartmentPerformance,
            PublicStaffPerformance, StaffPerformance,
        },
    },
    error::{self, AddCode},
    repository::RepositoryObject,
    sla,
    visibility::Visibility,
};

const UPDATE_ATTEMPTS: usize = 3;

/// Applies `change` to the counters stored under `id`, creating them on first use.
async fn upsert<T>(
    repo: &RepositoryObject<T>,
    id: ObjectId,
    init: impl Fn() -> T,
    change: impl Fn(&mut T),
) -> error::Result<()>
where
    T: Serialize + DeserializeOwned,
{
    for _ in 0..UPDATE_ATTEMPTS {
        let Some(mut current) = repo.find("id", &Bson::ObjectId(id)).await? else {
            let mut fresh = init();
            change(&mut fresh);
            if repo.insert(&fresh).await? {
                return Ok(());
            }
            continue;
        };

        change(&mut current);
        match repo.update_one(doc! {"id": id}, &current).await {
            Ok(_) => return Ok(()),
            Err(err) if err.code == 409 => continue,
            Err(err) => return Err(err),
        }
    }
    Err(anyhow::anyhow!("Counters {} kept changing, giving up", id).code(409))
}

pub async fn record_resolution(context: &Context, issue: &Issue, resolved_at: i64) {
    let hours = hours_between(issue.created_at, resolved_at);
    let within_sla = sla::resolved_within_sla(issue, resolved_at);

    if let Err(err) = update_resolution(context, issue, hours, within_sla, resolved_at).await {
        log::error!("Failed to record resolution of {}: {}", issue.id, err);
    }
}

async fn update_resolution(
    context: &Context,
    issue: &Issue,
    hours: f64,
    within_sla: bool,
    resolved_at: i64,
) -> error::Result<()> {
    if let Some(department) = issue.assigned_department {
        let departments = context.try_get_repository::<DepartmentPerformance>()?;
        upsert(
            &departments,
            department,
            || DepartmentPerformance::new(department),
            |counters| counters.record_resolution(hours, within_sla),
        )
        .await?;
    }

    if let Some(staff) = issue.assigned_to {
        let staff_repo = context.try_get_repository::<StaffPerformance>()?;
        upsert(
            &staff_repo,
            staff,
            || StaffPerformance::new(staff, issue.assigned_department),
            |counters| counters.record_resolution(hours, within_sla, resolved_at),
        )
        .await?;
    }
    Ok(())
}

/// Counts the escalation against the department and penalizes the assignee.
pub async fn record_escalation(context: &Context, issue: &Issue) {
    if let Err(err) = update_escalation(context, issue).await {
        log::error!("Failed to record escalation of {}: {}", issue.id, err);
    }
}

async fn update_escalation(context: &Context, issue: &Issue) -> error::Result<()> {
    if let Some(department) = issue.assigned_department {
        let departments = context.try_get_repository::<DepartmentPerformance>()?;
        upsert(
            &departments,
            department,
            || DepartmentPerformance::new(department),
            |counters| counters.escalated += 1,
        )
        .await?;
    }

    if let Some(staff) = issue.assigned_to {
        let staff_repo = context.try_get_repository::<StaffPerformance>()?;
        upsert(
            &staff_repo,
            staff,
            || StaffPerformance::new(staff, issue.assigned_department),
            |counters| counters.penalties += 1,
        )
        .await?;
    }
    Ok(())
}

pub struct PerformanceService {
    context: Context,
}

impl PerformanceService {
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    pub async fn departments(&self) -> error::Result<Vec<PublicDepartmentPerformance>> {
        let auth = self.context.auth();
        let departments = self.context.try_get_repository::<DepartmentPerformance>()?;

        let filter = match auth {
            Auth::Department(_, department) => doc! {"id": department},
            _ if auth.full_access() => doc! {},
            _ => return Err(auth.forbidden("Performance is only visible to staff")),
        };

        Ok(departments
            .find_by_filter(filter, Some(doc! {"resolved": -1}), 0, 0)
            .await?
            .into_iter()
            .map(PublicDepartmentPerformance::from)
            .collect())
    }

    pub async fn staff(&self, department: ObjectId) -> error::Result<Vec<PublicStaffPerformance>> {
        let auth = self.context.auth();
        if !ReadPerformance.get_access(&auth, &department) {
            return Err(auth.forbidden("Performance of this department is not available"));
        }

        let staff = self.context.try_get_repository::<StaffPerformance>()?;
        Ok(staff
            .find_by_filter(
                doc! {"department_id": department},
                Some(doc! {"resolved": -1}),
                0,
                0,
            )
            .await?
            .into_iter()
            .map(|counters| {
                let visibility = Visibility::for_viewer(&auth, Some(&counters.id));
                visibility.project_staff(counters.into())
            })
            .collect())
    }
}
