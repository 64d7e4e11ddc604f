use std::collections::HashMap;

use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use serde::{Deserialize, Serialize};

use common::{
    access_rules::{AccessRules, Delete, Edit},
    api::pagination::{Paginated, PaginationParams},
    auth::Auth,
    constants::{DUPLICATE_LIMIT, DUPLICATE_RADIUS_METERS, DUPLICATE_WINDOW_DAYS, MICROS_PER_HOUR},
    context::Context,
    default_timestamp,
    entities::{
        history::{PublicStateHistory, StateHistory},
        issue::{Action, Category, Comment, Feedback, Issue, Location, Priority, Sla, Status},
        user::User,
    },
    error::{self, AddCode},
    geo::GeoPoint,
    priority::{score_priority, PriorityScore, ScoreInput},
    rate_limit::{self, RateBucket, TokenBucket},
    sla,
    visibility::{PublicIssue, Visibility},
};

use super::notification;

const MAX_IMAGES: usize = 5;

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateIssue {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub subcategory: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub address: String,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IssueChange {
    pub title: Option<String>,
    pub description: Option<String>,
    pub subcategory: Option<String>,
    pub address: Option<String>,
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IssueFilter {
    pub status: Option<Status>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub department: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DuplicateQuery {
    pub category: Category,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicateCandidate {
    pub id: String,
    pub title: String,
    pub status: Status,
    pub priority: Priority,
    pub upvotes: usize,
    pub created_at: i64,
    pub distance_meters: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedIssue {
    pub issue: PublicIssue,
    pub scoring: PriorityScore,
    pub possible_duplicates: Vec<DuplicateCandidate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateComment {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpvoteResult {
    pub upvotes: usize,
    pub upvoted: bool,
    pub priority: Priority,
    pub priority_score: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateFeedback {
    pub rating: i32,
    pub comment: Option<String>,
}

fn text(field: &str, value: &str, min: usize, max: usize) -> error::Result<String> {
    let value = value.trim();
    let length = value.chars().count();
    if !(min..=max).contains(&length) {
        return Err(anyhow::anyhow!(
            "{}: must be between {} and {} characters",
            field,
            min,
            max
        )
        .code(400));
    }
    Ok(value.to_string())
}

fn check_images(images: &[String]) -> error::Result<()> {
    if images.len() > MAX_IMAGES {
        return Err(anyhow::anyhow!("images: at most {} images are allowed", MAX_IMAGES).code(400));
    }
    Ok(())
}

pub fn score(issue: &Issue) -> PriorityScore {
    score_priority(&ScoreInput {
        title: &issue.title,
        description: &issue.description,
        category: issue.category,
        subcategory: issue.subcategory.as_deref(),
        upvotes: issue.upvotes.len(),
    })
}

pub async fn load_issue(context: &Context, id: ObjectId) -> error::Result<Issue> {
    let issues = context.try_get_repository::<Issue>()?;
    issues
        .find("id", &Bson::ObjectId(id))
        .await?
        .ok_or_else(|| anyhow::anyhow!("No issue found").code(404))
}

/// Reporters of `issues`, keyed by user id.
pub async fn load_reporters(
    context: &Context,
    issues: &[Issue],
) -> error::Result<HashMap<ObjectId, User>> {
    let users = context.try_get_repository::<User>()?;
    let ids: Vec<Bson> = issues.iter().map(|issue| Bson::ObjectId(issue.reporter)).collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    Ok(users
        .find_by_filter(doc! {"id": {"$in": ids}}, None, 0, 0)
        .await?
        .into_iter()
        .map(|user| (user.id, user))
        .collect())
}

pub async fn project_for_caller(context: &Context, issue: Issue) -> error::Result<PublicIssue> {
    let auth = context.auth();
    let reporters = load_reporters(context, std::slice::from_ref(&issue)).await?;
    let reporter = reporters.get(&issue.reporter);
    Ok(Visibility::for_viewer(&auth, Some(&issue.reporter)).project_issue(
        issue,
        reporter,
        default_timestamp(),
    ))
}

pub fn history_row(
    issue: &Issue,
    from_status: Option<Status>,
    action: Option<Action>,
    auth: &Auth,
    comment: Option<String>,
) -> StateHistory {
    StateHistory {
        id: ObjectId::new(),
        issue_id: issue.id,
        from_status,
        to_status: issue.status,
        action,
        changed_by: auth.id().copied(),
        changed_by_role: auth.role(),
        comment,
        timestamp: issue.status_changed_at,
        last_modified: default_timestamp(),
    }
}

pub struct IssueService {
    context: Context,
}

impl IssueService {
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    pub async fn create(&self, create: CreateIssue) -> error::Result<CreatedIssue> {
        let auth = self.context.auth();
        let reporter = auth.user_id()?;

        let issues = self.context.try_get_repository::<Issue>()?;
        let history = self.context.try_get_repository::<StateHistory>()?;
        let buckets = self.context.try_get_repository::<RateBucket>()?;

        let title = text("title", &create.title, 5, 200)?;
        let description = text("description", &create.description, 10, 5000)?;
        create
            .category
            .validate_subcategory(create.subcategory.as_deref())?;
        let point = GeoPoint::new(create.lat, create.lng)?;
        let address = text("address", &create.address, 1, 500)?;
        check_images(&create.images)?;

        rate_limit::check(&buckets, &format!("issue:{}", reporter), TokenBucket::ISSUE).await?;

        let now = default_timestamp();
        let possible_duplicates = self.find_duplicates(create.category, &point, now).await?;

        let mut issue = Issue {
            id: ObjectId::new(),
            title,
            description,
            category: create.category,
            subcategory: create.subcategory,
            status: Status::Pending,
            priority: Priority::Low,
            priority_score: 0,
            location: Location { address, point },
            reporter,
            assigned_department: None,
            assigned_to: None,
            upvotes: Vec::new(),
            comments: Vec::new(),
            images: create.images,
            sla: Sla::new(Priority::Low, now),
            escalation_history: Vec::new(),
            feedback: None,
            created_at: now,
            status_changed_at: now,
            resolved_at: None,
            last_modified: now,
        };

        let scoring = score(&issue);
        issue.priority = scoring.priority;
        issue.priority_score = scoring.score;
        issue.sla = Sla::new(scoring.priority, now);

        issues.insert(&issue).await?;
        history
            .insert(&history_row(&issue, None, None, &auth, None))
            .await?;

        log::info!(
            "Issue {} created with {} priority (score {})",
            issue.id,
            issue.priority.as_str(),
            issue.priority_score
        );
        notification::issue_received(&self.context, &issue).await;

        Ok(CreatedIssue {
            issue: project_for_caller(&self.context, issue).await?,
            scoring,
            possible_duplicates,
        })
    }

    async fn find_duplicates(
        &self,
        category: Category,
        point: &GeoPoint,
        now: i64,
    ) -> error::Result<Vec<DuplicateCandidate>> {
        let issues = self.context.try_get_repository::<Issue>()?;
        let since = now - DUPLICATE_WINDOW_DAYS * 24 * MICROS_PER_HOUR;

        let filter = doc! {
            "category": category.as_str(),
            "status": {"$in": Status::open()},
            "created_at": {"$gte": since},
        };

        Ok(issues
            .find_near(
                "location.point",
                point,
                DUPLICATE_RADIUS_METERS,
                filter,
                DUPLICATE_LIMIT,
            )
            .await?
            .into_iter()
            .map(|issue| DuplicateCandidate {
                distance_meters: issue.location.point.distance_to(point),
                id: issue.id.to_hex(),
                title: issue.title,
                status: issue.status,
                priority: issue.priority,
                upvotes: issue.upvotes.len(),
                created_at: issue.created_at,
            })
            .collect())
    }

    pub async fn duplicates(
        &self,
        query: DuplicateQuery,
    ) -> error::Result<Vec<DuplicateCandidate>> {
        let point = GeoPoint::new(query.lat, query.lng)?;
        self.find_duplicates(query.category, &point, default_timestamp())
            .await
    }

    pub async fn list(&self, filter: IssueFilter) -> error::Result<Paginated<PublicIssue>> {
        let auth = self.context.auth();
        let issues = self.context.try_get_repository::<Issue>()?;

        let mut query = match auth {
            Auth::Citizen(id) => doc! {"reporter": id},
            Auth::Department(_, department) => doc! {"assigned_department": department},
            Auth::Admin(_) | Auth::Municipal(_) | Auth::Service(_, _) => Document::new(),
            Auth::None => return Err(auth.forbidden("Authentication required")),
        };

        if let Some(status) = filter.status {
            query.insert("status", status.as_str());
        }
        if let Some(category) = filter.category {
            query.insert("category", category.as_str());
        }
        if let Some(priority) = filter.priority {
            query.insert("priority", priority.as_str());
        }
        if let Some(department) = filter.department {
            if auth.full_access() {
                query.insert("assigned_department", department.parse::<ObjectId>()?);
            }
        }

        let pagination = PaginationParams {
            page: filter.page,
            per_page: filter.per_page,
        };

        let total_documents = issues.count(query.clone()).await?;
        let found = issues
            .find_by_filter(
                query,
                Some(doc! {"created_at": -1}),
                pagination.skip(),
                pagination.limit(),
            )
            .await?;

        let reporters = load_reporters(&self.context, &found).await?;
        let now = default_timestamp();
        let result = found
            .into_iter()
            .map(|issue| {
                let reporter = reporters.get(&issue.reporter);
                Visibility::for_viewer(&auth, Some(&issue.reporter)).project_issue(
                    issue,
                    reporter,
                    now,
                )
            })
            .collect();

        Ok(Paginated {
            result,
            total_documents,
        })
    }

    pub async fn find(&self, id: ObjectId) -> error::Result<PublicIssue> {
        let issue = load_issue(&self.context, id).await?;
        project_for_caller(&self.context, issue).await
    }

    pub async fn history(&self, id: ObjectId) -> error::Result<Vec<PublicStateHistory>> {
        let auth = self.context.auth();
        let issue = load_issue(&self.context, id).await?;
        let history = self.context.try_get_repository::<StateHistory>()?;

        let visibility = Visibility::for_viewer(&auth, Some(&issue.reporter));
        Ok(history
            .find_by_filter(
                doc! {"issue_id": issue.id},
                Some(doc! {"timestamp": 1}),
                0,
                0,
            )
            .await?
            .into_iter()
            .map(PublicStateHistory::from)
            .map(|mut row| {
                if !visibility.is_full() {
                    row.changed_by = None;
                }
                row
            })
            .collect())
    }

    pub async fn change(&self, id: ObjectId, change: IssueChange) -> error::Result<PublicIssue> {
        let auth = self.context.auth();
        let issues = self.context.try_get_repository::<Issue>()?;
        let mut issue = load_issue(&self.context, id).await?;

        if !Edit.get_access(&auth, &issue) {
            return Err(auth.forbidden("Only pending issues can be edited by their reporter"));
        }

        if let Some(title) = change.title {
            issue.title = text("title", &title, 5, 200)?;
        }
        if let Some(description) = change.description {
            issue.description = text("description", &description, 10, 5000)?;
        }
        if let Some(subcategory) = change.subcategory {
            issue.category.validate_subcategory(Some(&subcategory))?;
            issue.subcategory = Some(subcategory);
        }
        if let Some(address) = change.address {
            issue.location.address = text("address", &address, 1, 500)?;
        }
        if let Some(images) = change.images {
            check_images(&images)?;
            issue.images = images;
        }

        // Untriaged issues are re-scored from scratch.
        if issue.status == Status::Pending {
            let scoring = score(&issue);
            issue.priority = scoring.priority;
            issue.priority_score = scoring.score;
            issue.sla.deadline = sla::deadline(scoring.priority, issue.created_at);
        }

        let issue = issues.update_one(doc! {"id": issue.id}, &issue).await?;
        project_for_caller(&self.context, issue).await
    }

    pub async fn delete(&self, id: ObjectId) -> error::Result<PublicIssue> {
        let auth = self.context.auth();
        let issues = self.context.try_get_repository::<Issue>()?;
        let history = self.context.try_get_repository::<StateHistory>()?;

        let issue = load_issue(&self.context, id).await?;
        if !Delete.get_access(&auth, &issue) {
            return Err(auth.forbidden("Only administrators can delete issues"));
        }

        let Some(issue) = issues.delete("id", &id).await? else {
            return Err(anyhow::anyhow!("No issue found").code(404));
        };
        let rows = history.delete_many("issue_id", &Bson::ObjectId(id)).await?;

        log::info!("Issue {} deleted with {} history rows", id, rows);
        Ok(Visibility::Full { viewer: auth.id().copied() }.project_issue(
            issue,
            None,
            default_timestamp(),
        ))
    }

    pub async fn comment(&self, id: ObjectId, create: CreateComment) -> error::Result<PublicIssue> {
        let auth = self.context.auth();
        let author = auth.user_id()?;
        let Some(author_role) = auth.role() else {
            return Err(auth.forbidden("Only users can comment"));
        };

        let issues = self.context.try_get_repository::<Issue>()?;
        let mut issue = load_issue(&self.context, id).await?;

        issue.comments.push(Comment {
            id: ObjectId::new(),
            author,
            author_role,
            text: text("text", &create.text, 1, 2000)?,
            created_at: default_timestamp(),
        });

        let issue = issues.update_one(doc! {"id": issue.id}, &issue).await?;
        notification::new_comment(&self.context, &issue, author).await;
        project_for_caller(&self.context, issue).await
    }

    /// Toggles the caller's upvote. The stored priority only ever rises here.
    pub async fn upvote(&self, id: ObjectId) -> error::Result<UpvoteResult> {
        let auth = self.context.auth();
        let user = auth.user_id()?;
        let issues = self.context.try_get_repository::<Issue>()?;
        let mut issue = load_issue(&self.context, id).await?;

        if issue.reporter == user {
            return Err(anyhow::anyhow!("You cannot upvote your own issue").code(400));
        }

        let upvoted = if let Some(position) = issue.upvotes.iter().position(|x| x == &user) {
            issue.upvotes.remove(position);
            false
        } else {
            issue.upvotes.push(user);
            true
        };

        let scoring = score(&issue);
        issue.priority_score = scoring.score;
        if scoring.priority > issue.priority && issue.status.is_open() {
            log::info!(
                "Issue {} raised from {} to {} by upvotes",
                issue.id,
                issue.priority.as_str(),
                scoring.priority.as_str()
            );
            issue.priority = scoring.priority;
            let tightened = sla::deadline(scoring.priority, issue.created_at);
            issue.sla.deadline = issue.sla.deadline.min(tightened);
        }

        let issue = issues.update_one(doc! {"id": issue.id}, &issue).await?;
        Ok(UpvoteResult {
            upvotes: issue.upvotes.len(),
            upvoted,
            priority: issue.priority,
            priority_score: issue.priority_score,
        })
    }

    pub async fn feedback(
        &self,
        id: ObjectId,
        create: CreateFeedback,
    ) -> error::Result<PublicIssue> {
        let auth = self.context.auth();
        let user = auth.user_id()?;
        let issues = self.context.try_get_repository::<Issue>()?;
        let mut issue = load_issue(&self.context, id).await?;

        if issue.reporter != user {
            return Err(auth.forbidden("Only the reporter can leave feedback"));
        }
        if issue.status != Status::Resolved {
            return Err(anyhow::anyhow!("Feedback can only be left on resolved issues").code(400));
        }
        if issue.feedback.is_some() {
            return Err(anyhow::anyhow!("Feedback was already submitted").code(409));
        }
        if !(1..=5).contains(&create.rating) {
            return Err(anyhow::anyhow!("rating: must be between 1 and 5").code(400));
        }

        let comment = create
            .comment
            .map(|comment| text("comment", &comment, 1, 1000))
            .transpose()?;

        issue.feedback = Some(Feedback {
            rating: create.rating,
            comment,
            created_at: default_timestamp(),
        });

        let issue = issues.update_one(doc! {"id": issue.id}, &issue).await?;
        project_for_caller(&self.context, issue).await
    }
}
