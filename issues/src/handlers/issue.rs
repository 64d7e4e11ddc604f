use actix_web::{
    delete, get, patch, post,
    web::{self, Json},
    HttpResponse,
};

use common::{
    api::pagination::Paginated, context::Context, entities::history::PublicStateHistory, error,
    visibility::PublicIssue,
};

use crate::service::issue::{
    CreateComment, CreateFeedback, CreateIssue, DuplicateCandidate, DuplicateQuery, IssueChange,
    IssueFilter, IssueService, UpvoteResult,
};

#[post("/api/issues")]
pub async fn post_issue(
    context: Context,
    Json(data): web::Json<CreateIssue>,
) -> error::Result<HttpResponse> {
    let created = IssueService::new(context).create(data).await?;
    Ok(HttpResponse::Created().json(created))
}

#[get("/api/issues")]
pub async fn get_issues(
    context: Context,
    filter: web::Query<IssueFilter>,
) -> error::Result<Json<Paginated<PublicIssue>>> {
    Ok(Json(
        IssueService::new(context)
            .list(filter.into_inner())
            .await?,
    ))
}

#[get("/api/issues/duplicates")]
pub async fn get_duplicates(
    context: Context,
    query: web::Query<DuplicateQuery>,
) -> error::Result<Json<Vec<DuplicateCandidate>>> {
    Ok(Json(
        IssueService::new(context)
            .duplicates(query.into_inner())
            .await?,
    ))
}

#[get("/api/issues/{id}")]
pub async fn get_issue(
    context: Context,
    id: web::Path<String>,
) -> error::Result<Json<PublicIssue>> {
    Ok(Json(IssueService::new(context).find(id.parse()?).await?))
}

#[patch("/api/issues/{id}")]
pub async fn patch_issue(
    context: Context,
    id: web::Path<String>,
    Json(data): web::Json<IssueChange>,
) -> error::Result<Json<PublicIssue>> {
    Ok(Json(
        IssueService::new(context)
            .change(id.parse()?, data)
            .await?,
    ))
}

#[delete("/api/issues/{id}")]
pub async fn delete_issue(
    context: Context,
    id: web::Path<String>,
) -> error::Result<Json<PublicIssue>> {
    Ok(Json(IssueService::new(context).delete(id.parse()?).await?))
}

#[get("/api/issues/{id}/history")]
pub async fn get_history(
    context: Context,
    id: web::Path<String>,
) -> error::Result<Json<Vec<PublicStateHistory>>> {
    Ok(Json(IssueService::new(context).history(id.parse()?).await?))
}

#[post("/api/issues/{id}/comments")]
pub async fn post_comment(
    context: Context,
    id: web::Path<String>,
    Json(data): web::Json<CreateComment>,
) -> error::Result<Json<PublicIssue>> {
    Ok(Json(
        IssueService::new(context)
            .comment(id.parse()?, data)
            .await?,
    ))
}

#[post("/api/issues/{id}/upvote")]
pub async fn post_upvote(
    context: Context,
    id: web::Path<String>,
) -> error::Result<Json<UpvoteResult>> {
    Ok(Json(IssueService::new(context).upvote(id.parse()?).await?))
}

#[post("/api/issues/{id}/feedback")]
pub async fn post_feedback(
    context: Context,
    id: web::Path<String>,
    Json(data): web::Json<CreateFeedback>,
) -> error::Result<Json<PublicIssue>> {
    Ok(Json(
        IssueService::new(context)
            .feedback(id.parse()?, data)
            .await?,
    ))
}
