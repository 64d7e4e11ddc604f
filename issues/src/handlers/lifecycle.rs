use actix_web::{
    post,
    web::{self, Json},
};

use common::{context::Context, error, visibility::PublicIssue};

use crate::service::lifecycle::{EscalationRequest, LifecycleService, StatusChange, SweepResult};

#[post("/api/issues/{id}/status")]
pub async fn post_status(
    context: Context,
    id: web::Path<String>,
    Json(data): web::Json<StatusChange>,
) -> error::Result<Json<PublicIssue>> {
    Ok(Json(
        LifecycleService::new(context)
            .change_status(id.parse()?, data)
            .await?,
    ))
}

#[post("/api/issues/{id}/escalate")]
pub async fn post_escalate(
    context: Context,
    id: web::Path<String>,
    data: Option<web::Json<EscalationRequest>>,
) -> error::Result<Json<PublicIssue>> {
    let request = data.map(web::Json::into_inner).unwrap_or_default();
    Ok(Json(
        LifecycleService::new(context)
            .escalate(id.parse()?, request)
            .await?,
    ))
}

#[post("/api/admin/escalations")]
pub async fn post_sweep(context: Context) -> error::Result<Json<SweepResult>> {
    Ok(Json(LifecycleService::new(context).sweep().await?))
}
