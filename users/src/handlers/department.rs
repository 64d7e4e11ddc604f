use actix_web::{
    delete, get, patch, post,
    web::{self, Json},
};

use common::{context::Context, entities::department::PublicDepartment, error};

use crate::service::department::{CreateDepartment, DepartmentChange, DepartmentService};

#[get("/api/departments")]
pub async fn get_departments(context: Context) -> error::Result<Json<Vec<PublicDepartment>>> {
    Ok(Json(DepartmentService::new(context).list().await?))
}

#[post("/api/admin/departments")]
pub async fn post_department(
    context: Context,
    Json(data): web::Json<CreateDepartment>,
) -> error::Result<Json<PublicDepartment>> {
    Ok(Json(DepartmentService::new(context).create(data).await?))
}

#[patch("/api/admin/departments/{id}")]
pub async fn patch_department(
    context: Context,
    id: web::Path<String>,
    Json(data): web::Json<DepartmentChange>,
) -> error::Result<Json<PublicDepartment>> {
    Ok(Json(
        DepartmentService::new(context)
            .change(id.parse()?, data)
            .await?,
    ))
}

#[delete("/api/admin/departments/{id}")]
pub async fn delete_department(
    context: Context,
    id: web::Path<String>,
) -> error::Result<Json<PublicDepartment>> {
    Ok(Json(
        DepartmentService::new(context)
            .delete(id.parse()?)
            .await?,
    ))
}
