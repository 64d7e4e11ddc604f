use actix_web::{
    delete, get, patch, post,
    web::{self, Json},
};

use common::{api::pagination::Paginated, context::Context, entities::user::PublicUser, error};

use crate::service::user::{AdminCreateUser, AdminUserChange, UserChange, UserFilter, UserService};

#[get("/api/user/me")]
pub async fn get_me(context: Context) -> error::Result<Json<PublicUser>> {
    Ok(Json(UserService::new(context).me().await?))
}

#[patch("/api/user/me")]
pub async fn patch_me(
    context: Context,
    Json(data): web::Json<UserChange>,
) -> error::Result<Json<PublicUser>> {
    Ok(Json(UserService::new(context).change_me(data).await?))
}

#[get("/api/user/{id}")]
pub async fn get_user(context: Context, id: web::Path<String>) -> error::Result<Json<PublicUser>> {
    Ok(Json(UserService::new(context).find(id.parse()?).await?))
}

#[get("/api/admin/users")]
pub async fn get_users(
    context: Context,
    filter: web::Query<UserFilter>,
) -> error::Result<Json<Paginated<PublicUser>>> {
    Ok(Json(
        UserService::new(context)
            .list(filter.into_inner())
            .await?,
    ))
}

#[post("/api/admin/users")]
pub async fn post_user(
    context: Context,
    Json(data): web::Json<AdminCreateUser>,
) -> error::Result<Json<PublicUser>> {
    Ok(Json(UserService::new(context).create(data).await?))
}

#[patch("/api/admin/users/{id}")]
pub async fn patch_user(
    context: Context,
    id: web::Path<String>,
    Json(data): web::Json<AdminUserChange>,
) -> error::Result<Json<PublicUser>> {
    Ok(Json(
        UserService::new(context)
            .change(id.parse()?, data)
            .await?,
    ))
}

#[delete("/api/admin/users/{id}")]
pub async fn delete_user(
    context: Context,
    id: web::Path<String>,
) -> error::Result<Json<PublicUser>> {
    Ok(Json(UserService::new(context).delete(id.parse()?).await?))
}
