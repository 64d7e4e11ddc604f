use actix_multipart::Multipart;
use actix_web::{
    get, post,
    web::{self, Json},
    HttpResponse,
};

use common::{context::Context, entities::file::PublicMetadata, error};

use crate::service::file::FileService;

#[post("/api/files/upload")]
pub async fn upload_file(context: Context, payload: Multipart) -> error::Result<HttpResponse> {
    let meta = FileService::new(context).upload(payload).await?;
    Ok(HttpResponse::Created().json(meta))
}

#[get("/api/files/{id}")]
pub async fn get_file(
    context: Context,
    id: web::Path<String>,
) -> error::Result<Json<PublicMetadata>> {
    Ok(Json(FileService::new(context).find(id.parse()?).await?))
}
