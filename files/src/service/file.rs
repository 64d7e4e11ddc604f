use actix_multipart::Multipart;
use futures::StreamExt;
use mongodb::bson::{oid::ObjectId, Bson};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use common::{
    context::Context,
    default_timestamp,
    entities::file::{Metadata, Provider, PublicMetadata},
    error::{self, AddCode},
    services::{FRONTEND, PROTOCOL},
};

lazy_static::lazy_static! {
    static ref IMAGE_HOST: Option<(String, String)> =
        match (std::env::var("IMAGE_HOST_URL"), std::env::var("IMAGE_HOST_KEY")) {
            (Ok(url), Ok(key)) => Some((url, key)),
            _ => None,
        };
}

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

#[derive(Debug)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub original_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HostedImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct HostResponse {
    data: HostedImage,
}

/// Reads the `file` field, refusing anything that is not an image or is
/// larger than `MAX_UPLOAD_BYTES`.
pub async fn read_upload(mut payload: Multipart) -> error::Result<Upload> {
    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|err| anyhow::anyhow!("Malformed upload: {}", err).code(400))?;
        if field.name() != "file" {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_default();
        if !IMAGE_TYPES.contains(&content_type.as_str()) {
            return Err(anyhow::anyhow!(
                "file: only {} images are accepted",
                IMAGE_TYPES.join(", ")
            )
            .code(415));
        }
        let original_name = field
            .content_disposition()
            .get_filename()
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|err| anyhow::anyhow!("Malformed upload: {}", err).code(400))?;
            if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(anyhow::anyhow!("file: must not exceed 5 MiB").code(413));
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(anyhow::anyhow!("file: is empty").code(400));
        }
        return Ok(Upload {
            bytes,
            content_type,
            original_name,
        });
    }
    Err(anyhow::anyhow!("'file' field is required").code(400))
}

pub struct FileService {
    pub context: Context,
}

impl FileService {
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    async fn upload_remote(
        &self,
        url: &str,
        key: &str,
        upload: Upload,
    ) -> error::Result<String> {
        let mut image = Part::bytes(upload.bytes).mime_str(&upload.content_type)?;
        if let Some(name) = upload.original_name {
            image = image.file_name(name);
        }
        let form = Form::new().text("key", key.to_string()).part("image", image);

        let response = self
            .context
            .0
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| anyhow::anyhow!("Image host unreachable: {}", err).code(502))?;

        if !response.status().is_success() {
            return Err(
                anyhow::anyhow!("Image host answered {}", response.status()).code(502),
            );
        }

        let hosted: HostResponse = response
            .json()
            .await
            .map_err(|err| anyhow::anyhow!("Unexpected image host response: {}", err).code(502))?;
        Ok(hosted.data.url)
    }

    pub async fn upload(&self, payload: Multipart) -> error::Result<PublicMetadata> {
        let author = self.context.auth().user_id()?;
        let metas = self.context.try_get_repository::<Metadata>()?;
        let upload = read_upload(payload).await?;

        let id = ObjectId::new();
        let size = upload.bytes.len();
        let content_type = upload.content_type.clone();
        let original_name = upload.original_name.clone();

        let (url, provider) = match IMAGE_HOST.as_ref() {
            Some((url, key)) => (self.upload_remote(url, key, upload).await?, Provider::Remote),
            None => {
                log::debug!("Image host not configured, storing mock upload {}", id);
                (
                    format!("{}://{}/uploads/{}", PROTOCOL.as_str(), FRONTEND.as_str(), id),
                    Provider::Mock,
                )
            }
        };

        let meta = Metadata {
            id,
            author,
            url,
            original_name,
            content_type,
            size,
            provider,
            last_modified: default_timestamp(),
        };
        metas.insert(&meta).await?;

        log::info!("Upload {} of {} bytes by {}", meta.id, meta.size, author);
        Ok(meta.into())
    }

    pub async fn find(&self, id: ObjectId) -> error::Result<PublicMetadata> {
        let metas = self.context.try_get_repository::<Metadata>()?;
        metas
            .find("id", &Bson::ObjectId(id))
            .await?
            .map(PublicMetadata::from)
            .ok_or_else(|| anyhow::anyhow!("No file found").code(404))
    }
}
