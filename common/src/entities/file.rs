use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::{impl_has_last_modified, repository::Entity};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Remote,
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    pub id: ObjectId,
    pub author: ObjectId,
    pub url: String,
    pub original_name: Option<String>,
    pub content_type: String,
    pub size: usize,
    pub provider: Provider,
    pub last_modified: i64,
}

impl_has_last_modified!(Metadata);

impl Entity for Metadata {
    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicMetadata {
    pub id: String,
    pub url: String,
    pub original_name: Option<String>,
    pub content_type: String,
    pub size: usize,
    pub provider: Provider,
}

impl From<Metadata> for PublicMetadata {
    fn from(metadata: Metadata) -> Self {
        Self {
            id: metadata.id.to_hex(),
            url: metadata.url,
            original_name: metadata.original_name,
            content_type: metadata.content_type,
            size: metadata.size,
            provider: metadata.provider,
        }
    }
}
