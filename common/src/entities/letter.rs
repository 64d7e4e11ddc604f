use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::{default_timestamp, impl_has_last_modified, repository::Entity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Letter {
    pub id: ObjectId,
    pub email: String,
    pub message: String,
    pub subject: String,
    /// False when no SMTP relay is configured; the letter is kept for replay.
    #[serde(default)]
    pub sent: bool,
    #[serde(default = "default_timestamp")]
    pub created_at: i64,
    #[serde(default = "default_timestamp")]
    pub last_modified: i64,
}

impl_has_last_modified!(Letter);

impl Entity for Letter {
    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLetter {
    pub email: String,
    pub message: String,
    pub subject: String,
}
