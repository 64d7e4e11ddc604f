use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::{default_timestamp, impl_has_last_modified, repository::Entity};

use super::{
    issue::{Action, Status},
    role::Role,
};

/// One row per status change of an issue, including its creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateHistory {
    pub id: ObjectId,
    pub issue_id: ObjectId,
    #[serde(default)]
    pub from_status: Option<Status>,
    pub to_status: Status,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub changed_by: Option<ObjectId>,
    #[serde(default)]
    pub changed_by_role: Option<Role>,
    #[serde(default)]
    pub comment: Option<String>,
    pub timestamp: i64,
    #[serde(default = "default_timestamp")]
    pub last_modified: i64,
}

impl_has_last_modified!(StateHistory);

impl Entity for StateHistory {
    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicStateHistory {
    pub id: String,
    pub issue_id: String,
    pub from_status: Option<Status>,
    pub to_status: Status,
    pub action: Option<Action>,
    pub changed_by: Option<String>,
    pub changed_by_role: Option<Role>,
    pub comment: Option<String>,
    pub timestamp: i64,
}

impl From<StateHistory> for PublicStateHistory {
    fn from(history: StateHistory) -> Self {
        Self {
            id: history.id.to_hex(),
            issue_id: history.issue_id.to_hex(),
            from_status: history.from_status,
            to_status: history.to_status,
            action: history.action,
            changed_by: history.changed_by.map(|id| id.to_hex()),
            changed_by_role: history.changed_by_role,
            comment: history.comment,
            timestamp: history.timestamp,
        }
    }
}
