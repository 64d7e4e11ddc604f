use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::{default_timestamp, impl_has_last_modified, repository::Entity};

use super::issue::Category;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Department {
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub categories: Vec<Category>,
    pub is_active: bool,
    #[serde(default = "default_timestamp")]
    pub last_modified: i64,
}

impl_has_last_modified!(Department);

impl Entity for Department {
    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicDepartment {
    pub id: String,
    pub name: String,
    pub email: String,
    pub categories: Vec<Category>,
    pub is_active: bool,
}

impl From<Department> for PublicDepartment {
    fn from(department: Department) -> Self {
        Self {
            id: department.id.to_hex(),
            name: department.name,
            email: department.email,
            categories: department.categories,
            is_active: department.is_active,
        }
    }
}
