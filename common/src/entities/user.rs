use mongodb::bson::oid::ObjectId;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::{
    default_timestamp, impl_has_last_modified,
    repository::Entity,
};

use super::role::Role;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    pub password: String,
    pub salt: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub department: Option<ObjectId>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default = "default_timestamp")]
    pub created_at: i64,
    #[serde(default = "default_timestamp")]
    pub last_modified: i64,
}

fn default_active() -> bool {
    true
}

impl_has_last_modified!(User);

impl Entity for User {
    fn id(&self) -> ObjectId {
        self.id
    }
}

impl User {
    pub fn hash_password(password: &str) -> (String, String) {
        let salt: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(10)
            .map(char::from)
            .collect();

        (sha256::digest(format!("{}{}", password, salt)), salt)
    }

    pub fn set_password(&mut self, password: &str) {
        let (hash, salt) = Self::hash_password(password);
        self.password = hash;
        self.salt = salt;
    }

    pub fn check_password(&self, password: &str) -> bool {
        sha256::digest(format!("{}{}", password, self.salt)) == self.password
    }
}

/// What other parties may learn about a user; contact fields are optional
/// because [`crate::visibility::Visibility`] masks or removes them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub department: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_hex(),
            name: user.name,
            email: Some(user.email),
            phone: user.phone,
            role: user.role,
            department: user.department.map(|id| id.to_hex()),
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passwords_are_salted() {
        let (first, first_salt) = User::hash_password("correct horse");
        let (second, second_salt) = User::hash_password("correct horse");
        assert_ne!(first_salt, second_salt);
        assert_ne!(first, second);

        let user = User {
            id: ObjectId::new(),
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            password: first,
            salt: first_salt,
            phone: None,
            role: Role::Citizen,
            department: None,
            is_active: true,
            created_at: 0,
            last_modified: 0,
        };
        assert!(user.check_password("correct horse"));
        assert!(!user.check_password("wrong horse"));
    }
}
