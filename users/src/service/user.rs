use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use serde::{Deserialize, Serialize};

use common::{
    access_rules::{AccessRules, Administer, Edit},
    api::pagination::{Paginated, PaginationParams},
    auth::Auth,
    context::Context,
    default_timestamp,
    entities::{
        department::Department,
        role::Role,
        user::{PublicUser, User},
    },
    error::{self, AddCode},
    repository::RepositoryObject,
    visibility::Visibility,
};

use super::validation;

#[derive(Debug, Serialize, Deserialize)]
pub struct UserChange {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub current_password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminCreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub role: Role,
    pub department: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminUserChange {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub department: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub department: Option<String>,
    pub is_active: Option<bool>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

pub struct UserService {
    context: Context,
}

impl UserService {
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    fn require_admin(&self) -> error::Result<Auth> {
        let auth = self.context.auth();
        if !Administer.get_access(&auth, ()) {
            return Err(auth.forbidden("Only administrators can manage users"));
        }
        Ok(auth)
    }

    async fn get(&self, id: ObjectId) -> error::Result<User> {
        let users = self.context.try_get_repository::<User>()?;
        users
            .find("id", &Bson::ObjectId(id))
            .await?
            .ok_or_else(|| anyhow::anyhow!("No user found").code(404))
    }

    pub async fn me(&self) -> error::Result<PublicUser> {
        let id = self.context.auth().user_id()?;
        Ok(self.get(id).await?.into())
    }

    pub async fn change_me(&self, change: UserChange) -> error::Result<PublicUser> {
        let auth = self.context.auth();
        let users = self.context.try_get_repository::<User>()?;
        let mut user = self.get(auth.user_id()?).await?;

        if !Edit.get_access(&auth, &user) {
            return Err(auth.forbidden("User is not available to change"));
        }

        if let Some(name) = change.name {
            user.name = validation::name(&name)?;
        }

        if change.phone.is_some() {
            user.phone = validation::phone(change.phone)?;
        }

        if let Some(password) = change.password {
            let current = change.current_password.unwrap_or_default();
            if !user.check_password(&current) {
                return Err(anyhow::anyhow!("current_password: incorrect password").code(400));
            }
            validation::password(&password)?;
            user.set_password(&password);
        }

        let user = users.update_one(doc! {"id": user.id}, &user).await?;
        Ok(user.into())
    }

    pub async fn find(&self, id: ObjectId) -> error::Result<PublicUser> {
        let auth = self.context.auth();
        if auth == Auth::None {
            return Err(auth.forbidden("Authentication required"));
        }

        let user = self.get(id).await?;
        Ok(Visibility::for_viewer(&auth, Some(&user.id)).project_user(user))
    }

    pub async fn list(&self, filter: UserFilter) -> error::Result<Paginated<PublicUser>> {
        self.require_admin()?;
        let users = self.context.try_get_repository::<User>()?;

        let mut query = Document::new();
        if let Some(role) = filter.role {
            query.insert("role", role.stringify());
        }
        if let Some(department) = filter.department {
            query.insert("department", department.parse::<ObjectId>()?);
        }
        if let Some(is_active) = filter.is_active {
            query.insert("is_active", is_active);
        }

        let pagination = PaginationParams {
            page: filter.page,
            per_page: filter.per_page,
        };

        let total_documents = users.count(query.clone()).await?;
        let result = users
            .find_by_filter(
                query,
                Some(doc! {"created_at": -1}),
                pagination.skip(),
                pagination.limit(),
            )
            .await?
            .into_iter()
            .map(PublicUser::from)
            .collect();

        Ok(Paginated {
            result,
            total_documents,
        })
    }

    async fn check_department(
        &self,
        role: Role,
        department: Option<ObjectId>,
    ) -> error::Result<Option<ObjectId>> {
        match (role, department) {
            (Role::Department, None) => Err(anyhow::anyhow!(
                "department: required for department staff"
            )
            .code(400)),
            (Role::Department, Some(id)) => {
                let departments = self.context.try_get_repository::<Department>()?;
                if departments.find("id", &Bson::ObjectId(id)).await?.is_none() {
                    return Err(anyhow::anyhow!("department: no such department").code(400));
                }
                Ok(Some(id))
            }
            _ => Ok(None),
        }
    }

    pub async fn create(&self, create: AdminCreateUser) -> error::Result<PublicUser> {
        self.require_admin()?;
        let users = self.context.try_get_repository::<User>()?;

        let email = validation::normalize_email(&create.email)?;
        validation::password(&create.password)?;
        let department = create
            .department
            .map(|id| id.parse::<ObjectId>())
            .transpose()?;

        let user = new_user(
            validation::name(&create.name)?,
            email,
            &create.password,
            validation::phone(create.phone)?,
            create.role,
            self.check_department(create.role, department).await?,
        );
        insert_unique(&users, &user).await?;

        log::info!("User {} created with role {}", user.id, user.role.stringify());
        Ok(user.into())
    }

    pub async fn change(&self, id: ObjectId, change: AdminUserChange) -> error::Result<PublicUser> {
        let auth = self.require_admin()?;
        let users = self.context.try_get_repository::<User>()?;
        let mut user = self.get(id).await?;

        if let Some(name) = change.name {
            user.name = validation::name(&name)?;
        }
        if change.phone.is_some() {
            user.phone = validation::phone(change.phone)?;
        }
        if let Some(password) = change.password {
            validation::password(&password)?;
            user.set_password(&password);
        }
        if let Some(is_active) = change.is_active {
            if !is_active && auth.id() == Some(&user.id) {
                return Err(
                    anyhow::anyhow!("Administrators cannot deactivate themselves").code(400),
                );
            }
            user.is_active = is_active;
        }

        if change.role.is_some() || change.department.is_some() {
            let role = change.role.unwrap_or(user.role);
            let department = match change.department {
                Some(id) => Some(id.parse::<ObjectId>()?),
                None => user.department,
            };
            user.department = self.check_department(role, department).await?;
            user.role = role;
        }

        let user = users.update_one(doc! {"id": user.id}, &user).await?;
        Ok(user.into())
    }

    pub async fn delete(&self, id: ObjectId) -> error::Result<PublicUser> {
        let auth = self.require_admin()?;
        if auth.id() == Some(&id) {
            return Err(anyhow::anyhow!("Administrators cannot delete themselves").code(400));
        }

        let users = self.context.try_get_repository::<User>()?;
        let Some(user) = users.delete("id", &id).await? else {
            return Err(anyhow::anyhow!("No user found").code(404));
        };

        log::info!("User {} deleted", user.id);
        Ok(user.into())
    }
}

pub fn new_user(
    name: String,
    email: String,
    password: &str,
    phone: Option<String>,
    role: Role,
    department: Option<ObjectId>,
) -> User {
    let (password, salt) = User::hash_password(password);
    let now = default_timestamp();
    User {
        id: ObjectId::new(),
        name,
        email,
        password,
        salt,
        phone,
        role,
        department,
        is_active: true,
        created_at: now,
        last_modified: now,
    }
}

pub async fn insert_unique(users: &RepositoryObject<User>, user: &User) -> error::Result<()> {
    if users
        .find("email", &Bson::String(user.email.clone()))
        .await?
        .is_some()
    {
        return Err(anyhow::anyhow!("User with this email already exists").code(409));
    }
    users.insert(user).await?;
    Ok(())
}

/// Creates the first administrator from configuration; no-op once the email exists.
pub async fn bootstrap_admin(
    users: &RepositoryObject<User>,
    email: &str,
    password: &str,
) -> error::Result<bool> {
    let email = validation::normalize_email(email)?;
    validation::password(password)?;

    if users
        .find("email", &Bson::String(email.clone()))
        .await?
        .is_some()
    {
        return Ok(false);
    }

    let admin = new_user(
        "Administrator".to_string(),
        email,
        password,
        None,
        Role::Admin,
        None,
    );
    users.insert(&admin).await?;
    Ok(true)
}
