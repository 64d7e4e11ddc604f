use mongodb::bson::{doc, oid::ObjectId, Bson};
use serde::{Deserialize, Serialize};

use common::{
    access_rules::{AccessRules, Administer},
    context::Context,
    default_timestamp,
    entities::{
        department::{Department, PublicDepartment},
        issue::Category,
        user::User,
    },
    error::{self, AddCode},
};

use super::validation;

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateDepartment {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DepartmentChange {
    pub name: Option<String>,
    pub email: Option<String>,
    pub categories: Option<Vec<Category>>,
    pub is_active: Option<bool>,
}

pub struct DepartmentService {
    context: Context,
}

impl DepartmentService {
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    fn require_admin(&self) -> error::Result<()> {
        let auth = self.context.auth();
        if !Administer.get_access(&auth, ()) {
            return Err(auth.forbidden("Only administrators can manage departments"));
        }
        Ok(())
    }

    async fn check_name_free(&self, name: &str, except: Option<ObjectId>) -> error::Result<()> {
        let departments = self.context.try_get_repository::<Department>()?;
        let taken = departments
            .find("name", &Bson::String(name.to_string()))
            .await?
            .map_or(false, |other| Some(other.id) != except);
        if taken {
            return Err(anyhow::anyhow!("Department with this name already exists").code(409));
        }
        Ok(())
    }

    /// Active departments for everyone, all of them for administrators.
    pub async fn list(&self) -> error::Result<Vec<PublicDepartment>> {
        let departments = self.context.try_get_repository::<Department>()?;
        let filter = if self.context.auth().is_admin() {
            doc! {}
        } else {
            doc! {"is_active": true}
        };

        Ok(departments
            .find_by_filter(filter, Some(doc! {"name": 1}), 0, 0)
            .await?
            .into_iter()
            .map(PublicDepartment::from)
            .collect())
    }

    pub async fn create(&self, create: CreateDepartment) -> error::Result<PublicDepartment> {
        self.require_admin()?;
        let departments = self.context.try_get_repository::<Department>()?;

        let name = validation::name(&create.name)?;
        self.check_name_free(&name, None).await?;

        let department = Department {
            id: ObjectId::new(),
            name,
            email: validation::normalize_email(&create.email)?,
            categories: create.categories,
            is_active: true,
            last_modified: default_timestamp(),
        };
        departments.insert(&department).await?;

        log::info!("Department {} created", department.name);
        Ok(department.into())
    }

    pub async fn change(
        &self,
        id: ObjectId,
        change: DepartmentChange,
    ) -> error::Result<PublicDepartment> {
        self.require_admin()?;
        let departments = self.context.try_get_repository::<Department>()?;

        let Some(mut department) = departments.find("id", &Bson::ObjectId(id)).await? else {
            return Err(anyhow::anyhow!("No department found").code(404));
        };

        if let Some(name) = change.name {
            let name = validation::name(&name)?;
            self.check_name_free(&name, Some(id)).await?;
            department.name = name;
        }
        if let Some(email) = change.email {
            department.email = validation::normalize_email(&email)?;
        }
        if let Some(categories) = change.categories {
            department.categories = categories;
        }
        if let Some(is_active) = change.is_active {
            department.is_active = is_active;
        }

        let department = departments
            .update_one(doc! {"id": department.id}, &department)
            .await?;
        Ok(department.into())
    }

    /// Refused while staff members still belong to the department.
    pub async fn delete(&self, id: ObjectId) -> error::Result<PublicDepartment> {
        self.require_admin()?;
        let departments = self.context.try_get_repository::<Department>()?;
        let users = self.context.try_get_repository::<User>()?;

        let staff = users.count(doc! {"department": id}).await?;
        if staff > 0 {
            return Err(anyhow::anyhow!(
                "Department still has {} staff members, reassign them first",
                staff
            )
            .code(409));
        }

        let Some(department) = departments.delete("id", &id).await? else {
            return Err(anyhow::anyhow!("No department found").code(404));
        };

        log::info!("Department {} deleted", department.name);
        Ok(department.into())
    }
}
