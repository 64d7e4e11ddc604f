use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

use common::{
    auth::Auth,
    context::Context,
    entities::{
        role::Role,
        user::{PublicUser, User},
    },
    error::{self, AddCode},
    rate_limit::{self, RateBucket, TokenBucket},
};

use super::{
    user::{insert_unique, new_user},
    validation,
};

pub struct AuthService {
    context: Context,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Login {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Token {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Register {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

impl AuthService {
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    /// Self-service sign up always creates a citizen.
    pub async fn register(&self, register: Register, client_ip: &str) -> error::Result<Token> {
        let buckets = self.context.try_get_repository::<RateBucket>()?;
        rate_limit::check(
            &buckets,
            &format!("register:{}", client_ip),
            TokenBucket::REGISTER,
        )
        .await?;

        let users = self.context.try_get_repository::<User>()?;

        let email = validation::normalize_email(&register.email)?;
        validation::password(&register.password)?;

        let user = new_user(
            validation::name(&register.name)?,
            email,
            &register.password,
            validation::phone(register.phone)?,
            Role::Citizen,
            None,
        );
        insert_unique(&users, &user).await?;

        log::info!("Citizen {} registered", user.id);
        Ok(Token {
            token: Auth::from_user(&user)?.to_token()?,
            user: user.into(),
        })
    }

    pub async fn login(&self, login: Login) -> error::Result<Token> {
        let email = login.email.trim().to_lowercase();

        let buckets = self.context.try_get_repository::<RateBucket>()?;
        rate_limit::check(&buckets, &format!("login:{}", email), TokenBucket::LOGIN).await?;

        let users = self.context.try_get_repository::<User>()?;

        let user = users
            .find("email", &Bson::String(email))
            .await?
            .filter(|user| user.check_password(&login.password));

        let Some(user) = user else {
            return Err(anyhow::anyhow!("Invalid email or password").code(401));
        };

        if !user.is_active {
            return Err(anyhow::anyhow!("Account is deactivated").code(403));
        }

        Ok(Token {
            token: Auth::from_user(&user)?.to_token()?,
            user: user.into(),
        })
    }
}
