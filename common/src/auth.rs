use chrono::Utc;
use jsonwebtoken::{
    decode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use mongodb::bson::oid::ObjectId;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::{
    constants::DURATION,
    entities::{role::Role, user::User},
    error::{self, AddCode},
};

static SECRET: Lazy<String> = Lazy::new(|| std::env::var("JWT_SECRET").unwrap_or_default());

fn secret() -> error::Result<&'static [u8]> {
    if SECRET.is_empty() {
        return Err(anyhow::anyhow!("JWT_SECRET is not configured").code(500));
    }
    Ok(SECRET.as_bytes())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Service {
    Users,
    Issues,
    Mail,
    Files,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Auth {
    Service(Service, bool),
    Admin(ObjectId),
    Municipal(ObjectId),
    /// Department staff: user id and the department they belong to.
    Department(ObjectId, ObjectId),
    Citizen(ObjectId),
    None,
}

impl Auth {
    pub fn from_user(user: &User) -> error::Result<Self> {
        Ok(match user.role {
            Role::Admin => Auth::Admin(user.id),
            Role::Municipal => Auth::Municipal(user.id),
            Role::Citizen => Auth::Citizen(user.id),
            Role::Department => {
                let Some(department) = user.department else {
                    return Err(anyhow::anyhow!("Department user has no department").code(500));
                };
                Auth::Department(user.id, department)
            }
        })
    }

    pub fn id(&self) -> Option<&ObjectId> {
        match self {
            Auth::Admin(id) | Auth::Municipal(id) | Auth::Citizen(id) => Some(id),
            Auth::Department(id, _) => Some(id),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Auth::Admin(_) => Some(Role::Admin),
            Auth::Municipal(_) => Some(Role::Municipal),
            Auth::Department(_, _) => Some(Role::Department),
            Auth::Citizen(_) => Some(Role::Citizen),
            _ => None,
        }
    }

    pub fn department(&self) -> Option<&ObjectId> {
        match self {
            Auth::Department(_, department) => Some(department),
            _ => None,
        }
    }

    pub fn authorized(self) -> Self {
        match self {
            Auth::Service(name, _) => Auth::Service(name, true),
            a => a,
        }
    }

    pub fn full_access(&self) -> bool {
        matches!(self, Auth::Service(_, _) | Auth::Admin(_) | Auth::Municipal(_))
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Auth::Service(_, _) | Auth::Admin(_))
    }

    /// Id of the calling user, 401 for anonymous and service callers.
    pub fn user_id(&self) -> error::Result<ObjectId> {
        self.id()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Authentication required").code(401))
    }

    /// 401 when nobody is logged in, 403 otherwise.
    pub fn forbidden(&self, message: &str) -> error::ServiceError {
        if self == &Auth::None {
            anyhow::anyhow!("Authentication required").code(401)
        } else {
            anyhow::anyhow!("{}", message.to_string()).code(403)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TokenRole {
    Admin,
    Municipal,
    Department,
    Citizen,
    Service,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    role: TokenRole,
    user_id: Option<String>,
    department_id: Option<String>,
    service_name: Option<Service>,
    user_authorized: Option<bool>,
    exp: i64,
}

fn claim_id(id: Option<String>) -> error::Result<ObjectId> {
    let Some(id) = id else {
        return Err(anyhow::anyhow!("Token has no user id").code(401));
    };
    Ok(id.parse()?)
}

impl Auth {
    /// `Ok(None)` for an expired token, an error for a forged or malformed one.
    pub fn from_token(token: &str) -> error::Result<Option<Self>> {
        let key = DecodingKey::from_secret(secret()?);
        let claims = match decode::<Claims>(token, &key, &Validation::new(Algorithm::HS512)) {
            Ok(data) => data.claims,
            Err(err) if err.kind() == &ErrorKind::ExpiredSignature => return Ok(None),
            Err(err) => return Err(anyhow::anyhow!("Invalid token: {}", err).code(401)),
        };

        let auth = match claims.role {
            TokenRole::Admin => Auth::Admin(claim_id(claims.user_id)?),
            TokenRole::Municipal => Auth::Municipal(claim_id(claims.user_id)?),
            TokenRole::Citizen => Auth::Citizen(claim_id(claims.user_id)?),
            TokenRole::Department => Auth::Department(
                claim_id(claims.user_id)?,
                claim_id(claims.department_id)?,
            ),
            TokenRole::Service => {
                let Some(name) = claims.service_name else {
                    return Err(anyhow::anyhow!("Token has no service name").code(401));
                };
                Auth::Service(name, claims.user_authorized.unwrap_or(false))
            }
        };
        Ok(Some(auth))
    }

    pub fn to_token(&self) -> error::Result<String> {
        let header = Header {
            alg: Algorithm::HS512,
            ..Default::default()
        };
        let exp = Utc::now().timestamp() + DURATION.num_seconds();

        let user = |role: TokenRole, id: &ObjectId, department: Option<&ObjectId>| Claims {
            role,
            user_id: Some(id.to_hex()),
            department_id: department.map(|department| department.to_hex()),
            service_name: None,
            user_authorized: None,
            exp,
        };

        let claims = match self {
            Auth::Service(name, user_auth) => Claims {
                role: TokenRole::Service,
                user_id: None,
                department_id: None,
                service_name: Some(*name),
                user_authorized: Some(*user_auth),
                exp,
            },
            Auth::Admin(id) => user(TokenRole::Admin, id, None),
            Auth::Municipal(id) => user(TokenRole::Municipal, id, None),
            Auth::Department(id, department) => user(TokenRole::Department, id, Some(department)),
            Auth::Citizen(id) => user(TokenRole::Citizen, id, None),
            Auth::None => {
                return Err(anyhow::anyhow!("Cannot create token for Auth::None").code(500))
            }
        };

        jsonwebtoken::encode(&header, &claims, &EncodingKey::from_secret(secret()?))
            .map_err(|err| anyhow::anyhow!("Failed to encode token: {}", err).code(500))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn department_token_keeps_department() {
        std::env::set_var("JWT_SECRET", "test-secret");
        let auth = Auth::Department(ObjectId::new(), ObjectId::new());
        let token = auth.to_token().unwrap();
        assert_eq!(Auth::from_token(&token).unwrap(), Some(auth));
    }

    #[test]
    fn tampered_token_is_rejected() {
        std::env::set_var("JWT_SECRET", "test-secret");
        let token = Auth::Citizen(ObjectId::new()).to_token().unwrap();
        let tampered = format!("{}x", token);
        let err = Auth::from_token(&tampered).unwrap_err();
        assert_eq!(err.code, 401);
    }

    #[test]
    fn anonymous_callers_get_unauthorized() {
        assert_eq!(Auth::None.forbidden("nope").code, 401);
        assert_eq!(Auth::Citizen(ObjectId::new()).forbidden("nope").code, 403);
        assert!(Auth::None.user_id().is_err());
    }
}
