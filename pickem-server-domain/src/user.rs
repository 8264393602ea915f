use std::{str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{ServiceError, ServiceResult};

pub type UserId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(ServiceError::Internal(format!("unknown role '{other}'"))),
        }
    }
}

/// Pool participant. The password hash is opaque to this crate; hashing and
/// verification live with the auth collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
}

pub type ArcUserRepository = Arc<Box<dyn UserRepository + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait UserRepository {
    async fn get_user_by_id(&self, id: UserId) -> ServiceResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> ServiceResult<Option<User>>;
    async fn get_users_by_ids(&self, ids: &[UserId]) -> ServiceResult<Vec<User>>;

    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, user: &NewUser) -> ServiceResult<User>;
}
