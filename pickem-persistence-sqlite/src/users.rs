use pickem_server_domain::{
    ServiceError, ServiceResult,
    user::{NewUser, User, UserId, UserRepository},
};
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{internal, is_unique_violation};

pub struct SqliteUserRepository {
    pool: Pool<Sqlite>,
}

impl SqliteUserRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &SqliteRow) -> ServiceResult<User> {
    let role: String = row.try_get("role").map_err(internal)?;
    Ok(User {
        id: row.try_get("id").map_err(internal)?,
        email: row.try_get("email").map_err(internal)?,
        name: row.try_get("name").map_err(internal)?,
        password_hash: row.try_get("password_hash").map_err(internal)?,
        role: role.parse()?,
    })
}

#[async_trait::async_trait]
impl UserRepository for SqliteUserRepository {
    async fn get_user_by_id(&self, id: UserId) -> ServiceResult<Option<User>> {
        let row = sqlx::query("SELECT id, email, name, password_hash, role FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let row =
            sqlx::query("SELECT id, email, name, password_hash, role FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(internal)?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_users_by_ids(&self, ids: &[UserId]) -> ServiceResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = sqlx::QueryBuilder::<Sqlite>::new(
            "SELECT id, email, name, password_hash, role FROM users WHERE id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        builder.push(")");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        rows.iter().map(row_to_user).collect()
    }

    async fn create_user(&self, user: &NewUser) -> ServiceResult<User> {
        let res =
            sqlx::query("INSERT INTO users (email, name, password_hash, role) VALUES (?, ?, ?, ?)")
                .bind(&user.email)
                .bind(&user.name)
                .bind(&user.password_hash)
                .bind(user.role.as_str())
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        ServiceError::Conflict(format!("email {} is already registered", user.email))
                    } else {
                        internal(e)
                    }
                })?;

        Ok(User {
            id: res.last_insert_rowid(),
            email: user.email.clone(),
            name: user.name.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use pickem_server_domain::user::Role;

    use super::*;
    use crate::test_pool;

    fn admin() -> NewUser {
        NewUser {
            email: "commish@example.com".to_string(),
            name: "The Commissioner".to_string(),
            password_hash: "opaque".to_string(),
            role: Role::Admin,
        }
    }

    #[tokio::test]
    async fn create_and_fetch_by_id_and_email() {
        let repo = SqliteUserRepository::new(test_pool().await);
        let created = repo.create_user(&admin()).await.unwrap();

        let by_id = repo.get_user_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.role, Role::Admin);
        assert_eq!(by_id.password_hash, "opaque");

        let by_email = repo
            .get_user_by_email("commish@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, created.id);

        assert!(repo.get_user_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let repo = SqliteUserRepository::new(test_pool().await);
        repo.create_user(&admin()).await.unwrap();
        let err = repo.create_user(&admin()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn bulk_lookup_returns_only_known_ids() {
        let repo = SqliteUserRepository::new(test_pool().await);
        let a = repo.create_user(&admin()).await.unwrap();
        let users = repo.get_users_by_ids(&[a.id, 424242]).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, a.id);
        assert!(repo.get_users_by_ids(&[]).await.unwrap().is_empty());
    }
}
