use crate::errors::CatalogError;
use crate::models::{NewUser, User, UserUpdate};
use sqlx::PgPool;

type Result<T> = std::result::Result<T, CatalogError>;

const USER_COLUMNS: &str =
    "id, email, firstname, lastname, password_hash, role, active, created_at, updated_at";

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        let result = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, firstname, lastname, password_hash, role, active) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.email)
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.active)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn list_users(&self, limit: Option<u32>, offset: Option<u32>) -> Result<Vec<User>> {
        let limit = limit.unwrap_or(50);
        let offset = offset.unwrap_or(0);

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY id LIMIT $1 OFFSET $2",
            USER_COLUMNS
        ))
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    pub async fn list_emails(&self) -> Result<Vec<String>> {
        let emails = sqlx::query_scalar::<_, String>("SELECT email FROM users ORDER BY email")
            .fetch_all(&self.pool)
            .await?;

        Ok(emails)
    }

    /// Updates profile fields; the password hash is replaced only when given.
    pub async fn update_user(&self, id: i32, update: &UserUpdate) -> Result<Option<User>> {
        let updated_user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET email = $2, firstname = $3, lastname = $4, role = $5, active = $6, \
             password_hash = COALESCE($7, password_hash), updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(&update.email)
        .bind(&update.firstname)
        .bind(&update.lastname)
        .bind(update.role)
        .bind(update.active)
        .bind(&update.password_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated_user)
    }

    pub async fn delete_user(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Assigns a project; assigning twice is a no-op.
    pub async fn assign_project(&self, user_id: i32, project_id: i32) -> Result<()> {
        sqlx::query(
            "INSERT INTO userprojects (user_id, project_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(project_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn unassign_project(&self, user_id: i32, project_id: i32) -> Result<()> {
        sqlx::query("DELETE FROM userprojects WHERE user_id = $1 AND project_id = $2")
            .bind(user_id)
            .bind(project_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn project_ids_for_user(&self, user_id: i32) -> Result<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT project_id FROM userprojects WHERE user_id = $1 ORDER BY project_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
