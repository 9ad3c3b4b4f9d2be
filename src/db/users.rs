// src/db/users.rs

use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{Role, User};

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1 AND active = true")
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn insert(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
    name: &str,
    role: Role,
    unit_id: Option<Uuid>,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"INSERT INTO users (email, password_hash, name, role, unit_id)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING *"#,
    )
    .bind(email.trim().to_lowercase())
    .bind(password_hash)
    .bind(name.trim())
    .bind(role)
    .bind(unit_id)
    .fetch_one(pool)
    .await
}

/// Ids of the users that operate a unit (its operator plus every unit-role account).
pub async fn unit_recipients(
    executor: impl PgExecutor<'_>,
    unit_id: Uuid,
) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar(
        r#"SELECT id FROM users WHERE active = true AND unit_id = $1
           UNION
           SELECT operator_user_id FROM units WHERE id = $1 AND operator_user_id IS NOT NULL"#,
    )
    .bind(unit_id)
    .fetch_all(executor)
    .await
}

pub async fn headquarters_recipients(executor: impl PgExecutor<'_>) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM users WHERE active = true AND role = 'headquarters'")
        .fetch_all(executor)
        .await
}
