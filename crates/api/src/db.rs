//! User identity persistence
//!
//! The auth core owns a single table. Queries are raw SQL through sqlx;
//! each flow performs at most one read-modify-write on a user row per
//! request, so nothing here opens a transaction.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiResult;

/// Full user row. An account always has at least one credential path:
/// `password_hash` for local accounts, `oauth_id` for Google accounts.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub oauth_id: Option<String>,
    pub email_verified: bool,
    pub role: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// What the authenticated user sees of themselves.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SelfProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

/// What anyone can see of a user. No email.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

const USER_COLUMNS: &str = "id, name, email, password_hash, oauth_id, email_verified, role, \
                            phone, bio, avatar_url, created_at, updated_at";

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> ApiResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> ApiResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_user_by_oauth_id(pool: &PgPool, oauth_id: &str) -> ApiResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE oauth_id = $1"
    ))
    .bind(oauth_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Create a password account. Starts unverified.
pub async fn create_user(
    pool: &PgPool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> ApiResult<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (id, name, email, password_hash, email_verified, role, created_at, updated_at)
        VALUES ($1, $2, $3, $4, FALSE, 'student', NOW(), NOW())
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;
    Ok(user)
}

/// Create an account from a Google profile. Google has already verified
/// the address, so the row starts verified and has no password hash.
pub async fn create_oauth_user(
    pool: &PgPool,
    name: &str,
    email: &str,
    oauth_id: &str,
) -> ApiResult<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (id, name, email, oauth_id, email_verified, role, created_at, updated_at)
        VALUES ($1, $2, $3, $4, TRUE, 'student', NOW(), NOW())
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(oauth_id)
    .fetch_one(pool)
    .await?;
    Ok(user)
}

/// Fields a user may change about their own profile.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.bio.is_none() && self.avatar_url.is_none()
    }
}

pub async fn update_user_profile(
    pool: &PgPool,
    id: Uuid,
    update: &ProfileUpdate,
) -> ApiResult<Option<SelfProfile>> {
    let mut builder = sqlx::QueryBuilder::new("UPDATE users SET updated_at = NOW()");
    if let Some(name) = &update.name {
        builder.push(", name = ").push_bind(name);
    }
    if let Some(bio) = &update.bio {
        builder.push(", bio = ").push_bind(bio);
    }
    if let Some(avatar_url) = &update.avatar_url {
        builder.push(", avatar_url = ").push_bind(avatar_url);
    }
    builder
        .push(" WHERE id = ")
        .push_bind(id)
        .push(" RETURNING id, name, email, phone, bio, avatar_url");

    let profile = builder
        .build_query_as::<SelfProfile>()
        .fetch_optional(pool)
        .await?;
    Ok(profile)
}

/// Flip the verification flag. Happens exactly once per account, on
/// token consumption.
pub async fn mark_email_verified(pool: &PgPool, id: Uuid) -> ApiResult<()> {
    sqlx::query("UPDATE users SET email_verified = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_password_hash(pool: &PgPool, id: Uuid, password_hash: &str) -> ApiResult<()> {
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_phone(pool: &PgPool, id: Uuid, phone: &str) -> ApiResult<Option<SelfProfile>> {
    let profile = sqlx::query_as::<_, SelfProfile>(
        r#"
        UPDATE users SET phone = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING id, name, email, phone, bio, avatar_url
        "#,
    )
    .bind(id)
    .bind(phone)
    .fetch_optional(pool)
    .await?;
    Ok(profile)
}

pub async fn delete_user(pool: &PgPool, id: Uuid) -> ApiResult<bool> {
    let rows = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(rows > 0)
}

pub async fn fetch_self_profile(pool: &PgPool, id: Uuid) -> ApiResult<Option<SelfProfile>> {
    let profile = sqlx::query_as::<_, SelfProfile>(
        "SELECT id, name, email, phone, bio, avatar_url FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(profile)
}

pub async fn fetch_public_profile(pool: &PgPool, id: Uuid) -> ApiResult<Option<PublicProfile>> {
    let profile = sqlx::query_as::<_, PublicProfile>(
        "SELECT id, name, phone, bio, avatar_url FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(profile)
}
