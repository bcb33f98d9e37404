use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,               // stored lowercase, unique
    pub email: String,                  // stored lowercase, unique
    pub full_name: String,
    pub avatar: String,                 // object URL
    pub cover_image: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,          // Argon2 hash, not exposed in JSON
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,  // single slot, overwritten on issue
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields needed to insert a new user.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub full_name: &'a str,
    pub avatar: &'a str,
    pub cover_image: Option<&'a str>,
    pub password_hash: &'a str,
}
