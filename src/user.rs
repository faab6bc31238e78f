use serde::Serialize;
use sqlx::FromRow;

use crate::time::Timestamp;

#[derive(Debug, FromRow)]
pub struct User {
    pub user_id: i64,
    pub login: String,
    pub name: String,
    pub password: String, // bcrypt hash
    pub admin: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// What the admin panel gets to see of a user.
#[derive(Debug, Serialize, FromRow, PartialEq, Eq)]
pub struct UserSummary {
    pub user_id: i64,
    pub login: String,
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: Timestamp,
}

#[derive(Debug)]
pub struct NewUser {
    pub login: String,
    pub name: String,
    pub pwhash: String,
    pub admin: bool,
}
