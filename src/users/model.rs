use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Student,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Active,
    Suspended,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Student => "student",
        }
    }
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Suspended => "suspended",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown {field} value {value:?} in users row")]
pub struct BadColumn {
    field: &'static str,
    value: String,
}

impl TryFrom<&str> for Role {
    type Error = BadColumn;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "admin" => Ok(Role::Admin),
            "student" => Ok(Role::Student),
            other => Err(BadColumn { field: "role", value: other.into() }),
        }
    }
}

impl TryFrom<&str> for Status {
    type Error = BadColumn;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(Status::Active),
            "suspended" => Ok(Status::Suspended),
            other => Err(BadColumn { field: "status", value: other.into() }),
        }
    }
}

/// A user account. The password hash never leaves the process.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub account: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub student_no: Option<String>,
    pub role: Role,
    pub status: Status,
    #[serde(with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Raw `users` row as stored in postgres.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub account: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub student_no: Option<String>,
    pub role: String,
    pub status: String,
    pub last_login_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = BadColumn;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let id = u64::try_from(r.id).map_err(|_| BadColumn {
            field: "id",
            value: r.id.to_string(),
        })?;
        Ok(Self {
            id,
            role: Role::try_from(r.role.as_str())?,
            status: Status::try_from(r.status.as_str())?,
            account: r.account,
            username: r.username,
            email: r.email,
            password_hash: r.password_hash,
            name: r.name,
            student_no: r.student_no,
            last_login_at: r.last_login_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Fields for a new `users` row; id and timestamps come from the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub account: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub student_no: Option<String>,
    pub role: Role,
    pub status: Status,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub status: Option<Status>,
}
