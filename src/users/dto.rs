use serde::Deserialize;

use super::model::{Role, Status};
use crate::error::AppError;
use crate::validation::{email, max_len, min_len, required, Validate};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

impl Validate for CreateUserRequest {
    fn validate(&self) -> Result<(), AppError> {
        required("username", &self.username)?;
        max_len("username", &self.username, 50)?;
        required("email", &self.email)?;
        email("email", &self.email)?;
        max_len("email", &self.email, 255)?;
        min_len("password", &self.password, 6)
    }
}

/// Partial update; absent fields are left as they are.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub status: Option<Status>,
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), AppError> {
        if let Some(value) = &self.email {
            email("email", value)?;
            max_len("email", value, 255)?;
        }
        if let Some(password) = &self.password {
            min_len("password", password, 6)?;
        }
        Ok(())
    }
}
