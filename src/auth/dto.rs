use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::validation::{max_len, min_len, required, Validate};

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub account: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), AppError> {
        required("account", &self.account)?;
        required("password", &self.password)
    }
}

/// Request body for student self-registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    #[serde(alias = "externalId")]
    pub student_no: String,
    pub username: String,
    pub password: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), AppError> {
        required("name", &self.name)?;
        required("studentNo", &self.student_no)?;
        required("username", &self.username)?;
        required("password", &self.password)?;
        max_len("name", &self.name, 100)?;
        max_len("studentNo", &self.student_no, 50)?;
        max_len("username", &self.username, 50)?;
        min_len("password", &self.password, 6)
    }
}

/// Returned after a successful login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}
