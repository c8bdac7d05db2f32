//! Authentication API DTOs
//!
//! Login, logout and password-change payloads. The access token itself never
//! appears in a body: the backend returns it in the `Authorization` header.

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use crate::common::{Claims, LoginData, Role};

// ============================================================================
// Login DTOs
// ============================================================================

/// Body of `POST /user/login`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 255))]
    pub password: String,
}

// ============================================================================
// Password DTOs
// ============================================================================

/// Body of `PATCH /user/change-password`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}
