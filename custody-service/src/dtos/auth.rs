use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::Identity;
use crate::services::{StrengthRating, StrengthReport};

#[derive(Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 255, message = "Username is required"))]
    #[schema(example = "olive")]
    pub username: String,

    /// Not length-validated here: an empty password is a failed login attempt
    /// and is audited as one.
    #[schema(example = "Correct-Horse-42")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub identity: Identity,
    #[schema(example = "2026-10-25T12:00:00Z")]
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 1, message = "New password is required"))]
    pub new_password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct StrengthRequest {
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StrengthResponse {
    pub is_valid: bool,
    #[schema(example = json!(["Password must contain at least one digit"]))]
    pub errors: Vec<String>,
    pub strength: StrengthRating,
}

impl From<StrengthReport> for StrengthResponse {
    fn from(report: StrengthReport) -> Self {
        Self {
            is_valid: report.is_valid,
            errors: report.messages(),
            strength: report.strength,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Logged out")]
    pub message: String,
}
