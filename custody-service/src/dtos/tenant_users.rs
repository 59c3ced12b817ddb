use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::Role;

#[derive(Deserialize, Validate, ToSchema)]
pub struct InviteUserRequest {
    #[validate(length(min = 3, max = 64, message = "Username must be 3-64 characters"))]
    #[schema(example = "mark")]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "mark@farm-a.example")]
    pub email: String,

    #[validate(length(min = 1, max = 255, message = "Display name is required"))]
    #[schema(example = "Mark Manager")]
    pub display_name: String,

    pub role: Role,

    /// Checked against the strength rules before hashing.
    pub initial_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeRoleRequest {
    pub role: Role,
}
