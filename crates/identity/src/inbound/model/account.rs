use serde::{Deserialize, Serialize};

use crate::domain::entity::user::User;

// Field names are camelCase: the frontend consumes these shapes as-is.

// ╔════════════════════════════╗
// ║       Current User         ║
// ╚════════════════════════════╝

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub avatar_url: String,
    pub bio: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            avatar_url: user.avatar_url.unwrap_or_default(),
            bio: user.bio.unwrap_or_default(),
            created_at: user.created_at.to_rfc3339(),
            updated_at: user.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct CurrentUserResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
}

// ╔════════════════════════════╗
// ║      Update Profile        ║
// ╚════════════════════════════╝

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
}

#[derive(Serialize)]
pub struct UpdateProfileResponse {
    pub success: bool,
    pub user: UserResponse,
}

// ╔════════════════════════════╗
// ║          Logout            ║
// ╚════════════════════════════╝

#[derive(Serialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}
