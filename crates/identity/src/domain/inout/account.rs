use validator::Validate;

use crate::domain::entity::user::User;

// ╔════════════════════════════╗
// ║       Current User         ║
// ╚════════════════════════════╝

#[derive(Debug)]
pub struct CurrentUserInput {
    pub session_token: Option<String>,
}

#[derive(Debug)]
pub struct CurrentUserOutput {
    /// `None` when the request carries no live session.
    pub user: Option<User>,
}

// ╔════════════════════════════╗
// ║      Update Profile        ║
// ╚════════════════════════════╝

#[derive(Debug, Validate)]
pub struct UpdateProfileInput {
    pub session_token: Option<String>,

    #[validate(length(min = 1, max = 100, message = "display name must be between 1 and 100 characters"))]
    pub display_name: Option<String>,

    #[validate(length(max = 500, message = "bio must be at most 500 characters"))]
    pub bio: Option<String>,
}

#[derive(Debug)]
pub struct UpdateProfileOutput {
    pub user: User,
}

// ╔════════════════════════════╗
// ║          Logout            ║
// ╚════════════════════════════╝

#[derive(Debug)]
pub struct LogoutInput {
    pub session_token: Option<String>,
}

#[derive(Debug)]
pub struct LogoutOutput {
    pub success: bool,
}
