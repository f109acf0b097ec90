use oauth2::{CsrfToken, PkceCodeVerifier};
use validator::Validate;

use crate::domain::entity::provider_link::Provider;
use crate::domain::entity::user::User;

// ╔════════════════════════════╗
// ║        Authorize           ║
// ╚════════════════════════════╝

#[derive(Debug)]
pub struct AuthorizeInput {
    pub provider: Provider,
}

#[derive(Debug)]
pub struct AuthorizeOutput {
    pub auth_url: String,
    pub csrf_token: CsrfToken,
    pub pkce_verifier: PkceCodeVerifier,
}

// ╔════════════════════════════╗
// ║         Callback           ║
// ╚════════════════════════════╝

#[derive(Debug, Validate)]
pub struct CallbackInput {
    pub provider: Provider,

    #[validate(length(min = 1, message = "authorization code cannot be empty"))]
    pub code: String,

    pub pkce_verifier: String,
}

#[derive(Debug)]
pub struct CallbackOutput {
    pub session_token: String,
    pub user: User,
}
