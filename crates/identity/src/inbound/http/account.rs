use app_core::error::AppError;
use app_core::extractors::AppJson;
use axum::Json;
use axum::debug_handler;
use axum::extract::State;
use axum::response::IntoResponse;
use tower_cookies::{Cookie, Cookies};

use super::{COOKIE_SESSION, session_token};
use crate::domain::inout::prelude::*;
use crate::inbound::model::prelude::*;
use crate::inbound::state::IdentityState;

/// Always answers 200: the frontend polls this to decide whether a user
/// is signed in, so "no session" is data, not an error.
#[debug_handler]
pub async fn current_user(State(state): State<IdentityState>, cookies: Cookies) -> Result<impl IntoResponse, AppError> {
    let session_token = session_token(&cookies, &state.cookie_key);
    let output = state.account.current_user(CurrentUserInput { session_token }).await?;

    Ok(Json(CurrentUserResponse {
        authenticated: output.user.is_some(),
        user: output.user.map(UserResponse::from),
    }))
}

#[debug_handler]
pub async fn update_profile(
    State(state): State<IdentityState>,
    cookies: Cookies,
    AppJson(req): AppJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session_token = session_token(&cookies, &state.cookie_key);
    let output = state
        .account
        .update_profile(UpdateProfileInput { session_token, display_name: req.display_name, bio: req.bio })
        .await?;

    Ok(Json(UpdateProfileResponse { success: true, user: UserResponse::from(output.user) }))
}

#[debug_handler]
pub async fn logout(State(state): State<IdentityState>, cookies: Cookies) -> Result<impl IntoResponse, AppError> {
    let session_token = session_token(&cookies, &state.cookie_key);
    let output = state.account.logout(LogoutInput { session_token }).await?;

    cookies
        .private(&state.cookie_key)
        .remove(Cookie::build((COOKIE_SESSION, "")).path("/").build());

    Ok(Json(LogoutResponse { success: output.success, message: "Logged out successfully".to_string() }))
}
