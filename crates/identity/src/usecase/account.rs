use std::sync::Arc;

use app_core::error::AppError;
use async_trait::async_trait;
use validator::Validate;

use crate::domain::inout::prelude::*;
use crate::outbound::repository::UserStore;
use crate::outbound::session::SessionStore;

const NOT_AUTHENTICATED_MSG: &str = "User not authenticated";
const USER_NOT_FOUND_MSG: &str = "User not found";

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait AccountUseCase: Send + Sync {
    /// Resolves the session to its user, if any. Never fails for a
    /// missing or expired session; that state is the `None` answer.
    async fn current_user(&self, input: CurrentUserInput) -> Result<CurrentUserOutput, AppError>;

    /// Applies display-name/bio edits for the session user. Email and
    /// provider links never change through this path.
    async fn update_profile(&self, input: UpdateProfileInput) -> Result<UpdateProfileOutput, AppError>;

    /// Destroys the session. Succeeds with or without one.
    async fn logout(&self, input: LogoutInput) -> Result<LogoutOutput, AppError>;
}

pub struct AccountService {
    users: Arc<dyn UserStore>,
    session: Arc<dyn SessionStore>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>, session: Arc<dyn SessionStore>) -> Self {
        Self { users, session }
    }

    async fn resolve_session(&self, token: &Option<String>) -> Result<Option<i64>, AppError> {
        match token {
            Some(token) => Ok(self.session.find(token).await?),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AccountUseCase for AccountService {
    async fn current_user(&self, input: CurrentUserInput) -> Result<CurrentUserOutput, AppError> {
        let Some(user_id) = self.resolve_session(&input.session_token).await? else {
            return Ok(CurrentUserOutput { user: None });
        };

        Ok(CurrentUserOutput { user: self.users.find_by_id(user_id).await? })
    }

    async fn update_profile(&self, input: UpdateProfileInput) -> Result<UpdateProfileOutput, AppError> {
        input.validate()?;

        let user_id = self
            .resolve_session(&input.session_token)
            .await?
            .ok_or_else(|| AppError::Unauthorized(NOT_AUTHENTICATED_MSG.to_string()))?;

        let mut user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND_MSG.to_string()))?;

        if let Some(display_name) = input.display_name {
            user.display_name = display_name;
        }
        if let Some(bio) = input.bio {
            user.bio = Some(bio);
        }

        let user = self.users.save(user).await?;
        tracing::info!(user_id = user.id, "profile updated");

        Ok(UpdateProfileOutput { user })
    }

    async fn logout(&self, input: LogoutInput) -> Result<LogoutOutput, AppError> {
        if let Some(token) = &input.session_token {
            self.session.clear(token).await?;
        }

        Ok(LogoutOutput { success: true })
    }
}
