use std::sync::Arc;

use app_core::config::Config;
use tower_cookies::Key;

use crate::usecase::account::AccountUseCase;
use crate::usecase::login::LoginUseCase;

#[derive(Clone)]
pub struct IdentityState {
    pub cookie_key: Key,
    pub config: Arc<Config>,
    pub login: Arc<dyn LoginUseCase>,
    pub account: Arc<dyn AccountUseCase>,
}

impl IdentityState {
    pub fn new(
        cookie_key: Key,
        config: Arc<Config>,
        login: Arc<dyn LoginUseCase>,
        account: Arc<dyn AccountUseCase>,
    ) -> Self {
        Self { cookie_key, config, login, account }
    }
}
