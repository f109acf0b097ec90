//! Identity reconciliation service.
//!
//! Authenticates users through OAuth2 providers, reconciles the returned
//! claims onto durable local user records (linking additional providers
//! to existing accounts instead of duplicating them), and maintains a
//! server-side session holding only the user id.

mod domain;
mod inbound;
mod outbound;
mod usecase;

use std::sync::Arc;

use app_core::config::Config;
use app_core::oauth::OAuthManager;
use app_core::uid::Generator;
use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::Pool;
pub use inbound::router::create_router;
pub use inbound::state::IdentityState;
use sea_orm::DatabaseConnection;
use tower_cookies::Key;

use crate::outbound::orm::IdentityOrm;
use crate::outbound::session::SessionRedis;
use crate::usecase::account::AccountService;
use crate::usecase::login::LoginService;
use crate::usecase::reconcile::IdentityReconciler;

pub struct Dependency {
    pub db: Arc<DatabaseConnection>,
    pub rds: Pool<RedisConnectionManager>,
    pub config: Arc<Config>,
    pub uid: Arc<dyn Generator>,
    pub oauth: OAuthManager,
    pub cookie_key: Key,
}

pub fn new(dep: Dependency) -> IdentityState {
    let session = Arc::new(SessionRedis::new(dep.rds));
    let store = Arc::new(IdentityOrm::new(dep.db, dep.uid));

    let reconciler = Arc::new(IdentityReconciler::new(store.clone(), store.clone()));
    let login_svc = Arc::new(LoginService::new(dep.config.clone(), dep.oauth, reconciler, session.clone()));
    let account_svc = Arc::new(AccountService::new(store, session));

    IdentityState::new(dep.cookie_key, dep.config, login_svc, account_svc)
}
