use std::sync::Arc;

use app_core::config::Config;
use app_core::oauth::OAuthManager;
use async_trait::async_trait;
use uuid::Uuid;
use validator::Validate;

use crate::domain::entity::claims::IdentityClaims;
use crate::domain::error::IdentityError;
use crate::domain::inout::prelude::*;
use crate::outbound::session::SessionStore;
use crate::usecase::reconcile::Reconciler;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait LoginUseCase: Send + Sync {
    /// Starts the handshake for one provider.
    async fn authorize(&self, input: AuthorizeInput) -> Result<AuthorizeOutput, IdentityError>;

    /// Completes the handshake: exchanges the code, normalizes the
    /// returned claims, reconciles them onto a local user, and binds a
    /// fresh session to that user.
    async fn callback(&self, input: CallbackInput) -> Result<CallbackOutput, IdentityError>;
}

pub struct LoginService {
    config: Arc<Config>,
    oauth: OAuthManager,
    reconciler: Arc<dyn Reconciler>,
    session: Arc<dyn SessionStore>,
}

impl LoginService {
    pub fn new(
        config: Arc<Config>,
        oauth: OAuthManager,
        reconciler: Arc<dyn Reconciler>,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        Self { config, oauth, reconciler, session }
    }
}

#[async_trait]
impl LoginUseCase for LoginService {
    async fn authorize(&self, input: AuthorizeInput) -> Result<AuthorizeOutput, IdentityError> {
        let client = self.oauth.get_provider(input.provider.as_str())?;
        let details = client.authorization_details();

        Ok(AuthorizeOutput {
            auth_url: details.url,
            csrf_token: details.csrf_token,
            pkce_verifier: details.pkce_verifier,
        })
    }

    async fn callback(&self, input: CallbackInput) -> Result<CallbackOutput, IdentityError> {
        input.validate()?;

        let client = self.oauth.get_provider(input.provider.as_str())?;
        let access_token = client.exchange_code(input.code, input.pkce_verifier).await?;
        let attributes = client.fetch_claims(&access_token).await?;

        let claims = IdentityClaims::normalize(input.provider, &attributes)?;
        let subject_id = claims.subject_id.clone();
        let user = self.reconciler.reconcile(claims).await?;

        let session_token = Uuid::new_v4().to_string();
        let ttl_secs = self.config.get::<u64>("session.ttl_secs")?;
        self.session.bind(&session_token, user.id, ttl_secs).await?;

        tracing::info!(
            user_id = user.id,
            provider = %input.provider,
            subject = %subject_id,
            "session bound for reconciled identity"
        );

        Ok(CallbackOutput { session_token, user })
    }
}
