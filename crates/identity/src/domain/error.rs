use app_core::config::ConfigError;
use app_core::error::AppError;
use app_core::oauth::OAuthError;
use app_core::uid::SnowflakeError;
use bb8_redis::bb8;
use bb8_redis::redis;
use thiserror::Error;

use super::entity::provider_link::Provider;

/// Failure taxonomy for the identity-reconciliation flow.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider returned insufficient data to identify the subject.
    #[error("{provider} callback is missing required claim `{claim}`")]
    MissingRequiredClaim { provider: Provider, claim: &'static str },

    /// A callback path named a provider this service does not know.
    /// Raised at the adapter edge; never reaches the reconciler.
    #[error("unknown identity provider `{0}`")]
    UnknownProvider(String),

    /// A storage-level uniqueness constraint fired. Under concurrent
    /// callbacks this is a race signal, not corruption: the record the
    /// write collided with already exists, so a retried lookup finds it.
    #[error("uniqueness invariant violated: {0}")]
    InvariantViolation(String),

    /// The persistent store could not complete an operation.
    #[error("persistent store failure")]
    Persistence(#[source] sea_orm::DbErr),

    /// Token exchange or userinfo fetch against the provider failed.
    #[error("provider handshake failed: {0}")]
    Handshake(#[from] OAuthError),

    #[error("session store failure")]
    Session(#[from] redis::RedisError),

    #[error("session store pool failure")]
    SessionPool(#[from] bb8::RunError<redis::RedisError>),

    #[error("id generation failed")]
    IdGeneration(#[from] SnowflakeError),

    #[error("configuration read failed")]
    Config(#[from] ConfigError),

    #[error("validation failed")]
    Validation(#[from] validator::ValidationErrors),
}

impl IdentityError {
    /// The error class carried on the failure redirect.
    ///
    /// Callers never branch on variants; they forward this value as the
    /// `error` query parameter of the failure URL.
    pub fn classification(&self) -> &'static str {
        match self {
            IdentityError::UnknownProvider(_) | IdentityError::Handshake(OAuthError::ProviderNotFound(_)) => {
                "unknown_provider"
            },
            IdentityError::InvariantViolation(_)
            | IdentityError::Persistence(_)
            | IdentityError::IdGeneration(_) => "user_creation_failed",
            _ => "authentication_failed",
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::MissingRequiredClaim { .. } => AppError::RequestFormat(err.to_string()),
            IdentityError::UnknownProvider(_) => AppError::NotFound(err.to_string()),
            IdentityError::InvariantViolation(reason) => AppError::Conflict(reason),
            IdentityError::Persistence(db) => AppError::Database(db),
            IdentityError::Handshake(oauth) => AppError::OAuth(oauth),
            IdentityError::Session(redis) => AppError::Redis(redis),
            IdentityError::SessionPool(pool) => AppError::RedisPool(pool),
            IdentityError::IdGeneration(uid) => AppError::IdGeneration(uid),
            IdentityError::Config(config) => AppError::Config(config),
            IdentityError::Validation(errors) => AppError::Validation(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_of_unknown_provider() {
        assert_eq!(IdentityError::UnknownProvider("gitlab".into()).classification(), "unknown_provider");
        assert_eq!(
            IdentityError::Handshake(OAuthError::ProviderNotFound("github".into())).classification(),
            "unknown_provider"
        );
    }

    #[test]
    fn test_classification_of_store_failures() {
        assert_eq!(
            IdentityError::InvariantViolation("users_email_key".into()).classification(),
            "user_creation_failed"
        );
        assert_eq!(
            IdentityError::Persistence(sea_orm::DbErr::Custom("down".into())).classification(),
            "user_creation_failed"
        );
    }

    #[test]
    fn test_everything_else_is_authentication_failed() {
        let missing = IdentityError::MissingRequiredClaim { provider: Provider::Google, claim: "email" };
        assert_eq!(missing.classification(), "authentication_failed");

        let handshake = IdentityError::Handshake(OAuthError::TokenExchange("denied".into()));
        assert_eq!(handshake.classification(), "authentication_failed");
    }

    #[test]
    fn test_bridge_into_app_error() {
        let conflict = AppError::from(IdentityError::InvariantViolation("users_email_key".into()));
        assert!(matches!(conflict, AppError::Conflict(_)));

        let not_found = AppError::from(IdentityError::UnknownProvider("gitlab".into()));
        assert!(matches!(not_found, AppError::NotFound(_)));

        let db = AppError::from(IdentityError::Persistence(sea_orm::DbErr::Custom("down".into())));
        assert!(matches!(db, AppError::Database(_)));
    }
}
