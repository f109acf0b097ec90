use async_trait::async_trait;

use crate::domain::entity::provider_link::{Provider, ProviderLink};
use crate::domain::entity::user::User;
use crate::domain::error::IdentityError;

/// Durable store for user profile records.
///
/// The store itself enforces email uniqueness; a violated constraint
/// surfaces as `IdentityError::InvariantViolation` so callers can treat
/// it as a concurrency signal.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait UserStore: Send + Sync {
    /// Looks up a user by the unique email column.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, IdentityError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, IdentityError>;

    /// Inserts the user when it carries no id yet (assigning one and
    /// letting the store default `created_at`), updates it otherwise.
    /// Updates always refresh `updated_at`. The email column is written
    /// only on insert; it is immutable after creation.
    async fn save(&self, user: User) -> Result<User, IdentityError>;
}

/// Durable store for provider-identity links.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ProviderLinkStore: Send + Sync {
    /// Looks up the link anchoring a returning external identity.
    async fn find_by_provider_and_subject(
        &self,
        provider: Provider,
        subject_id: &str,
    ) -> Result<Option<ProviderLink>, IdentityError>;

    /// Persists a new link. Links are never mutated after creation; the
    /// `(provider, provider_user_id)` unique constraint rejects
    /// duplicates as `InvariantViolation`.
    async fn save(&self, link: ProviderLink) -> Result<ProviderLink, IdentityError>;
}
