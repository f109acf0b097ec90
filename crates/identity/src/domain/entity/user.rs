use chrono::{DateTime, Utc};

use super::claims::IdentityClaims;

/// A local user account. Owned by the user store; sessions and provider
/// links reference it by id only.
///
/// The email is unique and immutable after creation. `display_name` and
/// the optional profile fields are user-editable, so provider data may
/// only fill them while they are empty.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Builds an unsaved user from freshly normalized claims. The store
    /// assigns the id and timestamps on first save.
    pub fn from_claims(claims: &IdentityClaims) -> Self {
        let email = claims.email_or_placeholder();
        let display_name = claims
            .display_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| email.clone());

        Self {
            id: 0,
            email,
            display_name,
            avatar_url: claims.avatar_url.clone(),
            bio: None,
            created_at: DateTime::default(),
            updated_at: DateTime::default(),
        }
    }

    /// Whether the store has assigned this user an id yet.
    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }
}
