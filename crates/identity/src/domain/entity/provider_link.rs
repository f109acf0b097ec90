use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::claims::IdentityClaims;
use crate::domain::error::IdentityError;

/// The identity providers this service can authenticate against.
///
/// The callback adapter parses the path segment into this enum before
/// anything else runs; unrecognized names never reach the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Google,
    Github,
}

impl Provider {
    /// The lowercase name used in URLs, config keys, and the
    /// `provider_links.provider` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Github => "github",
        }
    }
}

impl FromStr for Provider {
    type Err = IdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "google" => Ok(Provider::Google),
            "github" => Ok(Provider::Github),
            other => Err(IdentityError::UnknownProvider(other.to_string())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A durable association between a local user and one external identity.
/// The pair `(provider, provider_user_id)` is unique across all links and
/// anchors returning users.
#[derive(Debug, Clone)]
pub struct ProviderLink {
    pub id: i64,
    pub user_id: i64,
    pub provider: Provider,
    pub provider_user_id: String,
    pub provider_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ProviderLink {
    /// A link not yet persisted; the store assigns id and timestamp on
    /// save.
    pub fn for_user(user_id: i64, claims: &IdentityClaims) -> Self {
        Self {
            id: 0,
            user_id,
            provider: claims.provider,
            provider_user_id: claims.subject_id.clone(),
            provider_email: claims.email.clone(),
            created_at: DateTime::default(),
        }
    }
}
