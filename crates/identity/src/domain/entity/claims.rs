use app_core::oauth::RawClaims;

use super::provider_link::Provider;
use crate::domain::error::IdentityError;

/// Canonical identity assertions extracted from one provider callback.
/// Constructed per callback and discarded after reconciliation; never
/// persisted.
#[derive(Debug, Clone)]
pub struct IdentityClaims {
    pub provider: Provider,
    pub subject_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl IdentityClaims {
    /// Converts a provider-shaped attribute map into canonical claims.
    ///
    /// Google callbacks must carry `sub` and `email`. GitHub callbacks
    /// must carry `id` (numeric or string); GitHub may withhold the email
    /// entirely, which is a valid claims state here, not an error.
    /// Emails are trimmed and lowercased so lookups compare consistently.
    pub fn normalize(provider: Provider, attrs: &RawClaims) -> Result<Self, IdentityError> {
        match provider {
            Provider::Google => Ok(Self {
                provider,
                subject_id: required_text(provider, attrs, "sub")?,
                email: Some(required_text(provider, attrs, "email")?.to_lowercase()),
                display_name: text(attrs, "name"),
                avatar_url: text(attrs, "picture"),
            }),
            Provider::Github => Ok(Self {
                provider,
                subject_id: required_id(provider, attrs, "id")?,
                email: text(attrs, "email").map(|email| email.to_lowercase()),
                display_name: text(attrs, "name"),
                avatar_url: text(attrs, "avatar_url"),
            }),
        }
    }

    /// The email to store for this identity. When the provider withheld
    /// one, a deterministic placeholder is synthesized; the `.invalid`
    /// TLD guarantees it can never collide with a deliverable address,
    /// and determinism lets the email unique constraint catch concurrent
    /// double-submits of the same claims.
    pub fn email_or_placeholder(&self) -> String {
        self.email
            .clone()
            .unwrap_or_else(|| format!("{}-{}@users.noreply.invalid", self.provider, self.subject_id))
    }
}

/// A present, non-blank string attribute; blank values count as absent.
fn text(attrs: &RawClaims, key: &str) -> Option<String> {
    attrs
        .get(key)
        .and_then(|value| value.as_str())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

fn required_text(provider: Provider, attrs: &RawClaims, claim: &'static str) -> Result<String, IdentityError> {
    text(attrs, claim).ok_or(IdentityError::MissingRequiredClaim { provider, claim })
}

/// GitHub sends its user id as a JSON number; tolerate a string form too.
fn required_id(provider: Provider, attrs: &RawClaims, claim: &'static str) -> Result<String, IdentityError> {
    match attrs.get(claim) {
        Some(value) if value.is_number() => Ok(value.to_string()),
        _ => required_text(provider, attrs, claim),
    }
}
