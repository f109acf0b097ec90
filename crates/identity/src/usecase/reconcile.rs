use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::entity::claims::IdentityClaims;
use crate::domain::entity::provider_link::ProviderLink;
use crate::domain::entity::user::User;
use crate::domain::error::IdentityError;
use crate::outbound::repository::{ProviderLinkStore, UserStore};

/// Maps incoming provider claims onto exactly one local user.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Reconciler: Send + Sync {
    async fn reconcile(&self, claims: IdentityClaims) -> Result<User, IdentityError>;
}

/// The reconciliation core.
///
/// One call is one logical transaction: the stores' unique constraints
/// arbitrate concurrent callbacks. A constraint violation means the
/// colliding record already exists, so the whole lookup sequence is
/// retried exactly once before the failure is surfaced.
pub struct IdentityReconciler {
    users: Arc<dyn UserStore>,
    links: Arc<dyn ProviderLinkStore>,
}

impl IdentityReconciler {
    pub fn new(users: Arc<dyn UserStore>, links: Arc<dyn ProviderLinkStore>) -> Self {
        Self { users, links }
    }

    async fn resolve(&self, claims: &IdentityClaims) -> Result<User, IdentityError> {
        if let Some(email) = &claims.email {
            // An email match always wins: a user who signed up through a
            // different provider under the same address is reused, never
            // duplicated.
            if let Some(user) = self.users.find_by_email(email).await? {
                return self.attach(user, claims).await;
            }
        } else if let Some(link) = self
            .links
            .find_by_provider_and_subject(claims.provider, &claims.subject_id)
            .await?
        {
            // Repeat login without an email claim: the link is the only
            // anchor for this identity.
            return self.users.find_by_id(link.user_id).await?.ok_or_else(|| {
                IdentityError::InvariantViolation(format!(
                    "provider link {} references missing user {}",
                    link.id, link.user_id
                ))
            });
        }

        self.create(claims).await
    }

    /// Links the claims' identity to an existing user and lets provider
    /// data fill profile gaps. First write wins: provider data never
    /// overwrites a user-edited profile.
    async fn attach(&self, mut user: User, claims: &IdentityClaims) -> Result<User, IdentityError> {
        let existing = self
            .links
            .find_by_provider_and_subject(claims.provider, &claims.subject_id)
            .await?;

        if existing.is_none() {
            self.links.save(ProviderLink::for_user(user.id, claims)).await?;
            tracing::info!(
                user_id = user.id,
                provider = %claims.provider,
                subject = %claims.subject_id,
                "linked provider to existing user"
            );
        }

        if user.display_name.trim().is_empty() {
            if let Some(display_name) = &claims.display_name {
                user.display_name = display_name.clone();
            }
        }
        if user.avatar_url.as_deref().is_none_or(str::is_empty) {
            user.avatar_url = claims.avatar_url.clone();
        }

        self.users.save(user).await
    }

    async fn create(&self, claims: &IdentityClaims) -> Result<User, IdentityError> {
        let user = self.users.save(User::from_claims(claims)).await?;
        self.links.save(ProviderLink::for_user(user.id, claims)).await?;

        tracing::info!(
            user_id = user.id,
            provider = %claims.provider,
            subject = %claims.subject_id,
            "created new user from provider claims"
        );

        Ok(user)
    }
}

#[async_trait]
impl Reconciler for IdentityReconciler {
    async fn reconcile(&self, claims: IdentityClaims) -> Result<User, IdentityError> {
        match self.resolve(&claims).await {
            Err(IdentityError::InvariantViolation(reason)) => {
                // A concurrent callback won the insert race; whatever we
                // collided with exists now, so one fresh lookup finds it.
                tracing::warn!(
                    provider = %claims.provider,
                    subject = %claims.subject_id,
                    %reason,
                    "uniqueness conflict during reconciliation, retrying lookup"
                );
                self.resolve(&claims).await
            },
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    use chrono::Utc;

    use super::*;
    use crate::domain::entity::provider_link::Provider;
    use crate::outbound::repository::{MockProviderLinkStore, MockUserStore};

    fn claims(provider: Provider, subject: &str, email: Option<&str>, name: Option<&str>) -> IdentityClaims {
        IdentityClaims {
            provider,
            subject_id: subject.to_string(),
            email: email.map(ToString::to_string),
            display_name: name.map(ToString::to_string),
            avatar_url: None,
        }
    }

    fn stored_user(id: i64, email: &str, display_name: &str) -> User {
        User {
            id,
            email: email.to_string(),
            display_name: display_name.to_string(),
            avatar_url: None,
            bio: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn stored_link(id: i64, user_id: i64, provider: Provider, subject: &str) -> ProviderLink {
        ProviderLink {
            id,
            user_id,
            provider,
            provider_user_id: subject.to_string(),
            provider_email: None,
            created_at: Utc::now(),
        }
    }

    fn reconciler(users: MockUserStore, links: MockProviderLinkStore) -> IdentityReconciler {
        IdentityReconciler::new(Arc::new(users), Arc::new(links))
    }

    #[tokio::test]
    async fn test_first_login_creates_user_and_link() {
        let mut users = MockUserStore::new();
        let mut links = MockProviderLinkStore::new();

        users
            .expect_find_by_email()
            .withf(|email| email == "a@x.com")
            .times(1)
            .returning(|_| Box::pin(async { Ok(None) }));
        users
            .expect_save()
            .withf(|user| !user.is_persisted() && user.email == "a@x.com" && user.display_name == "Ann")
            .times(1)
            .returning(|user| Box::pin(async move { Ok(User { id: 7, ..user }) }));
        links
            .expect_save()
            .withf(|link| link.user_id == 7 && link.provider == Provider::Google && link.provider_user_id == "g1")
            .times(1)
            .returning(|link| Box::pin(async move { Ok(ProviderLink { id: 1, ..link }) }));

        let user = reconciler(users, links)
            .reconcile(claims(Provider::Google, "g1", Some("a@x.com"), Some("Ann")))
            .await
            .unwrap();

        assert_eq!(user.id, 7);
    }

    #[tokio::test]
    async fn test_same_email_from_new_provider_links_instead_of_duplicating() {
        let mut users = MockUserStore::new();
        let mut links = MockProviderLinkStore::new();

        users
            .expect_find_by_email()
            .times(1)
            .returning(|_| Box::pin(async { Ok(Some(stored_user(7, "a@x.com", "Ann"))) }));
        links
            .expect_find_by_provider_and_subject()
            .withf(|provider, subject| *provider == Provider::Github && subject == "h1")
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(None) }));
        links
            .expect_save()
            .withf(|link| link.user_id == 7 && link.provider == Provider::Github)
            .times(1)
            .returning(|link| Box::pin(async move { Ok(ProviderLink { id: 2, ..link }) }));
        users
            .expect_save()
            .withf(|user| user.id == 7)
            .times(1)
            .returning(|user| Box::pin(async move { Ok(user) }));

        let user = reconciler(users, links)
            .reconcile(claims(Provider::Github, "h1", Some("a@x.com"), Some("Ann H")))
            .await
            .unwrap();

        assert_eq!(user.id, 7);
    }

    #[tokio::test]
    async fn test_repeat_login_creates_no_second_link() {
        let mut users = MockUserStore::new();
        let mut links = MockProviderLinkStore::new();

        users
            .expect_find_by_email()
            .times(1)
            .returning(|_| Box::pin(async { Ok(Some(stored_user(7, "a@x.com", "Ann"))) }));
        links
            .expect_find_by_provider_and_subject()
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(Some(stored_link(1, 7, Provider::Google, "g1"))) }));
        // No links.save expectation: a second save would panic the mock.
        users
            .expect_save()
            .times(1)
            .returning(|user| Box::pin(async move { Ok(user) }));

        let user = reconciler(users, links)
            .reconcile(claims(Provider::Google, "g1", Some("a@x.com"), Some("Ann")))
            .await
            .unwrap();

        assert_eq!(user.id, 7);
    }

    #[tokio::test]
    async fn test_user_edited_display_name_is_preserved() {
        let mut users = MockUserStore::new();
        let mut links = MockProviderLinkStore::new();

        users
            .expect_find_by_email()
            .returning(|_| Box::pin(async { Ok(Some(stored_user(7, "a@x.com", "Custom Name"))) }));
        links
            .expect_find_by_provider_and_subject()
            .returning(|_, _| Box::pin(async { Ok(Some(stored_link(1, 7, Provider::Google, "g1"))) }));
        users
            .expect_save()
            .withf(|user| user.display_name == "Custom Name")
            .times(1)
            .returning(|user| Box::pin(async move { Ok(user) }));

        reconciler(users, links)
            .reconcile(claims(Provider::Google, "g1", Some("a@x.com"), Some("Provider Name")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_profile_fields_adopt_claim_values() {
        let mut users = MockUserStore::new();
        let mut links = MockProviderLinkStore::new();

        users.expect_find_by_email().returning(|_| {
            let mut user = stored_user(7, "a@x.com", "");
            user.avatar_url = Some(String::new());
            Box::pin(async move { Ok(Some(user)) })
        });
        links
            .expect_find_by_provider_and_subject()
            .returning(|_, _| Box::pin(async { Ok(Some(stored_link(1, 7, Provider::Google, "g1"))) }));
        users
            .expect_save()
            .withf(|user| user.display_name == "Ann" && user.avatar_url.as_deref() == Some("https://p/a.png"))
            .times(1)
            .returning(|user| Box::pin(async move { Ok(user) }));

        let mut incoming = claims(Provider::Google, "g1", Some("a@x.com"), Some("Ann"));
        incoming.avatar_url = Some("https://p/a.png".to_string());

        reconciler(users, links).reconcile(incoming).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_email_with_no_link_creates_new_user() {
        let mut users = MockUserStore::new();
        let mut links = MockProviderLinkStore::new();

        // find_by_email must not be called: there is no email to match.
        links
            .expect_find_by_provider_and_subject()
            .withf(|provider, subject| *provider == Provider::Github && subject == "h9")
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(None) }));
        users
            .expect_save()
            .withf(|user| user.email == "github-h9@users.noreply.invalid")
            .times(1)
            .returning(|user| Box::pin(async move { Ok(User { id: 11, ..user }) }));
        links
            .expect_save()
            .withf(|link| link.user_id == 11)
            .times(1)
            .returning(|link| Box::pin(async move { Ok(ProviderLink { id: 3, ..link }) }));

        let user = reconciler(users, links)
            .reconcile(claims(Provider::Github, "h9", None, None))
            .await
            .unwrap();

        assert_eq!(user.id, 11);
    }

    #[tokio::test]
    async fn test_missing_email_repeat_login_reuses_linked_user() {
        let mut users = MockUserStore::new();
        let mut links = MockProviderLinkStore::new();

        links
            .expect_find_by_provider_and_subject()
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(Some(stored_link(3, 11, Provider::Github, "h9"))) }));
        users
            .expect_find_by_id()
            .withf(|id| *id == 11)
            .times(1)
            .returning(|_| Box::pin(async { Ok(Some(stored_user(11, "github-h9@users.noreply.invalid", "h9"))) }));

        let user = reconciler(users, links)
            .reconcile(claims(Provider::Github, "h9", None, None))
            .await
            .unwrap();

        assert_eq!(user.id, 11);
    }

    #[tokio::test]
    async fn test_unique_violation_retries_lookup_once() {
        let mut users = MockUserStore::new();
        let mut links = MockProviderLinkStore::new();

        // First pass: no user yet, insert loses the race. Second pass:
        // the concurrent winner's row is visible.
        let lookups = AtomicUsize::new(0);
        users.expect_find_by_email().times(2).returning(move |_| {
            let call = lookups.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if call == 0 {
                    Ok(None)
                } else {
                    Ok(Some(stored_user(5, "a@x.com", "Ann")))
                }
            })
        });

        let saves = AtomicUsize::new(0);
        users.expect_save().times(2).returning(move |user| {
            let call = saves.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if call == 0 {
                    Err(IdentityError::InvariantViolation("users_email_key".into()))
                } else {
                    Ok(user)
                }
            })
        });

        // The winner also created the link already.
        links
            .expect_find_by_provider_and_subject()
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(Some(stored_link(1, 5, Provider::Google, "g1"))) }));

        let user = reconciler(users, links)
            .reconcile(claims(Provider::Google, "g1", Some("a@x.com"), Some("Ann")))
            .await
            .unwrap();

        assert_eq!(user.id, 5);
    }

    #[tokio::test]
    async fn test_second_unique_violation_is_surfaced() {
        let mut users = MockUserStore::new();
        let links = MockProviderLinkStore::new();

        users
            .expect_find_by_email()
            .times(2)
            .returning(|_| Box::pin(async { Ok(None) }));
        users
            .expect_save()
            .times(2)
            .returning(|_| Box::pin(async { Err(IdentityError::InvariantViolation("users_email_key".into())) }));

        let result = reconciler(users, links)
            .reconcile(claims(Provider::Google, "g1", Some("a@x.com"), None))
            .await;

        assert!(matches!(result, Err(IdentityError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn test_persistence_failure_is_not_retried() {
        let mut users = MockUserStore::new();
        let links = MockProviderLinkStore::new();

        users
            .expect_find_by_email()
            .times(1)
            .returning(|_| Box::pin(async { Err(IdentityError::Persistence(sea_orm::DbErr::Custom("down".into()))) }));

        let result = reconciler(users, links)
            .reconcile(claims(Provider::Google, "g1", Some("a@x.com"), None))
            .await;

        assert!(matches!(result, Err(IdentityError::Persistence(_))));
    }

    // ── In-memory store scenario tests ─────────────────────────────────
    //
    // A tiny fake store that enforces the same unique constraints as the
    // schema, for end-to-end sequences the per-call mocks cannot express.

    #[derive(Default)]
    struct MemStore {
        users: Mutex<Vec<User>>,
        links: Mutex<Vec<ProviderLink>>,
        next_id: AtomicI64,
    }

    impl MemStore {
        fn new() -> Arc<Self> {
            Arc::new(Self { next_id: AtomicI64::new(1), ..Default::default() })
        }

        fn next(&self) -> i64 {
            self.next_id.fetch_add(1, Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UserStore for MemStore {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, IdentityError> {
            Ok(self.users.lock().unwrap().iter().find(|u| u.email == email).cloned())
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<User>, IdentityError> {
            Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
        }

        async fn save(&self, mut user: User) -> Result<User, IdentityError> {
            let mut users = self.users.lock().unwrap();
            if !user.is_persisted() {
                if users.iter().any(|u| u.email == user.email) {
                    return Err(IdentityError::InvariantViolation("users_email_key".into()));
                }
                user.id = self.next();
                users.push(user.clone());
            } else {
                let slot = users.iter_mut().find(|u| u.id == user.id).expect("updating unknown user");
                *slot = user.clone();
            }
            Ok(user)
        }
    }

    #[async_trait]
    impl ProviderLinkStore for MemStore {
        async fn find_by_provider_and_subject(
            &self,
            provider: Provider,
            subject_id: &str,
        ) -> Result<Option<ProviderLink>, IdentityError> {
            Ok(self
                .links
                .lock()
                .unwrap()
                .iter()
                .find(|l| l.provider == provider && l.provider_user_id == subject_id)
                .cloned())
        }

        async fn save(&self, mut link: ProviderLink) -> Result<ProviderLink, IdentityError> {
            let mut links = self.links.lock().unwrap();
            if links
                .iter()
                .any(|l| l.provider == link.provider && l.provider_user_id == link.provider_user_id)
            {
                return Err(IdentityError::InvariantViolation("provider_links_provider_subject_key".into()));
            }
            link.id = self.next();
            links.push(link.clone());
            Ok(link)
        }
    }

    #[tokio::test]
    async fn test_google_then_github_scenario() {
        let store = MemStore::new();
        let reconciler = IdentityReconciler::new(store.clone(), store.clone());

        let first = reconciler
            .reconcile(claims(Provider::Google, "g1", Some("a@x.com"), Some("Ann")))
            .await
            .unwrap();
        assert_eq!(first.email, "a@x.com");
        assert_eq!(first.display_name, "Ann");

        let second = reconciler
            .reconcile(claims(Provider::Github, "h1", Some("a@x.com"), Some("Ann H")))
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.display_name, "Ann");

        assert_eq!(store.users.lock().unwrap().len(), 1);
        let links = store.links.lock().unwrap();
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.user_id == first.id));
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let store = MemStore::new();
        let reconciler = IdentityReconciler::new(store.clone(), store.clone());
        let incoming = claims(Provider::Github, "h9", None, Some("Ann"));

        let first = reconciler.reconcile(incoming.clone()).await.unwrap();
        let second = reconciler.reconcile(incoming).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.users.lock().unwrap().len(), 1);
        assert_eq!(store.links.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_logins_yield_one_user() {
        let store = MemStore::new();
        let reconciler = Arc::new(IdentityReconciler::new(store.clone(), store.clone()));

        let left = {
            let reconciler = Arc::clone(&reconciler);
            async move {
                reconciler
                    .reconcile(claims(Provider::Google, "g1", Some("a@x.com"), Some("Ann")))
                    .await
            }
        };
        let right = {
            let reconciler = Arc::clone(&reconciler);
            async move {
                reconciler
                    .reconcile(claims(Provider::Github, "h1", Some("a@x.com"), Some("Ann")))
                    .await
            }
        };

        let (left, right) = tokio::join!(left, right);
        let (left, right) = (left.unwrap(), right.unwrap());

        assert_eq!(left.id, right.id);
        assert_eq!(store.users.lock().unwrap().len(), 1);
    }
}
