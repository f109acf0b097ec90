use std::sync::Arc;

use app_core::time::utc_to_fixed_offset;
use app_core::uid::Generator;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, SqlErr};

use super::model::provider_links::Entity as ProviderLinks;
use super::model::users::Entity as Users;
use super::model::{provider_links, users};
use super::repository::{ProviderLinkStore, UserStore};
use crate::domain::entity::provider_link::{Provider, ProviderLink};
use crate::domain::entity::user::User;
use crate::domain::error::IdentityError;

/// sea-orm adapter for [`UserStore`] and [`ProviderLinkStore`].
///
/// The schema's unique constraints (`users.email` and
/// `provider_links (provider, provider_user_id)`) are the authority on
/// the uniqueness invariants; this adapter only translates their
/// violations into `InvariantViolation` so callers can retry lookups.
pub struct IdentityOrm {
    db: Arc<DatabaseConnection>,
    uid: Arc<dyn Generator>,
}

impl IdentityOrm {
    pub fn new(db: Arc<DatabaseConnection>, uid: Arc<dyn Generator>) -> Self {
        Self { db, uid }
    }

    fn to_user(model: users::Model) -> User {
        User {
            id: model.id,
            email: model.email,
            display_name: model.display_name,
            avatar_url: model.avatar_url,
            bio: model.bio,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    fn to_link(model: provider_links::Model) -> Result<ProviderLink, IdentityError> {
        Ok(ProviderLink {
            id: model.id,
            user_id: model.user_id,
            provider: model.provider.parse::<Provider>()?,
            provider_user_id: model.provider_user_id,
            provider_email: model.provider_email,
            created_at: model.created_at.into(),
        })
    }

    fn map_db_err(err: DbErr) -> IdentityError {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(constraint)) => IdentityError::InvariantViolation(constraint),
            _ => IdentityError::Persistence(err),
        }
    }
}

#[async_trait]
impl UserStore for IdentityOrm {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, IdentityError> {
        let model = Users::find()
            .filter(users::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await
            .map_err(Self::map_db_err)?;

        Ok(model.map(Self::to_user))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, IdentityError> {
        let model = Users::find()
            .filter(users::Column::Id.eq(id))
            .one(self.db.as_ref())
            .await
            .map_err(Self::map_db_err)?;

        Ok(model.map(Self::to_user))
    }

    async fn save(&self, user: User) -> Result<User, IdentityError> {
        if !user.is_persisted() {
            let model = users::ActiveModel {
                id: ActiveValue::Set(self.uid.generate()?),
                email: ActiveValue::Set(user.email),
                display_name: ActiveValue::Set(user.display_name),
                avatar_url: ActiveValue::Set(user.avatar_url),
                bio: ActiveValue::Set(user.bio),
                ..Default::default()
            };

            let inserted = Users::insert(model)
                .exec_with_returning(self.db.as_ref())
                .await
                .map_err(Self::map_db_err)?;

            return Ok(Self::to_user(inserted));
        }

        // The email column is immutable after creation and deliberately
        // left out of the update.
        let model = users::ActiveModel {
            id: ActiveValue::Unchanged(user.id),
            display_name: ActiveValue::Set(user.display_name),
            avatar_url: ActiveValue::Set(user.avatar_url),
            bio: ActiveValue::Set(user.bio),
            updated_at: ActiveValue::Set(utc_to_fixed_offset(&Utc::now())),
            ..Default::default()
        };

        let updated = model.update(self.db.as_ref()).await.map_err(Self::map_db_err)?;

        Ok(Self::to_user(updated))
    }
}

#[async_trait]
impl ProviderLinkStore for IdentityOrm {
    async fn find_by_provider_and_subject(
        &self,
        provider: Provider,
        subject_id: &str,
    ) -> Result<Option<ProviderLink>, IdentityError> {
        let model = ProviderLinks::find()
            .filter(provider_links::Column::Provider.eq(provider.as_str()))
            .filter(provider_links::Column::ProviderUserId.eq(subject_id))
            .one(self.db.as_ref())
            .await
            .map_err(Self::map_db_err)?;

        model.map(Self::to_link).transpose()
    }

    async fn save(&self, link: ProviderLink) -> Result<ProviderLink, IdentityError> {
        let model = provider_links::ActiveModel {
            id: ActiveValue::Set(self.uid.generate()?),
            user_id: ActiveValue::Set(link.user_id),
            provider: ActiveValue::Set(link.provider.as_str().to_string()),
            provider_user_id: ActiveValue::Set(link.provider_user_id),
            provider_email: ActiveValue::Set(link.provider_email),
            ..Default::default()
        };

        let inserted = ProviderLinks::insert(model)
            .exec_with_returning(self.db.as_ref())
            .await
            .map_err(Self::map_db_err)?;

        Self::to_link(inserted)
    }
}
