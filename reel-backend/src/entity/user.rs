use chrono::{DateTime, Utc};
use reel_shared::urls::{ResolveUrls, UrlResolver};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    #[sea_orm(unique)]
    pub user_name: String,
    pub display_name: String,
    #[serde(skip)]
    pub password_hash: String,
    /// Relative storage path, empty when no image has been uploaded.
    pub image_url: String,
    pub blurhash: String,
    pub created: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::video::Entity")]
    Videos,
    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,
}

impl Related<super::video::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Videos.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// The public face of a user, as embedded in lists and populated references.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub user_name: String,
    pub display_name: String,
    pub image_url: String,
    pub blurhash: String,
}

impl From<Model> for UserSummary {
    fn from(user: Model) -> Self {
        Self {
            id: user.id,
            user_name: user.user_name,
            display_name: user.display_name,
            image_url: user.image_url,
            blurhash: user.blurhash,
        }
    }
}

impl ResolveUrls for UserSummary {
    fn resolve_urls(&mut self, resolver: &UrlResolver) {
        resolver.resolve_in_place(&mut self.image_url);
    }
}

/// The account view returned to its owner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub user_name: String,
    pub display_name: String,
    pub image_url: String,
    pub blurhash: String,
}

impl From<Model> for Account {
    fn from(user: Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            user_name: user.user_name,
            display_name: user.display_name,
            image_url: user.image_url,
            blurhash: user.blurhash,
        }
    }
}

impl ResolveUrls for Account {
    fn resolve_urls(&mut self, resolver: &UrlResolver) {
        resolver.resolve_in_place(&mut self.image_url);
    }
}
