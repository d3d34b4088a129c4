use chrono::{DateTime, Utc};
use reel_shared::urls::{ResolveUrls, UrlResolver};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = Video)]
#[sea_orm(table_name = "videos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub video_url: String,
    pub thumbnail_url: String,
    pub caption: Option<String>,
    pub like_count: i64,
    pub comment_count: i64,
    pub views: i64,
    /// Placeholder for the thumbnail, empty when none could be computed.
    pub blurhash: String,
    pub created: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ResolveUrls for Model {
    fn resolve_urls(&mut self, resolver: &UrlResolver) {
        resolver.resolve_in_place(&mut self.video_url);
        resolver.resolve_in_place(&mut self.thumbnail_url);
    }
}
