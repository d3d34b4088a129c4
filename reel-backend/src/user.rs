//! Profile and follow-graph handlers
//!

use std::collections::HashMap;

use axum::extract::{Multipart, Path, Query, State};
use axum::{Extension, Json};
use reel_shared::urls::ResolveUrls;
use sea_orm::sea_query::{Expr, IntoColumnRef, LikeExpr, SimpleExpr};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::entity::user::{self, Account, UserSummary};
use crate::entity::follow;
use crate::web::{MultipartForm, WebError};
use crate::SharedState;

pub const FOLLOW_PAGE_SIZE: u64 = 12;
pub const SEARCH_LIMIT: u64 = 20;
/// Highest page served; keeps `page * page_size` well inside an sqlite OFFSET.
pub const MAX_PAGE: u64 = 1_000_000_000;

/// Parses a page number the way the clients send it; anything unusable is page 1.
pub(crate) fn page_number(page: Option<&str>) -> u64 {
    page.and_then(|p| p.trim().parse::<u64>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(1)
        .min(MAX_PAGE)
}

const LIKE_ESCAPE: char = '!';

/// `column LIKE '%term%'` with `%` and `_` in `term` matched literally.
pub(crate) fn contains_literally(column: impl IntoColumnRef, term: &str) -> SimpleExpr {
    Expr::col(column).like(LikeExpr::new(like_pattern(term)).escape(LIKE_ESCAPE))
}

fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct UserLookup {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub page: Option<String>,
}

impl UserLookup {
    /// `userId`, then `userName`, then the caller.
    async fn find(
        &self,
        conn: &DatabaseConnection,
        auth: &AuthUser,
    ) -> Result<user::Model, WebError> {
        let query = user::Entity::find();
        let query = match (self.user_id.as_deref(), self.user_name.as_deref()) {
            (Some(id), _) if !id.trim().is_empty() => {
                let id = Uuid::parse_str(id.trim())
                    .map_err(|_| WebError::bad_request("bad_request", "Invalid userId"))?;
                query.filter(user::Column::Id.eq(id))
            }
            (_, Some(name)) if !name.trim().is_empty() => {
                query.filter(user::Column::UserName.eq(name.trim()))
            }
            _ => query.filter(user::Column::Id.eq(auth.id)),
        };
        query
            .one(conn)
            .await?
            .ok_or_else(|| WebError::not_found("User not found"))
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(flatten)]
    pub account: Account,
    pub followers: u64,
    pub following: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FollowersPage {
    pub followers: Vec<UserSummary>,
    pub page: u64,
    pub page_size: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FollowingPage {
    pub following: Vec<UserSummary>,
    pub page: u64,
    pub page_size: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserSearchResults {
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/user/update",
    tag = "user",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated profile", body = Account),
        (status = 400, description = "Invalid image upload")
    )
)]
#[instrument(level = "info", skip_all)]
pub async fn update_profile(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<Json<Account>, WebError> {
    let mut form = MultipartForm::read(multipart).await?;
    let display_name = form.field("displayName").map(|name| name.trim().to_string());
    let image = form.take_file(&["image", "imageUrl"]);

    let state = state.read().await;
    let user = user::Entity::find_by_id(auth.id)
        .one(&state.conn)
        .await?
        .ok_or_else(|| WebError::not_found("User not found"))?;

    let profile_image = match image {
        Some(image) => Some(state.pipeline.ingest_profile_image(&image).await?),
        None => {
            debug!("No profile image in update, keeping existing image");
            None
        }
    };

    let mut model = user.into_active_model();
    if let Some(display_name) = display_name {
        model.display_name = Set(display_name);
    }
    if let Some(profile_image) = profile_image {
        model.image_url = Set(profile_image.image_url);
        model.blurhash = Set(profile_image.blurhash);
    }
    let updated = model
        .update(&state.conn)
        .await
        .inspect_err(|err| error!("Failed to update profile: {:?}", err))?;

    Ok(Json(Account::from(updated).with_resolved_urls(&state.resolver)))
}

#[utoipa::path(
    get,
    path = "/api/v1/user/profile",
    tag = "user",
    params(UserLookup),
    responses(
        (status = 200, description = "Profile with follow counts", body = Profile),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_profile(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthUser>,
    Query(lookup): Query<UserLookup>,
) -> Result<Json<Profile>, WebError> {
    let state = state.read().await;
    let user = lookup.find(&state.conn, &auth).await?;

    let followers = follow::Entity::find()
        .filter(follow::Column::FollowingId.eq(user.id))
        .count(&state.conn)
        .await?;
    let following = follow::Entity::find()
        .filter(follow::Column::FollowerId.eq(user.id))
        .count(&state.conn)
        .await?;

    Ok(Json(Profile {
        account: Account::from(user).with_resolved_urls(&state.resolver),
        followers,
        following,
    }))
}

/// One page of the users on the other end of `user_id`'s follow edges, newest edge first.
async fn follow_page(
    conn: &DatabaseConnection,
    user_id: Uuid,
    followers: bool,
    page: u64,
) -> Result<Vec<UserSummary>, WebError> {
    let by = match followers {
        true => follow::Column::FollowingId,
        false => follow::Column::FollowerId,
    };
    let edges = follow::Entity::find()
        .filter(by.eq(user_id))
        .order_by_desc(follow::Column::Created)
        .offset((page - 1) * FOLLOW_PAGE_SIZE)
        .limit(FOLLOW_PAGE_SIZE)
        .all(conn)
        .await?;
    let ids: Vec<Uuid> = edges
        .iter()
        .map(|edge| match followers {
            true => edge.follower_id,
            false => edge.following_id,
        })
        .collect();

    let mut users: HashMap<Uuid, user::Model> = user::Entity::find()
        .filter(user::Column::Id.is_in(ids.clone()))
        .all(conn)
        .await?
        .into_iter()
        .map(|user| (user.id, user))
        .collect();

    Ok(ids
        .into_iter()
        .filter_map(|id| users.remove(&id))
        .map(UserSummary::from)
        .collect())
}

#[utoipa::path(
    get,
    path = "/api/v1/user/followers",
    tag = "user",
    params(UserLookup),
    responses(
        (status = 200, description = "Users following the target", body = FollowersPage),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_followers(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthUser>,
    Query(lookup): Query<UserLookup>,
) -> Result<Json<FollowersPage>, WebError> {
    let state = state.read().await;
    let user = lookup.find(&state.conn, &auth).await?;
    let page = page_number(lookup.page.as_deref());

    let followers = follow_page(&state.conn, user.id, true, page).await?;
    Ok(Json(FollowersPage {
        followers: followers.with_resolved_urls(&state.resolver),
        page,
        page_size: FOLLOW_PAGE_SIZE,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/user/following",
    tag = "user",
    params(UserLookup),
    responses(
        (status = 200, description = "Users the target follows", body = FollowingPage),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_following(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthUser>,
    Query(lookup): Query<UserLookup>,
) -> Result<Json<FollowingPage>, WebError> {
    let state = state.read().await;
    let user = lookup.find(&state.conn, &auth).await?;
    let page = page_number(lookup.page.as_deref());

    let following = follow_page(&state.conn, user.id, false, page).await?;
    Ok(Json(FollowingPage {
        following: following.with_resolved_urls(&state.resolver),
        page,
        page_size: FOLLOW_PAGE_SIZE,
    }))
}

async fn existing_edge(
    conn: &DatabaseConnection,
    follower: Uuid,
    following: Uuid,
) -> Result<Option<follow::Model>, WebError> {
    Ok(follow::Entity::find()
        .filter(
            Condition::all()
                .add(follow::Column::FollowerId.eq(follower))
                .add(follow::Column::FollowingId.eq(following)),
        )
        .one(conn)
        .await?)
}

async fn ensure_user_exists(conn: &DatabaseConnection, id: Uuid) -> Result<(), WebError> {
    match user::Entity::find_by_id(id).one(conn).await? {
        Some(_) => Ok(()),
        None => Err(WebError::not_found("User not found")),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/user/{id}/follow",
    tag = "user",
    params(("id" = Uuid, Path, description = "User to follow")),
    responses(
        (status = 200, description = "Followed", body = MessageResponse),
        (status = 400, description = "Self-follow or already following"),
        (status = 404, description = "User not found")
    )
)]
pub async fn follow_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthUser>,
    Path(target): Path<Uuid>,
) -> Result<Json<MessageResponse>, WebError> {
    let state = state.read().await;
    ensure_user_exists(&state.conn, target).await?;

    if target == auth.id {
        return Err(WebError::bad_request("follow_error", "You cannot follow yourself"));
    }
    if existing_edge(&state.conn, auth.id, target).await?.is_some() {
        return Err(WebError::bad_request("follow_error", "Already following this user"));
    }

    follow::ActiveModel {
        id: Set(Uuid::new_v4()),
        follower_id: Set(auth.id),
        following_id: Set(target),
        created: Set(chrono::Utc::now()),
    }
    .insert(&state.conn)
    .await
    .inspect_err(|err| error!("Failed to save follow: {:?}", err))?;

    info!("{} followed {}", auth.id, target);
    Ok(MessageResponse::new("Followed successfully"))
}

#[utoipa::path(
    post,
    path = "/api/v1/user/{id}/unfollow",
    tag = "user",
    params(("id" = Uuid, Path, description = "User to unfollow")),
    responses(
        (status = 200, description = "Unfollowed", body = MessageResponse),
        (status = 400, description = "Not following this user"),
        (status = 404, description = "User not found")
    )
)]
pub async fn unfollow_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthUser>,
    Path(target): Path<Uuid>,
) -> Result<Json<MessageResponse>, WebError> {
    let state = state.read().await;
    ensure_user_exists(&state.conn, target).await?;

    let edge = existing_edge(&state.conn, auth.id, target)
        .await?
        .ok_or_else(|| WebError::bad_request("unfollow_error", "You are not following this user"))?;
    edge.delete(&state.conn).await?;

    info!("{} unfollowed {}", auth.id, target);
    Ok(MessageResponse::new("Unfollowed successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/user/search",
    tag = "user",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching users", body = UserSearchResults)
    )
)]
pub async fn search_users(
    State(state): State<SharedState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<UserSearchResults>, WebError> {
    let term = query.q.as_deref().unwrap_or("").trim();
    if term.is_empty() {
        return Ok(Json(UserSearchResults { users: Vec::new() }));
    }

    let state = state.read().await;
    let users: Vec<UserSummary> = user::Entity::find()
        .filter(
            Condition::any()
                .add(contains_literally(user::Column::UserName, term))
                .add(contains_literally(user::Column::DisplayName, term)),
        )
        .order_by_asc(user::Column::UserName)
        .limit(SEARCH_LIMIT)
        .all(&state.conn)
        .await?
        .into_iter()
        .map(UserSummary::from)
        .collect();

    Ok(Json(UserSearchResults {
        users: users.with_resolved_urls(&state.resolver),
    }))
}
