//! Video upload, feed and engagement handlers
//!

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use reel_shared::urls::{ResolveUrls, UrlResolver};
use sea_orm::sea_query::Expr;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::entity::{comment, like, user, video, view};
use crate::user::{contains_literally, page_number, MessageResponse, SearchQuery};
use crate::web::{MultipartForm, WebError};
use crate::SharedState;

pub const VIDEO_PAGE_SIZE: u64 = 9;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub video: video::Model,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoPage {
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub videos: Vec<video::Model>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViewResponse {
    pub video: video::Model,
    pub is_first_view: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CommentRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommentCreated {
    pub message: String,
    pub comment: comment::Model,
}

/// The populated author of a comment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommentAuthor {
    pub id: Uuid,
    pub user_name: String,
    pub display_name: String,
    pub image_url: String,
}

impl From<user::Model> for CommentAuthor {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            user_name: user.user_name,
            display_name: user.display_name,
            image_url: user.image_url,
        }
    }
}

impl ResolveUrls for CommentAuthor {
    fn resolve_urls(&mut self, resolver: &UrlResolver) {
        resolver.resolve_in_place(&mut self.image_url);
    }
}

/// A comment with `userId` populated; `null` when the author is gone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: Uuid,
    pub user_id: Option<CommentAuthor>,
    pub video_id: Uuid,
    pub text: String,
    pub created: DateTime<Utc>,
}

impl ResolveUrls for CommentView {
    fn resolve_urls(&mut self, resolver: &UrlResolver) {
        self.user_id.resolve_urls(resolver);
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommentList {
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub page: Option<String>,
}

async fn find_video<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<video::Model, WebError> {
    video::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| WebError::not_found("Video not found"))
}

/// Adds `delta` to a counter column of one video.
async fn bump<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    column: video::Column,
    delta: i64,
) -> Result<(), WebError> {
    video::Entity::update_many()
        .col_expr(column, Expr::col(column).add(delta))
        .filter(video::Column::Id.eq(id))
        .exec(conn)
        .await?;
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/v1/videos/upload",
    tag = "videos",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Video uploaded", body = UploadResponse),
        (status = 400, description = "Missing or invalid files"),
        (status = 500, description = "Storage or transcode failure")
    )
)]
#[instrument(level = "info", skip_all)]
pub async fn upload_video(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), WebError> {
    let mut form = MultipartForm::read(multipart).await?;
    let caption = form
        .field("caption")
        .map(str::trim)
        .filter(|caption| !caption.is_empty())
        .map(str::to_string);
    let (video_file, thumbnail) = match (form.take_file(&["video"]), form.take_file(&["thumbnail"])) {
        (Some(video_file), Some(thumbnail)) => (video_file, thumbnail),
        _ => {
            return Err(WebError::bad_request(
                "bad_request",
                "Video and thumbnail files are required.",
            ))
        }
    };

    let state = state.read().await;
    let assets = state.pipeline.ingest_video(&video_file, &thumbnail).await?;

    let saved = video::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(auth.id),
        video_url: Set(assets.video_url),
        thumbnail_url: Set(assets.thumbnail_url),
        caption: Set(caption),
        like_count: Set(0),
        comment_count: Set(0),
        views: Set(0),
        blurhash: Set(assets.blurhash),
        created: Set(Utc::now()),
    }
    .insert(&state.conn)
    .await
    .inspect_err(|err| error!("Failed to save video: {:?}", err))?;

    info!(video = %saved.id, url = %saved.video_url, "Video uploaded");
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "Video uploaded successfully".to_string(),
            video: saved.with_resolved_urls(&state.resolver),
        }),
    ))
}

async fn videos_page(
    conn: &DatabaseConnection,
    resolver: &UrlResolver,
    filter: Condition,
    page: u64,
) -> Result<VideoPage, WebError> {
    let paginator = video::Entity::find()
        .filter(filter)
        .order_by_desc(video::Column::Created)
        .paginate(conn, VIDEO_PAGE_SIZE);
    let total = paginator.num_items().await?;
    let videos = paginator.fetch_page(page - 1).await?;

    Ok(VideoPage {
        page,
        page_size: VIDEO_PAGE_SIZE,
        total,
        videos: videos.with_resolved_urls(resolver),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/user",
    tag = "videos",
    params(PageQuery),
    responses((status = 200, description = "The caller's videos, newest first", body = VideoPage))
)]
pub async fn get_my_videos(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> Result<Json<VideoPage>, WebError> {
    let state = state.read().await;
    let page = page_number(query.page.as_deref());
    let filter = Condition::all().add(video::Column::UserId.eq(auth.id));
    Ok(Json(
        videos_page(&state.conn, &state.resolver, filter, page).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/user/{user_id}",
    tag = "videos",
    params(("user_id" = Uuid, Path, description = "Owner of the videos"), PageQuery),
    responses((status = 200, description = "The user's videos, newest first", body = VideoPage))
)]
pub async fn get_user_videos(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<VideoPage>, WebError> {
    let state = state.read().await;
    let page = page_number(query.page.as_deref());
    let filter = Condition::all().add(video::Column::UserId.eq(user_id));
    Ok(Json(
        videos_page(&state.conn, &state.resolver, filter, page).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/view/{video_id}",
    tag = "videos",
    params(("video_id" = Uuid, Path, description = "Video being watched")),
    responses(
        (status = 200, description = "The video and whether this was the caller's first view", body = ViewResponse),
        (status = 404, description = "Video not found")
    )
)]
pub async fn add_view(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthUser>,
    Path(video_id): Path<Uuid>,
) -> Result<Json<ViewResponse>, WebError> {
    let state = state.read().await;
    let txn = state.conn.begin().await?;
    find_video(&txn, video_id).await?;

    let existing = view::Entity::find()
        .filter(view::Column::UserId.eq(auth.id))
        .filter(view::Column::VideoId.eq(video_id))
        .one(&txn)
        .await?;
    let is_first_view = existing.is_none();
    if is_first_view {
        view::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(auth.id),
            video_id: Set(video_id),
            created: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;
        bump(&txn, video_id, video::Column::Views, 1).await?;
    }
    let video = find_video(&txn, video_id).await?;
    txn.commit().await?;

    debug!(%video_id, is_first_view, "Recorded view");
    Ok(Json(ViewResponse {
        video: video.with_resolved_urls(&state.resolver),
        is_first_view,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/videos/like/{video_id}",
    tag = "videos",
    params(("video_id" = Uuid, Path, description = "Video to like")),
    responses(
        (status = 200, description = "Liked", body = MessageResponse),
        (status = 400, description = "Already liked"),
        (status = 404, description = "Video not found")
    )
)]
pub async fn like_video(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthUser>,
    Path(video_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, WebError> {
    let state = state.read().await;
    let txn = state.conn.begin().await?;
    find_video(&txn, video_id).await?;

    let existing = like::Entity::find()
        .filter(like::Column::UserId.eq(auth.id))
        .filter(like::Column::VideoId.eq(video_id))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(WebError::bad_request("already_liked", "Video already liked"));
    }

    like::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(auth.id),
        video_id: Set(video_id),
        created: Set(Utc::now()),
    }
    .insert(&txn)
    .await?;
    bump(&txn, video_id, video::Column::LikeCount, 1).await?;
    txn.commit().await?;

    Ok(MessageResponse::new("Video liked"))
}

#[utoipa::path(
    post,
    path = "/api/v1/videos/dislike/{video_id}",
    tag = "videos",
    params(("video_id" = Uuid, Path, description = "Video to remove the like from")),
    responses(
        (status = 200, description = "Like removed", body = MessageResponse),
        (status = 400, description = "Not liked yet"),
        (status = 404, description = "Video not found")
    )
)]
pub async fn dislike_video(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthUser>,
    Path(video_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, WebError> {
    let state = state.read().await;
    let txn = state.conn.begin().await?;
    find_video(&txn, video_id).await?;

    let existing = like::Entity::find()
        .filter(like::Column::UserId.eq(auth.id))
        .filter(like::Column::VideoId.eq(video_id))
        .one(&txn)
        .await?
        .ok_or_else(|| WebError::bad_request("not_liked", "Video not liked yet"))?;

    existing.delete(&txn).await?;
    bump(&txn, video_id, video::Column::LikeCount, -1).await?;
    txn.commit().await?;

    Ok(MessageResponse::new("Video disliked"))
}

#[utoipa::path(
    post,
    path = "/api/v1/videos/comment/{video_id}",
    tag = "videos",
    params(("video_id" = Uuid, Path, description = "Video to comment on")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment added", body = CommentCreated),
        (status = 400, description = "Empty comment"),
        (status = 404, description = "Video not found")
    )
)]
pub async fn add_comment(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthUser>,
    Path(video_id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentCreated>), WebError> {
    if req.text.trim().is_empty() {
        return Err(WebError::bad_request(
            "empty_comment",
            "Comment text is required",
        ));
    }

    let state = state.read().await;
    let txn = state.conn.begin().await?;
    find_video(&txn, video_id).await?;

    let comment = comment::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(auth.id),
        video_id: Set(video_id),
        text: Set(req.text),
        created: Set(Utc::now()),
    }
    .insert(&txn)
    .await
    .inspect_err(|err| error!("Failed to save comment: {:?}", err))?;
    bump(&txn, video_id, video::Column::CommentCount, 1).await?;
    txn.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(CommentCreated {
            message: "Comment added".to_string(),
            comment,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/comment/{video_id}",
    tag = "videos",
    params(("video_id" = Uuid, Path, description = "Video whose comments to list")),
    responses((status = 200, description = "Comments, newest first", body = CommentList))
)]
pub async fn get_comments(
    State(state): State<SharedState>,
    Path(video_id): Path<Uuid>,
) -> Result<Json<CommentList>, WebError> {
    let state = state.read().await;
    let comments: Vec<CommentView> = comment::Entity::find()
        .filter(comment::Column::VideoId.eq(video_id))
        .order_by_desc(comment::Column::Created)
        .find_also_related(user::Entity)
        .all(&state.conn)
        .await?
        .into_iter()
        .map(|(comment, author)| CommentView {
            id: comment.id,
            user_id: author.map(CommentAuthor::from),
            video_id: comment.video_id,
            text: comment.text,
            created: comment.created,
        })
        .collect();

    Ok(Json(CommentList {
        comments: comments.with_resolved_urls(&state.resolver),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/search",
    tag = "videos",
    params(SearchQuery),
    responses((status = 200, description = "Videos whose caption matches, newest first", body = VideoPage))
)]
pub async fn search_videos(
    State(state): State<SharedState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<VideoPage>, WebError> {
    let state = state.read().await;
    let page = page_number(query.page.as_deref());
    let term = query.q.as_deref().unwrap_or("").trim();
    if term.is_empty() {
        return Ok(Json(VideoPage {
            page,
            page_size: VIDEO_PAGE_SIZE,
            total: 0,
            videos: Vec::new(),
        }));
    }

    let filter = Condition::all().add(contains_literally(video::Column::Caption, term));
    Ok(Json(
        videos_page(&state.conn, &state.resolver, filter, page).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_author_resolved() {
        let resolver = UrlResolver::new("https://cdn.example.com");
        let view = CommentView {
            id: Uuid::new_v4(),
            user_id: Some(CommentAuthor {
                id: Uuid::new_v4(),
                user_name: "sam".to_string(),
                display_name: "Sam".to_string(),
                image_url: "/uploads/5.jpg".to_string(),
            }),
            video_id: Uuid::new_v4(),
            text: "nice".to_string(),
            created: Utc::now(),
        };
        let resolved = vec![view].with_resolved_urls(&resolver);
        assert_eq!(
            resolved[0].user_id.as_ref().map(|a| a.image_url.as_str()),
            Some("https://cdn.example.com/uploads/5.jpg")
        );

        let json = serde_json::to_value(&resolved[0]).expect("serialize");
        assert_eq!(json["userId"]["userName"], "sam");
    }
}
