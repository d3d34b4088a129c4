pub mod auth;
pub mod cli;
pub mod entity;
pub mod logging;
pub mod media;
pub mod middleware;
pub mod migration;
pub mod openapi;
pub mod recommend;
pub mod storage;
pub mod user;
pub mod video;
pub mod web;
#[cfg(test)]
mod tests;

use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::{header, Response, StatusCode},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use reel_shared::error::ReelError;
use reel_shared::urls::UrlResolver;
use reel_shared::AddrInfo;
use sea_orm::DatabaseConnection;
use std::{sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tower::{BoxError, ServiceBuilder};
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer};
use tracing::{error, info};

use crate::{
    auth::{middleware::require_auth, token::TokenService},
    cli::CliOpts,
    logging::logging_layer,
    media::{FfmpegTranscoder, MediaPipeline, UploadStore, UPLOADS_URL_PREFIX},
    recommend::RecommendationClient,
    web::WebError,
};

/// Request bodies on the video upload route, above the 50 MB file ceiling so oversize files get a JSON 400.
pub const VIDEO_BODY_LIMIT: usize = 60 * 1024 * 1024;
/// Request bodies on the profile update route.
pub const PROFILE_BODY_LIMIT: usize = 10 * 1024 * 1024;
/// Long enough for a transcode.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub type SharedState = Arc<RwLock<AppState>>;

pub struct AppState {
    pub conn: DatabaseConnection,
    pub resolver: UrlResolver,
    pub pipeline: MediaPipeline,
    pub tokens: TokenService,
    pub recommender: RecommendationClient,
    pub password_cost: u32,
}

impl AppState {
    pub async fn new(cli: &CliOpts, addr: &AddrInfo) -> Result<Self, ReelError> {
        let conn = storage::new(&cli.db_path()).await?;

        let store = UploadStore::new(cli.uploads_dir.clone());
        store.ensure_dir().await?;
        let pipeline = MediaPipeline::with_transcoder(
            store,
            Arc::new(FfmpegTranscoder::new(cli.ffmpeg_path.clone())),
            cli.max_transcodes,
        );

        let resolver = UrlResolver::from_config(cli.main_url.as_deref(), addr);
        info!("Media URLs resolve against {}", resolver.base());

        Ok(Self {
            conn,
            resolver,
            pipeline,
            tokens: TokenService::new(&cli.access_token_secret, &cli.refresh_token_secret)?,
            recommender: RecommendationClient::new(&cli.recommendation_api_url),
            password_cost: bcrypt::DEFAULT_COST,
        })
    }

    /// In-memory database, uploads in `uploads_dir`, and a transcoder that copies bytes.
    #[cfg(test)]
    pub async fn test(uploads_dir: &std::path::Path, recommendation_api_url: &str) -> Self {
        let conn = storage::start_db(None)
            .await
            .expect("Failed to start test DB");
        Self {
            conn,
            resolver: UrlResolver::new("https://cdn.example.com"),
            pipeline: MediaPipeline::with_transcoder(
                UploadStore::new(uploads_dir),
                Arc::new(media::compress::testing::CopyTranscoder),
                2,
            ),
            tokens: TokenService::new("test-access", "test-refresh")
                .expect("Failed to build token service"),
            recommender: RecommendationClient::new(recommendation_api_url),
            password_cost: 4,
        }
    }
}

fn public_routes() -> Router<SharedState> {
    Router::new()
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/verifyToken", post(auth::verify_token))
        .route("/api/v1/auth/refreshToken", post(auth::refresh_token))
}

fn protected_routes(shared_state: &SharedState) -> Router<SharedState> {
    Router::new()
        .route(
            "/api/v1/user/update",
            post(user::update_profile).layer(DefaultBodyLimit::max(PROFILE_BODY_LIMIT)),
        )
        .route("/api/v1/user/profile", get(user::get_profile))
        .route("/api/v1/user/followers", get(user::get_followers))
        .route("/api/v1/user/following", get(user::get_following))
        .route("/api/v1/user/search", get(user::search_users))
        .route("/api/v1/user/{id}/follow", post(user::follow_user))
        .route("/api/v1/user/{id}/unfollow", post(user::unfollow_user))
        .route(
            "/api/v1/videos/upload",
            post(video::upload_video).layer(DefaultBodyLimit::max(VIDEO_BODY_LIMIT)),
        )
        .route("/api/v1/videos/user", get(video::get_my_videos))
        .route("/api/v1/videos/user/{user_id}", get(video::get_user_videos))
        .route("/api/v1/videos/view/{video_id}", get(video::add_view))
        .route("/api/v1/videos/like/{video_id}", post(video::like_video))
        .route("/api/v1/videos/dislike/{video_id}", post(video::dislike_video))
        .route(
            "/api/v1/videos/comment/{video_id}",
            get(video::get_comments).post(video::add_comment),
        )
        .route("/api/v1/videos/recommend", post(recommend::get_recommendations))
        .route("/api/v1/videos/search", get(video::search_videos))
        .route_layer(from_fn_with_state(shared_state.clone(), require_auth))
}

pub async fn build_app<T>(shared_state: &SharedState) -> Router<T> {
    let uploads = ServeDir::new(shared_state.read().await.pipeline.store().dir());

    // Build our application by composing routes
    let router = Router::new()
        .merge(public_routes())
        .merge(protected_routes(shared_state))
        .merge(openapi::api_route())
        .nest_service(UPLOADS_URL_PREFIX, uploads);

    router
        // Add middleware to all routes
        .layer(
            ServiceBuilder::new()
                // Handle errors from middleware
                .layer(middleware::corslayer())
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    |response: &Response<Body>| {
                        if response.status() == StatusCode::OK {
                            "private, no-transform max-age=0".parse().ok()
                        } else {
                            None
                        }
                    },
                ))
                .layer(HandleErrorLayer::new(handle_error))
                .load_shed()
                .concurrency_limit(1024)
                .timeout(REQUEST_TIMEOUT)
                .layer(logging_layer()),
        )
        .with_state(shared_state.clone())
}

async fn handle_error(error: BoxError) -> WebError {
    if error.is::<tower::timeout::error::Elapsed>() {
        return WebError::new(
            StatusCode::REQUEST_TIMEOUT,
            "request_timeout",
            "request timed out",
        );
    }

    if error.is::<tower::load_shed::error::Overloaded>() {
        let msg = "service is overloaded, try again later";
        error!("{}", msg);
        return WebError::new(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg);
    }

    let msg = format!("Unhandled internal error: {error}");
    error!("{}", msg);
    WebError::internal(msg)
}

#[tokio::test]
async fn test_handle_error() {
    let err = tower::timeout::error::Elapsed::new();
    let res = handle_error(Box::new(err)).await;
    assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT);

    let err = tower::load_shed::error::Overloaded::new();
    let res = handle_error(Box::new(err)).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.code(), "service_unavailable");

    let res = handle_error("boom".into()).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
