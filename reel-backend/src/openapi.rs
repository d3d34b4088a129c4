use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(description = "Short-video platform API", license(name = "MIT or Apache2", identifier="MIT Apache2.0"), title = "Reel", version = env!("CARGO_PKG_VERSION")),
    paths(
        crate::auth::register,
        crate::auth::login,
        crate::auth::verify_token,
        crate::auth::refresh_token,
        crate::user::update_profile,
        crate::user::get_profile,
        crate::user::get_followers,
        crate::user::get_following,
        crate::user::follow_user,
        crate::user::unfollow_user,
        crate::user::search_users,
        crate::video::upload_video,
        crate::video::get_my_videos,
        crate::video::get_user_videos,
        crate::video::add_view,
        crate::video::like_video,
        crate::video::dislike_video,
        crate::video::add_comment,
        crate::video::get_comments,
        crate::video::search_videos,
        crate::recommend::get_recommendations
    ),
    tags(
        (name = "auth", description = "Registration and tokens"),
        (name = "user", description = "Profiles and the follow graph"),
        (name = "videos", description = "Uploads, feeds and engagement")
    )
)]
pub struct ApiDoc;

pub(crate) fn api_route<T: Clone + Sync + Send + 'static>() -> Router<T> {
    let doc = ApiDoc::openapi();
    Router::new().merge(SwaggerUi::new("/api/v1/swagger-ui").url("/api/v1/openapi.json", doc))
}
