use crate::media::compress::testing::png_bytes;
use crate::{build_app, AppState};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::*;
use serde_json::{json, Value};
use std::sync::{Arc, Once};
use tempfile::TempDir;
use tokio::sync::RwLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

static INIT: Once = Once::new();

const BASE: &str = "https://cdn.example.com";
const NOWHERE: &str = "http://127.0.0.1:9";

struct TestApp {
    server: TestServer,
    uploads: TempDir,
}

async fn setup_test_server_with(recommendation_api_url: &str) -> TestApp {
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                "reel_backend=debug,tower_http=debug,info",
            ))
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
    let uploads = tempfile::tempdir().expect("Failed to create uploads dir");
    let appstate = AppState::test(uploads.path(), recommendation_api_url).await;
    let shared_state = Arc::new(RwLock::new(appstate));
    let app = build_app(&shared_state).await;

    let config = TestServerConfig {
        save_cookies: false,
        expect_success_by_default: true,
        restrict_requests_with_http_schema: false,
        default_content_type: None,
        default_scheme: Some("http".into()),
        ..Default::default()
    };

    TestApp {
        server: TestServer::new_with_config(app, config).unwrap(),
        uploads,
    }
}

async fn setup_test_server() -> TestApp {
    setup_test_server_with(NOWHERE).await
}

/// Registers `user_name` and logs in, returning the user id and access token.
async fn register_and_login(server: &TestServer, user_name: &str) -> (Uuid, String) {
    let email = format!("{user_name}@example.com");
    server
        .post("/api/v1/auth/register")
        .json(&json!({"userName": user_name, "email": email, "password": "hunter22"}))
        .await
        .assert_status(StatusCode::CREATED);

    let res = server
        .post("/api/v1/auth/login")
        .json(&json!({"email": email, "password": "hunter22"}))
        .await;
    let body = res.json::<Value>();
    let id = body["user"]["id"]
        .as_str()
        .and_then(|id| Uuid::parse_str(id).ok())
        .expect("login should return the user id");
    let token = body["accessToken"]
        .as_str()
        .expect("login should return an access token")
        .to_string();
    (id, token)
}

fn error_code(res: &TestResponse) -> String {
    res.json::<Value>()["errorCode"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

fn png_part(name: &str) -> Part {
    Part::bytes(png_bytes(900, 600))
        .file_name(name)
        .mime_type("image/png")
}

fn video_form(caption: &str) -> MultipartForm {
    MultipartForm::new()
        .add_text("caption", caption)
        .add_part(
            "video",
            Part::bytes(b"not really a movie".to_vec())
                .file_name("clip.mov")
                .mime_type("video/quicktime"),
        )
        .add_part("thumbnail", png_part("cover.png"))
}

async fn upload_video(server: &TestServer, token: &str, caption: &str) -> Value {
    let res = server
        .post("/api/v1/videos/upload")
        .authorization_bearer(token)
        .multipart(video_form(caption))
        .await;
    res.assert_status(StatusCode::CREATED);
    res.json::<Value>()["video"].clone()
}

#[tokio::test]
async fn test_failing_setup_server() {
    // I sure hope this path isn't writeable!
    crate::storage::start_db(Some(
        &format!("/asdfasdf{}/asd{}fsadfdf", Uuid::new_v4(), Uuid::new_v4()).into(),
    ))
    .await
    .expect_err("Should fail to open DB");
}

#[tokio::test]
async fn test_api_register_and_login() {
    let app = setup_test_server().await;
    let server = &app.server;

    let res = server
        .post("/api/v1/auth/register")
        .json(&json!({"userName": "sam", "email": "Sam@Example.com", "password": "hunter22"}))
        .await;
    res.assert_status(StatusCode::CREATED);
    let body = res.json::<Value>();
    assert_eq!(body["email"], "sam@example.com");
    assert_eq!(body["userName"], "sam");
    assert!(body["userId"].is_string());

    let res = server
        .post("/api/v1/auth/register")
        .json(&json!({"userName": "sam", "email": "other@example.com", "password": "hunter22"}))
        .expect_failure()
        .await;
    res.assert_status(StatusCode::CONFLICT);
    assert_eq!(error_code(&res), "conflict");

    let res = server
        .post("/api/v1/auth/register")
        .json(&json!({"userName": "pat", "email": "pat@example.com", "password": "short"}))
        .expect_failure()
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);

    let res = server
        .post("/api/v1/auth/login")
        .json(&json!({"email": "nobody@example.com", "password": "hunter22"}))
        .expect_failure()
        .await;
    res.assert_status(StatusCode::NOT_FOUND);

    let res = server
        .post("/api/v1/auth/login")
        .json(&json!({"email": "sam@example.com", "password": "wrong-password"}))
        .expect_failure()
        .await;
    res.assert_status(StatusCode::UNAUTHORIZED);

    let res = server
        .post("/api/v1/auth/login")
        .json(&json!({"email": "sam@example.com", "password": "hunter22"}))
        .await;
    let login = res.json::<Value>();
    assert_eq!(login["user"]["userName"], "sam");
    assert_eq!(login["user"]["imageUrl"], "");
    assert!(login["user"].get("passwordHash").is_none());

    let res = server
        .post("/api/v1/auth/verifyToken")
        .json(&json!({"token": login["accessToken"]}))
        .await;
    assert_eq!(res.json::<Value>()["userName"], "sam");

    let res = server
        .post("/api/v1/auth/verifyToken")
        .json(&json!({"token": "garbage"}))
        .expect_failure()
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&res), "invalid_token");

    // an access token is not a refresh token
    let res = server
        .post("/api/v1/auth/refreshToken")
        .json(&json!({"token": login["accessToken"]}))
        .expect_failure()
        .await;
    assert_eq!(error_code(&res), "invalid_token");

    let res = server
        .post("/api/v1/auth/refreshToken")
        .json(&json!({"token": login["refreshToken"]}))
        .await;
    let refreshed = res.json::<Value>();
    assert!(refreshed["accessToken"].is_string());
    assert_eq!(refreshed["user"]["email"], "sam@example.com");
}

#[tokio::test]
async fn test_api_requires_bearer_token() {
    let app = setup_test_server().await;
    let server = &app.server;

    let res = server.get("/api/v1/user/profile").expect_failure().await;
    res.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&res), "unauthorized");

    let res = server
        .get("/api/v1/videos/user")
        .authorization_bearer("not-a-token")
        .expect_failure()
        .await;
    res.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_api_profile_image_update() {
    let app = setup_test_server().await;
    let server = &app.server;
    let (user_id, token) = register_and_login(server, "sam").await;

    let res = server
        .post("/api/v1/user/update")
        .authorization_bearer(&token)
        .multipart(
            MultipartForm::new()
                .add_text("displayName", "Sam S")
                .add_part("imageUrl", png_part("me.png")),
        )
        .await;
    let profile = res.json::<Value>();
    assert_eq!(profile["displayName"], "Sam S");
    let image_url = profile["imageUrl"].as_str().unwrap_or_default().to_string();
    assert!(image_url.starts_with(&format!("{BASE}/uploads/")), "{image_url}");
    assert!(image_url.ends_with(".png"));
    let blurhash = profile["blurhash"].as_str().unwrap_or_default().to_string();
    assert!(!blurhash.is_empty());

    // stored bytes are the compressed jpeg
    let stored = app
        .uploads
        .path()
        .join(image_url.rsplit('/').next().unwrap_or_default());
    let img = image::ImageReader::open(&stored)
        .unwrap()
        .with_guessed_format()
        .unwrap();
    assert_eq!(img.format(), Some(image::ImageFormat::Jpeg));

    // no file leaves the image alone
    let res = server
        .post("/api/v1/user/update")
        .authorization_bearer(&token)
        .multipart(MultipartForm::new().add_text("displayName", "Sammy"))
        .await;
    let profile = res.json::<Value>();
    assert_eq!(profile["displayName"], "Sammy");
    assert_eq!(profile["imageUrl"], image_url.as_str());
    assert_eq!(profile["blurhash"], blurhash.as_str());

    let res = server
        .get(&format!("/api/v1/user/profile?userId={user_id}"))
        .authorization_bearer(&token)
        .await;
    let profile = res.json::<Value>();
    assert_eq!(profile["imageUrl"], image_url.as_str());
    assert_eq!(profile["followers"], 0);
    assert_eq!(profile["following"], 0);

    // the relative path is served from the uploads directory
    let res = server
        .get(image_url.trim_start_matches(BASE))
        .await;
    res.assert_status_ok();
}

#[tokio::test]
async fn test_api_profile_update_rejects_bad_image() {
    let app = setup_test_server().await;
    let server = &app.server;
    let (_, token) = register_and_login(server, "sam").await;

    let res = server
        .post("/api/v1/user/update")
        .authorization_bearer(&token)
        .multipart(
            MultipartForm::new().add_part(
                "image",
                Part::bytes(b"GIF89a".to_vec())
                    .file_name("me.gif")
                    .mime_type("image/gif"),
            ),
        )
        .expect_failure()
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&res), "bad_request");

    // validation happens before anything is written
    assert_eq!(
        std::fs::read_dir(app.uploads.path()).unwrap().count(),
        0
    );
}

#[tokio::test]
async fn test_api_video_upload() {
    let app = setup_test_server().await;
    let server = &app.server;
    let (user_id, token) = register_and_login(server, "sam").await;

    let video = upload_video(server, &token, "first clip").await;
    let video_url = video["videoUrl"].as_str().unwrap_or_default();
    let thumbnail_url = video["thumbnailUrl"].as_str().unwrap_or_default();
    assert!(video_url.starts_with(&format!("{BASE}/uploads/")), "{video_url}");
    assert!(video_url.ends_with(".mp4"));
    assert!(thumbnail_url.starts_with(&format!("{BASE}/uploads/")));
    assert!(thumbnail_url.ends_with(".png"));
    assert!(!video["blurhash"].as_str().unwrap_or_default().is_empty());
    assert_eq!(video["likeCount"], 0);
    assert_eq!(video["commentCount"], 0);
    assert_eq!(video["views"], 0);
    assert_eq!(video["caption"], "first clip");
    assert_eq!(video["userId"], user_id.to_string());

    let transcoded = app
        .uploads
        .path()
        .join(video_url.rsplit('/').next().unwrap_or_default());
    assert!(transcoded.exists());

    upload_video(server, &token, "second clip").await;

    let res = server
        .get("/api/v1/videos/user")
        .authorization_bearer(&token)
        .await;
    let page = res.json::<Value>();
    assert_eq!(page["total"], 2);
    assert_eq!(page["page"], 1);
    assert_eq!(page["pageSize"], 9);
    assert_eq!(page["videos"][0]["caption"], "second clip");
    assert!(page["videos"][1]["videoUrl"]
        .as_str()
        .unwrap_or_default()
        .starts_with(BASE));

    let res = server
        .get(&format!("/api/v1/videos/user/{user_id}?page=2"))
        .authorization_bearer(&token)
        .await;
    let page = res.json::<Value>();
    assert_eq!(page["total"], 2);
    assert_eq!(page["videos"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_api_video_upload_requires_both_files() {
    let app = setup_test_server().await;
    let server = &app.server;
    let (_, token) = register_and_login(server, "sam").await;

    let res = server
        .post("/api/v1/videos/upload")
        .authorization_bearer(&token)
        .multipart(
            MultipartForm::new()
                .add_text("caption", "no thumbnail")
                .add_part(
                    "video",
                    Part::bytes(b"frames".to_vec())
                        .file_name("clip.mp4")
                        .mime_type("video/mp4"),
                ),
        )
        .expect_failure()
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&res), "bad_request");

    let res = server
        .post("/api/v1/videos/upload")
        .authorization_bearer(&token)
        .multipart(
            MultipartForm::new()
                .add_part(
                    "video",
                    Part::bytes(b"frames".to_vec())
                        .file_name("clip.txt")
                        .mime_type("text/plain"),
                )
                .add_part("thumbnail", png_part("cover.png")),
        )
        .expect_failure()
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_views_likes_comments() {
    let app = setup_test_server().await;
    let server = &app.server;
    let (_, owner) = register_and_login(server, "owner").await;
    let (fan_id, fan) = register_and_login(server, "fan").await;

    let video = upload_video(server, &owner, "watch me").await;
    let video_id = video["id"].as_str().unwrap_or_default().to_string();

    let res = server
        .get(&format!("/api/v1/videos/view/{video_id}"))
        .authorization_bearer(&fan)
        .await;
    let body = res.json::<Value>();
    assert_eq!(body["isFirstView"], true);
    assert_eq!(body["video"]["views"], 1);
    assert!(body["video"]["videoUrl"]
        .as_str()
        .unwrap_or_default()
        .starts_with(BASE));

    let res = server
        .get(&format!("/api/v1/videos/view/{video_id}"))
        .authorization_bearer(&fan)
        .await;
    let body = res.json::<Value>();
    assert_eq!(body["isFirstView"], false);
    assert_eq!(body["video"]["views"], 1);

    let missing = Uuid::new_v4();
    server
        .get(&format!("/api/v1/videos/view/{missing}"))
        .authorization_bearer(&fan)
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .post(&format!("/api/v1/videos/like/{video_id}"))
        .authorization_bearer(&fan)
        .await
        .assert_status_ok();
    let res = server
        .post(&format!("/api/v1/videos/like/{video_id}"))
        .authorization_bearer(&fan)
        .expect_failure()
        .await;
    assert_eq!(error_code(&res), "already_liked");
    server
        .post(&format!("/api/v1/videos/like/{missing}"))
        .authorization_bearer(&fan)
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .post(&format!("/api/v1/videos/dislike/{video_id}"))
        .authorization_bearer(&fan)
        .await
        .assert_status_ok();
    let res = server
        .post(&format!("/api/v1/videos/dislike/{video_id}"))
        .authorization_bearer(&fan)
        .expect_failure()
        .await;
    assert_eq!(error_code(&res), "not_liked");

    let res = server
        .post(&format!("/api/v1/videos/comment/{video_id}"))
        .authorization_bearer(&fan)
        .json(&json!({"text": "   "}))
        .expect_failure()
        .await;
    assert_eq!(error_code(&res), "empty_comment");

    // the fan gets a profile picture so the populated author has a path to resolve
    server
        .post("/api/v1/user/update")
        .authorization_bearer(&fan)
        .multipart(MultipartForm::new().add_part("image", png_part("fan.png")))
        .await
        .assert_status_ok();

    let res = server
        .post(&format!("/api/v1/videos/comment/{video_id}"))
        .authorization_bearer(&fan)
        .json(&json!({"text": "great clip"}))
        .await;
    res.assert_status(StatusCode::CREATED);
    assert_eq!(res.json::<Value>()["comment"]["text"], "great clip");

    server
        .post(&format!("/api/v1/videos/comment/{video_id}"))
        .authorization_bearer(&owner)
        .json(&json!({"text": "thanks"}))
        .await
        .assert_status(StatusCode::CREATED);

    let res = server
        .get(&format!("/api/v1/videos/comment/{video_id}"))
        .authorization_bearer(&owner)
        .await;
    let comments = res.json::<Value>()["comments"].clone();
    assert_eq!(comments.as_array().map(Vec::len), Some(2));
    assert_eq!(comments[0]["text"], "thanks");
    assert_eq!(comments[0]["userId"]["userName"], "owner");
    assert_eq!(comments[0]["userId"]["imageUrl"], "");
    assert_eq!(comments[1]["userId"]["id"], fan_id.to_string());
    assert!(comments[1]["userId"]["imageUrl"]
        .as_str()
        .unwrap_or_default()
        .starts_with(&format!("{BASE}/uploads/")));

    let res = server
        .get(&format!("/api/v1/videos/view/{video_id}"))
        .authorization_bearer(&owner)
        .await;
    let video = res.json::<Value>()["video"].clone();
    assert_eq!(video["likeCount"], 0);
    assert_eq!(video["commentCount"], 2);
    assert_eq!(video["views"], 2);
}

#[tokio::test]
async fn test_api_follow_graph() {
    let app = setup_test_server().await;
    let server = &app.server;
    let (alice_id, alice) = register_and_login(server, "alice").await;
    let (bob_id, bob) = register_and_login(server, "bob").await;

    server
        .post(&format!("/api/v1/user/{bob_id}/follow"))
        .authorization_bearer(&alice)
        .await
        .assert_status_ok();

    let res = server
        .post(&format!("/api/v1/user/{bob_id}/follow"))
        .authorization_bearer(&alice)
        .expect_failure()
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&res), "follow_error");

    let res = server
        .post(&format!("/api/v1/user/{alice_id}/follow"))
        .authorization_bearer(&alice)
        .expect_failure()
        .await;
    assert_eq!(error_code(&res), "follow_error");

    server
        .post(&format!("/api/v1/user/{}/follow", Uuid::new_v4()))
        .authorization_bearer(&alice)
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let res = server
        .get("/api/v1/user/profile?userName=bob")
        .authorization_bearer(&alice)
        .await;
    let profile = res.json::<Value>();
    assert_eq!(profile["followers"], 1);
    assert_eq!(profile["following"], 0);

    let res = server
        .get("/api/v1/user/followers?userName=bob")
        .authorization_bearer(&alice)
        .await;
    let page = res.json::<Value>();
    assert_eq!(page["pageSize"], 12);
    assert_eq!(page["followers"][0]["userName"], "alice");

    let res = server
        .get("/api/v1/user/following")
        .authorization_bearer(&alice)
        .await;
    assert_eq!(res.json::<Value>()["following"][0]["id"], bob_id.to_string());

    server
        .get("/api/v1/user/profile?userName=nobody")
        .authorization_bearer(&bob)
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .post(&format!("/api/v1/user/{bob_id}/unfollow"))
        .authorization_bearer(&alice)
        .await
        .assert_status_ok();
    let res = server
        .post(&format!("/api/v1/user/{bob_id}/unfollow"))
        .authorization_bearer(&alice)
        .expect_failure()
        .await;
    assert_eq!(error_code(&res), "unfollow_error");
}

#[tokio::test]
async fn test_api_search() {
    let app = setup_test_server().await;
    let server = &app.server;
    let (_, token) = register_and_login(server, "skater_kid").await;
    register_and_login(server, "chef").await;

    let res = server
        .get("/api/v1/user/search?q=SKATER")
        .authorization_bearer(&token)
        .await;
    let users = res.json::<Value>()["users"].clone();
    assert_eq!(users.as_array().map(Vec::len), Some(1));
    assert_eq!(users[0]["userName"], "skater_kid");

    upload_video(server, &token, "kickflip at the park").await;
    upload_video(server, &token, "making pasta").await;

    let res = server
        .get("/api/v1/videos/search?q=kickflip")
        .authorization_bearer(&token)
        .await;
    let page = res.json::<Value>();
    assert_eq!(page["total"], 1);
    assert_eq!(page["videos"][0]["caption"], "kickflip at the park");
    assert!(page["videos"][0]["thumbnailUrl"]
        .as_str()
        .unwrap_or_default()
        .starts_with(BASE));

    // LIKE metacharacters in the query match literally
    let res = server
        .get("/api/v1/user/search?q=_")
        .authorization_bearer(&token)
        .await;
    let users = res.json::<Value>()["users"].clone();
    assert_eq!(users.as_array().map(Vec::len), Some(1));
    assert_eq!(users[0]["userName"], "skater_kid");

    upload_video(server, &token, "50% off").await;
    for (query, expected) in [("%25", 1), ("_", 0), ("p_sta", 0), ("!", 0), ("0%25%20o", 1)] {
        let res = server
            .get(&format!("/api/v1/videos/search?q={query}"))
            .authorization_bearer(&token)
            .await;
        assert_eq!(res.json::<Value>()["total"], expected, "q={query}");
    }
}

#[tokio::test]
async fn test_api_huge_page_numbers() {
    let app = setup_test_server().await;
    let server = &app.server;
    let (_, token) = register_and_login(server, "sam").await;
    upload_video(server, &token, "only clip").await;

    let res = server
        .get("/api/v1/videos/user?page=3000000000000000000")
        .authorization_bearer(&token)
        .await;
    let page = res.json::<Value>();
    assert_eq!(page["page"], crate::user::MAX_PAGE);
    assert_eq!(page["total"], 1);
    assert_eq!(page["videos"].as_array().map(Vec::len), Some(0));

    let res = server
        .get(&format!("/api/v1/user/followers?page={}", u64::MAX))
        .authorization_bearer(&token)
        .await;
    assert_eq!(res.json::<Value>()["followers"].as_array().map(Vec::len), Some(0));

    let res = server
        .get("/api/v1/videos/search?q=clip&page=3000000000000000000")
        .authorization_bearer(&token)
        .await;
    assert_eq!(res.json::<Value>()["total"], 1);
}

async fn spawn_recommender(status: StatusCode) -> String {
    let app = Router::new().route(
        "/recommend",
        post(move |Json(req): Json<Value>| async move {
            (status, Json(json!({"userId": req["userId"], "videos": ["a", "b"]})))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_api_recommend_proxy() {
    let upstream = spawn_recommender(StatusCode::OK).await;
    let app = setup_test_server_with(&upstream).await;
    let (user_id, token) = register_and_login(&app.server, "sam").await;

    let res = app
        .server
        .post("/api/v1/videos/recommend")
        .authorization_bearer(&token)
        .await;
    assert_eq!(
        res.json::<Value>(),
        json!({"userId": user_id.to_string(), "videos": ["a", "b"]})
    );
}

#[tokio::test]
async fn test_api_recommend_upstream_failure() {
    let upstream = spawn_recommender(StatusCode::SERVICE_UNAVAILABLE).await;
    let app = setup_test_server_with(&upstream).await;
    let (_, token) = register_and_login(&app.server, "sam").await;

    let res = app
        .server
        .post("/api/v1/videos/recommend")
        .authorization_bearer(&token)
        .expect_failure()
        .await;
    res.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body = res.json::<Value>();
    assert_eq!(body["errorCode"], "recommendation_error");
    assert_eq!(body["errorMessage"]["videos"], json!(["a", "b"]));
}

#[tokio::test]
async fn test_api_recommend_unreachable() {
    let app = setup_test_server().await;
    let (_, token) = register_and_login(&app.server, "sam").await;

    let res = app
        .server
        .post("/api/v1/videos/recommend")
        .authorization_bearer(&token)
        .expect_failure()
        .await;
    res.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_code(&res), "recommendation_error");
    assert!(res.json::<Value>()["errorMessage"].is_string());
}

#[tokio::test]
async fn test_api_openapi_document() {
    let app = setup_test_server().await;
    let res = app.server.get("/api/v1/openapi.json").await;
    let doc = res.json::<Value>();
    assert!(doc["paths"]["/api/v1/videos/upload"].is_object());
}
