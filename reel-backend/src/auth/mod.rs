//! Account registration and token issuance
//!

pub mod middleware;
pub mod token;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use reel_shared::error::ReelError;
use reel_shared::urls::ResolveUrls;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::user::{self, Account};
use crate::web::WebError;
use crate::SharedState;
use token::TokenKind;

pub const MIN_PASSWORD_LENGTH: usize = 6;

pub async fn hash_password(password: String, cost: u32) -> Result<String, ReelError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ReelError::Other(format!("Password hashing task failed: {e}")))?
        .map_err(|e| ReelError::Other(format!("Failed to hash password: {e}")))
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, ReelError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ReelError::Other(format!("Password verification task failed: {e}")))?
        .map_err(|e| ReelError::Other(format!("Failed to verify password: {e}")))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub email: String,
    pub user_name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: Account,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    #[serde(default)]
    pub token: String,
}

/// The user fields carried in a verified token.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedUser {
    pub id: Uuid,
    pub email: String,
    pub user_name: String,
    pub display_name: String,
    pub image_url: String,
    pub blurhash: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Missing fields or short password"),
        (status = 409, description = "Email or user name already taken")
    )
)]
#[instrument(level = "info", skip_all)]
pub async fn register(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), WebError> {
    let email = req.email.trim().to_lowercase();
    let user_name = req.user_name.trim().to_string();

    if email.is_empty() || user_name.is_empty() || req.password.is_empty() {
        return Err(WebError::bad_request(
            "bad_request",
            "userName, email and password are required",
        ));
    }
    if req.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(WebError::bad_request(
            "bad_request",
            format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
        ));
    }

    let state = state.read().await;
    let existing = user::Entity::find()
        .filter(
            Condition::any()
                .add(user::Column::Email.eq(&email))
                .add(user::Column::UserName.eq(&user_name)),
        )
        .one(&state.conn)
        .await?;
    if existing.is_some() {
        debug!("Registration conflict for {email} / {user_name}");
        return Err(ReelError::Conflict("Email or userName already exists".to_string()).into());
    }

    let password_hash = hash_password(req.password, state.password_cost).await?;
    let user = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        user_name: Set(user_name.clone()),
        display_name: Set(user_name),
        password_hash: Set(password_hash),
        image_url: Set(String::new()),
        blurhash: Set(String::new()),
        created: Set(chrono::Utc::now()),
    }
    .insert(&state.conn)
    .await
    .inspect_err(|err| error!("Failed to save user: {:?}", err))?;

    info!(user = %user.id, "Registered user {}", user.user_name);
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            email: user.email,
            user_name: user.user_name,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Wrong password"),
        (status = 404, description = "No account with that email")
    )
)]
#[instrument(level = "info", skip_all)]
pub async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, WebError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(WebError::bad_request(
            "bad_request",
            "email and password are required",
        ));
    }

    let state = state.read().await;
    let user = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&state.conn)
        .await?
        .ok_or_else(|| WebError::not_found("User not found"))?;

    if !verify_password(req.password, user.password_hash.clone()).await? {
        return Err(WebError::unauthorized("Invalid password"));
    }

    let pair = state.tokens.issue(&user)?;
    Ok(Json(LoginResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        user: Account::from(user).with_resolved_urls(&state.resolver),
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/verifyToken",
    tag = "auth",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token is valid", body = VerifiedUser),
        (status = 400, description = "Token is invalid or expired")
    )
)]
pub async fn verify_token(
    State(state): State<SharedState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<VerifiedUser>, WebError> {
    let state = state.read().await;
    let claims = state
        .tokens
        .verify(req.token.trim(), TokenKind::Access)
        .map_err(|_| WebError::bad_request("invalid_token", "Invalid or expired token"))?;

    let mut verified = VerifiedUser {
        id: claims.id,
        email: claims.email,
        user_name: claims.user_name,
        display_name: claims.display_name,
        image_url: claims.image_url,
        blurhash: claims.blurhash,
    };
    state.resolver.resolve_in_place(&mut verified.image_url);
    Ok(Json(verified))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refreshToken",
    tag = "auth",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "A fresh token pair", body = LoginResponse),
        (status = 400, description = "Refresh token is invalid or expired"),
        (status = 404, description = "The account no longer exists")
    )
)]
pub async fn refresh_token(
    State(state): State<SharedState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<LoginResponse>, WebError> {
    let state = state.read().await;
    let claims = state
        .tokens
        .verify(req.token.trim(), TokenKind::Refresh)
        .map_err(|_| WebError::bad_request("invalid_token", "Invalid or expired refresh token"))?;

    let user = user::Entity::find_by_id(claims.id)
        .one(&state.conn)
        .await?
        .ok_or_else(|| WebError::not_found("User not found"))?;

    let pair = state.tokens.issue(&user)?;
    Ok(Json(LoginResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        user: Account::from(user).with_resolved_urls(&state.resolver),
    }))
}
