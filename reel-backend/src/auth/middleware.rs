use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sea_orm::EntityTrait;
use uuid::Uuid;

use super::token::TokenKind;
use crate::entity::user;
use crate::web::WebError;
use crate::SharedState;

/// The caller, as established by a valid bearer token.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub user_name: String,
}

impl From<user::Model> for AuthUser {
    fn from(user: user::Model) -> Self {
        AuthUser {
            id: user.id,
            email: user.email,
            user_name: user.user_name,
        }
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Middleware that requires authentication
/// Verifies the access token, loads the user from DB, and adds it to request extensions
pub async fn require_auth(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(&request) {
        Some(token) => token.to_string(),
        None => return WebError::unauthorized("Missing bearer token").into_response(),
    };

    let state_guard = state.read().await;
    let claims = match state_guard.tokens.verify(&token, TokenKind::Access) {
        Ok(claims) => claims,
        Err(err) => return WebError::from(err).into_response(),
    };

    let user = match user::Entity::find_by_id(claims.id)
        .one(&state_guard.conn)
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!("User {} from token not found in database", claims.id);
            return WebError::unauthorized("Unknown user").into_response();
        }
        Err(e) => {
            tracing::error!("Failed to load user from database: {:?}", e);
            return WebError::from(e).into_response();
        }
    };
    drop(state_guard);

    let auth_user: AuthUser = user.into();
    request.extensions_mut().insert(auth_user);

    next.run(request).await
}
