use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use reel_shared::error::ReelError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::entity::user;

pub const TOKEN_TTL_DAYS: i64 = 30;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub id: Uuid,
    pub email: String,
    pub user_name: String,
    pub display_name: String,
    pub image_url: String,
    pub blurhash: String,
    pub exp: i64,
}

impl Claims {
    pub fn for_user(user: &user::Model, ttl: Duration) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            user_name: user.user_name.clone(),
            display_name: user.display_name.clone(),
            image_url: user.image_url.clone(),
            blurhash: user.blurhash.clone(),
            exp: (Utc::now() + ttl).timestamp(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Signs and verifies HS256 access and refresh tokens.
pub struct TokenService {
    access: Keys,
    refresh: Keys,
    ttl: Duration,
}

impl TokenService {
    pub fn new(access_secret: &str, refresh_secret: &str) -> Result<Self, ReelError> {
        if access_secret.is_empty() || refresh_secret.is_empty() {
            return Err(ReelError::Configuration(
                "Token secrets must not be empty".to_string(),
            ));
        }
        Ok(Self {
            access: Keys::from_secret(access_secret),
            refresh: Keys::from_secret(refresh_secret),
            ttl: Duration::days(TOKEN_TTL_DAYS),
        })
    }

    fn keys(&self, kind: TokenKind) -> &Keys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn sign(&self, user: &user::Model, kind: TokenKind) -> Result<String, ReelError> {
        let claims = Claims::for_user(user, self.ttl);
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.keys(kind).encoding,
        )
        .map_err(|e| {
            warn!("JWT encode error: {:?}", e);
            ReelError::Other(format!("Failed to sign token: {e}"))
        })
    }

    pub fn issue(&self, user: &user::Model) -> Result<TokenPair, ReelError> {
        debug!(user = %user.id, "Issuing token pair");
        Ok(TokenPair {
            access_token: self.sign(user, TokenKind::Access)?,
            refresh_token: self.sign(user, TokenKind::Refresh)?,
        })
    }

    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, ReelError> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<Claims>(token, &self.keys(kind).decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("JWT decode error: {:?}", e);
                ReelError::Unauthorized(format!("Invalid token: {e}"))
            })
    }
}
