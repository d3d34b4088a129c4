//! Proxy to the external recommendation service
//!

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::web::WebError;
use crate::SharedState;

/// Why a recommendation call failed, carrying whatever the upstream sent back.
#[derive(Debug)]
pub enum RecommendError {
    /// The service answered with a non-success status.
    Upstream { status: u16, body: Value },
    /// The request never completed.
    Transport(String),
}

impl RecommendError {
    /// The upstream error body, or the transport message.
    pub fn detail(self) -> Value {
        match self {
            RecommendError::Upstream { body, .. } => body,
            RecommendError::Transport(msg) => Value::String(msg),
        }
    }
}

pub struct RecommendationClient {
    base_url: String,
    http: reqwest::Client,
}

impl RecommendationClient {
    pub fn new(base_url: impl AsRef<str>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                error!(error = %e, "Failed to create HTTP client for recommendations, using default client");
                reqwest::Client::default()
            });
        Self {
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/recommend", self.base_url)
    }

    /// `POST <base>/recommend` with `{"userId": ..}`, returning the payload verbatim.
    pub async fn recommend(&self, user_id: Uuid) -> Result<Value, RecommendError> {
        let url = self.endpoint();
        debug!(%url, %user_id, "Requesting recommendations");

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "userId": user_id }))
            .send()
            .await
            .map_err(|e| RecommendError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RecommendError::Transport(e.to_string()))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        if status.is_success() {
            Ok(body)
        } else {
            Err(RecommendError::Upstream {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/videos/recommend",
    tag = "videos",
    responses(
        (status = 200, description = "The recommendation service payload, unchanged"),
        (status = 500, description = "The recommendation service failed")
    )
)]
pub async fn get_recommendations(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, WebError> {
    let state = state.read().await;
    match state.recommender.recommend(auth.id).await {
        Ok(payload) => Ok(Json(payload)),
        Err(err) => {
            error!("Error fetching recommendations: {:?}", err);
            Err(WebError::with_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "recommendation_error",
                err.detail(),
            ))
        }
    }
}
