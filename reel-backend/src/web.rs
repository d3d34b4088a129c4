//! Error responses and multipart helpers shared by the handlers
//!

use axum::extract::multipart::Field;
use axum::extract::Multipart;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use reel_shared::error::ReelError;
use reel_shared::media::UploadedFile;
use sea_orm::DbErr;
use serde_json::Value;
use tracing::{debug, error};

/// An API error, rendered as `{"errorCode": .., "errorMessage": ..}`.
#[derive(Debug)]
pub struct WebError {
    status: StatusCode,
    code: String,
    message: Value,
}

impl WebError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        WebError {
            status,
            code: code.into(),
            message: Value::String(message.into()),
        }
    }

    /// For errors that carry a structured body, such as an upstream response.
    pub fn with_body(status: StatusCode, code: impl Into<String>, message: Value) -> Self {
        WebError {
            status,
            code: code.into(),
            message,
        }
    }

    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_server_error",
            message,
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({
            "errorCode": self.code,
            "errorMessage": self.message,
        });
        let mut response = axum::response::Response::new(body.to_string().into());
        *response.status_mut() = self.status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}

impl From<ReelError> for WebError {
    fn from(err: ReelError) -> Self {
        match err {
            ReelError::ValidationError(msg) => WebError::bad_request("bad_request", msg),
            ReelError::Unauthorized(msg) => WebError::unauthorized(msg),
            ReelError::NotFound(msg) => WebError::not_found(msg),
            ReelError::Conflict(msg) => WebError::new(StatusCode::CONFLICT, "conflict", msg),
            other => {
                error!("Request failed: {other}");
                WebError::internal(other.to_string())
            }
        }
    }
}

impl From<DbErr> for WebError {
    fn from(err: DbErr) -> Self {
        error!("Database error: {:?}", err);
        WebError::internal(format!("Database error: {err}"))
    }
}

/// A parsed multipart body: the text fields and the files, in arrival order.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<(String, UploadedFile)>,
}

impl MultipartForm {
    /// Parts with a filename are files, everything else is text.
    pub async fn read(mut multipart: Multipart) -> Result<Self, WebError> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            error!("Failed to read multipart field: {:?}", e);
            WebError::bad_request("bad_request", format!("Failed to read multipart field: {e}"))
        })? {
            let name = field.name().unwrap_or("").to_string();
            match field.file_name().map(|s| s.to_string()) {
                Some(filename) => {
                    let file = read_file(field, filename).await?;
                    debug!(field = %name, filename = %file.filename, bytes = file.size(), "Received file");
                    form.files.push((name, file));
                }
                None => {
                    let text = field.text().await.map_err(|e| {
                        WebError::bad_request(
                            "bad_request",
                            format!("Failed to read field {name}: {e}"),
                        )
                    })?;
                    form.fields.push((name, text));
                }
            }
        }
        Ok(form)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// The first file uploaded under any of `names`.
    pub fn take_file(&mut self, names: &[&str]) -> Option<UploadedFile> {
        let index = self
            .files
            .iter()
            .position(|(field, _)| names.contains(&field.as_str()))?;
        Some(self.files.remove(index).1)
    }
}

async fn read_file(field: Field<'_>, filename: String) -> Result<UploadedFile, WebError> {
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = field.bytes().await.map_err(|e| {
        error!("Failed to read file data: {:?}", e);
        WebError::bad_request("bad_request", format!("Failed to read file data: {e}"))
    })?;
    Ok(UploadedFile::new(filename, content_type, data.to_vec()))
}
