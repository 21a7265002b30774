//! Health check and shared request plumbing.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Multipart, State};
use bytes::Bytes;
use courier_metadata::MetadataStore;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health - Liveness probe.
///
/// Intentionally unauthenticated for load balancers and k8s probes.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.metadata.health_check().await?;
    Ok(Json(HealthResponse { status: "healthy" }))
}

/// One file part of a multipart request.
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

/// Decoded multipart request: the JSON `data` field plus any `file` parts.
pub struct MultipartPayload {
    pub data: Option<String>,
    pub files: Vec<UploadedFile>,
}

/// Drain a multipart request into memory.
///
/// The `data` field may arrive after the file parts, so files are buffered
/// before validation runs. The router's body limit bounds the total size.
pub async fn read_multipart(multipart: &mut Multipart) -> ApiResult<MultipartPayload> {
    let mut data = None;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("multipart form data is required: {e}")))?
    {
        match field.name() {
            Some("data") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read data field: {e}")))?;
                data = Some(text);
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read file part: {e}")))?;
                files.push(UploadedFile { filename, bytes });
            }
            _ => {
                // Unknown fields are drained and ignored
                field.bytes().await.ok();
            }
        }
    }

    Ok(MultipartPayload { data, files })
}

/// Parse the JSON `data` field of a multipart payload.
pub fn parse_data<T: DeserializeOwned>(payload: &MultipartPayload) -> ApiResult<T> {
    let Some(data) = &payload.data else {
        return Err(ApiError::BadRequest("data field is required".to_string()));
    };
    serde_json::from_str(data)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON in data field: {e}")))
}
