use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::Json;
use tillscan_core::AnalyzeResponse;

use crate::error::ApiError;
use crate::state::AppState;

/// An upload pulled out of the multipart body.
struct Upload {
    content_type: Option<String>,
    data: Vec<u8>,
}

/// POST /api/analyze
///
/// Expects a multipart `file` field holding an image or PDF. Analysis
/// problems come back as warnings with a 200; only a bad upload is an error.
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let upload = read_upload(multipart?).await?;

    if upload.data.is_empty() {
        return Err(ApiError::bad_request("Uploaded file is empty"));
    }
    let mime_type = match upload.content_type.as_deref() {
        Some(ct) if is_supported(ct) => ct.to_string(),
        other => {
            return Err(ApiError::bad_request(format!(
                "Unsupported file type: {}. Please upload an image (PNG, JPG) or PDF.",
                other.unwrap_or("None")
            )))
        }
    };

    Ok(Json(state.analyzer.process(&upload.data, &mime_type).await))
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        // Part header first, then whatever the file name suggests.
        let content_type = field.content_type().map(str::to_string).or_else(|| {
            field
                .file_name()
                .and_then(|name| mime_guess::from_path(name).first())
                .map(|m| m.essence_str().to_string())
        });
        let data = field.bytes().await?.to_vec();
        return Ok(Upload { content_type, data });
    }
    Err(ApiError::unprocessable("Missing multipart field 'file'"))
}

fn is_supported(content_type: &str) -> bool {
    content_type.starts_with("image/") || content_type.starts_with("application/pdf")
}
