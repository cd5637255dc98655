use std::path::Path;

use axum::extract::{Path as UrlPath, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Serialize, PartialEq)]
pub struct Sample {
    pub id: String,
    pub label: String,
    pub mime_type: String,
}

/// GET /api/samples
pub async fn list_samples(State(state): State<AppState>) -> Result<Json<Vec<Sample>>, ApiError> {
    let dir = state.samples_dir.clone();
    let samples = tokio::task::spawn_blocking(move || scan(&dir))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))??;
    Ok(Json(samples))
}

/// GET /api/samples/{id}
pub async fn download_sample(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
) -> Result<Response, ApiError> {
    if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
        return Err(ApiError::not_found("Sample not found"));
    }
    let path = state.samples_dir.join(&id);
    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("Sample not found"))
        }
        Err(e) => return Err(e.into()),
    };

    let headers = [
        (header::CONTENT_TYPE, mime_for(&id)),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{id}\"")),
    ];
    Ok((headers, data).into_response())
}

/// Regular files in `dir`, sorted by name. A missing directory is empty.
fn scan(dir: &Path) -> Result<Vec<Sample>, ApiError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut samples = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let id = entry.file_name().to_string_lossy().into_owned();
        let stem = Path::new(&id)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone());
        samples.push(Sample {
            label: title_case(&stem.replace('_', " ")),
            mime_type: mime_for(&id),
            id,
        });
    }
    samples.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(samples)
}

fn mime_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| FALLBACK_MIME.to_string())
}

/// Capitalize the first letter of every run of letters, lowercase the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn title_case_words() {
        assert_eq!(title_case("east repair"), "East Repair");
        assert_eq!(title_case("WALMART receipt2"), "Walmart Receipt2");
        assert_eq!(title_case("cafe 3b"), "Cafe 3B");
    }

    #[tokio::test]
    async fn lists_files_sorted_with_labels() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("walmart_receipt.png"), b"png").unwrap();
        std::fs::write(dir.path().join("east_repair.pdf"), b"pdf").unwrap();
        std::fs::write(dir.path().join("notes"), b"txt").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let resp = app("", dir.path()).oneshot(get("/api/samples")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            serde_json::json!([
                { "id": "east_repair.pdf", "label": "East Repair", "mime_type": "application/pdf" },
                { "id": "notes", "label": "Notes", "mime_type": "application/octet-stream" },
                { "id": "walmart_receipt.png", "label": "Walmart Receipt", "mime_type": "image/png" }
            ])
        );
    }

    #[tokio::test]
    async fn missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let resp = app("", &dir.path().join("absent"))
            .oneshot(get("/api/samples"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn download_returns_bytes_and_headers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("east_repair.jpg"), b"jpeg-bytes").unwrap();

        let resp = app("", dir.path())
            .oneshot(get("/api/samples/east_repair.jpg"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(
            resp.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"east_repair.jpg\""
        );
        assert_eq!(body_bytes(resp).await, b"jpeg-bytes");
    }

    #[tokio::test]
    async fn unknown_sample_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let resp = app("", dir.path()).oneshot(get("/api/samples/nope.png")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["detail"], "Sample not found");
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let samples = dir.path().join("samples");
        std::fs::create_dir(&samples).unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();

        let resp = app("", &samples)
            .oneshot(get("/api/samples/..%2Fsecret.txt"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
