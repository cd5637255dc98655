mod analyze;
mod health;
mod samples;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::state::AppState;

pub fn router(state: AppState, settings: &Settings) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/analyze", post(analyze::analyze))
        .route("/api/samples", get(samples::list_samples))
        .route("/api/samples/{id}", get(samples::download_sample))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(settings.max_upload_bytes))
        .layer(cors(&settings.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Credentials are allowed, so wildcards have to be expressed by mirroring
/// the request instead of `*`.
fn cors(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        let list: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(list)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::path::Path;

    use axum::body::Body;
    use axum::http::Response;
    use axum::Router;
    use serde_json::Value;
    use tillscan_ocr::MockRecognizer;

    use crate::analyzer::Analyzer;
    use crate::config::Settings;
    use crate::state::AppState;

    pub fn settings(vars: &[(&str, &str)]) -> Settings {
        let env: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| env.get(key).cloned()).unwrap()
    }

    /// No vision client; OCR answers with `ocr_text`.
    pub fn app(ocr_text: &str, samples_dir: &Path) -> Router {
        app_with(ocr_text, samples_dir, &settings(&[]))
    }

    pub fn app_with(ocr_text: &str, samples_dir: &Path, settings: &Settings) -> Router {
        let analyzer = Analyzer::new(None, Some(Box::new(MockRecognizer::new(ocr_text))), true);
        let state = AppState::new(analyzer, samples_dir);
        super::router(state, settings)
    }

    pub async fn body_bytes(resp: Response<Body>) -> Vec<u8> {
        axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    pub async fn body_json(resp: Response<Body>) -> Value {
        serde_json::from_slice(&body_bytes(resp).await).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn preflight_echoes_allowed_origin() {
        let dir = tempfile::tempdir().unwrap();
        let resp = app("", dir.path())
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/analyze")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:5173"
        );
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn unknown_origin_gets_no_cors_header() {
        let dir = tempfile::tempdir().unwrap();
        let resp = app("", dir.path())
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "http://evil.test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let resp = app("", dir.path())
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
