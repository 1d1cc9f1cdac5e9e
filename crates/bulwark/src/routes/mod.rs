//! HTTP routes for Bulwark.

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use bulwark_common::UploadPurpose;
use bulwark_common::constants::codes;
use tower_http::trace::TraceLayer;

use crate::guard::{self, ErrorBody, ErrorDetail};
use crate::state::AppState;

mod csrf;
mod health;
mod upload;

pub use upload::UploadResponse;

/// Create the main application router.
///
/// Layer order, outermost first: tracing, rate limit, CSRF, handler.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))

        // CSRF token issuance
        .route("/api/csrf", get(csrf::issue_token))

        // Uploads; per-purpose ceilings are enforced by the validator
        .route(
            "/api/uploads/{purpose}",
            post(upload::upload).layer(DefaultBodyLimit::max(UploadPurpose::max_body_bytes())),
        )

        // Unmatched paths still pass through both guards
        .fallback(not_found)

        .layer(middleware::from_fn_with_state(state.clone(), guard::csrf))
        .layer(middleware::from_fn_with_state(state.clone(), guard::rate_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            ok: false,
            error: ErrorDetail {
                code: codes::NOT_FOUND,
                message: "No such route".to_string(),
            },
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode, header};
    use axum::response::Response;
    use bulwark_common::RuntimePosture;
    use bulwark_common::constants::headers::{RETRY_AFTER, X_RATELIMIT_REMAINING};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::ratelimit::RateLimiter;
    use crate::upload::UploadValidator;

    fn state_for(posture: RuntimePosture) -> AppState {
        let config = AppConfig {
            posture,
            ..AppConfig::default()
        };
        let limiter = RateLimiter::new(posture, None);
        AppState::from_parts(config, limiter, UploadValidator::default())
    }

    fn dev_router() -> Router {
        create_router(state_for(RuntimePosture::Development))
    }

    fn post(uri: &str, csrf: Option<(&str, &str)>, body: Vec<u8>) -> Request<Body> {
        let mut builder = Request::builder().method(Method::POST).uri(uri);
        if let Some((cookie, header_value)) = csrf {
            builder = builder
                .header(header::COOKIE, format!("csrf_token={cookie}"))
                .header("x-csrf-token", header_value);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([0, 128, 255]));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    const VALID: Option<(&str, &str)> = Some(("abc123", "abc123"));

    #[tokio::test]
    async fn test_health_is_unguarded() {
        let app = create_router(state_for(RuntimePosture::Production));
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_ready_in_development() {
        let response = dev_router().oneshot(get("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_fails_without_store_in_production() {
        let app = create_router(state_for(RuntimePosture::Production));
        let response = app.oneshot(get("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_csrf_endpoint_sets_cookie_and_returns_token() {
        let response = dev_router().oneshot(get("/api/csrf")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let set_cookie = response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.starts_with("csrf_token="), "{set_cookie}");
        assert!(set_cookie.contains("SameSite=Lax"), "{set_cookie}");
        assert!(!set_cookie.contains("HttpOnly"), "{set_cookie}");

        let body = json(response).await;
        let token = body["token"].as_str().unwrap();
        assert_eq!(body["ok"], true);
        assert!(set_cookie.contains(token));
    }

    #[tokio::test]
    async fn test_csrf_endpoint_reuses_existing_cookie() {
        let request = Request::builder()
            .uri("/api/csrf")
            .header(header::COOKIE, "csrf_token=already-here")
            .body(Body::empty())
            .unwrap();
        let response = dev_router().oneshot(request).await.unwrap();
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(json(response).await["token"], "already-here");
    }

    #[tokio::test]
    async fn test_matching_csrf_pair_passes_guards() {
        let response = dev_router()
            .oneshot(post("/api/comments", VALID, Vec::new()))
            .await
            .unwrap();
        // No comment handler is mounted; reaching the fallback means both guards admitted it
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[X_RATELIMIT_REMAINING], "4");
        assert_eq!(json(response).await["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_mismatched_csrf_pair_is_rejected() {
        let response = dev_router()
            .oneshot(post("/api/comments", Some(("abc123", "abc124")), Vec::new()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = json(response).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["code"], "CSRF_INVALID");
    }

    #[tokio::test]
    async fn test_missing_csrf_header_is_rejected() {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri("/api/posts/7")
            .header(header::COOKIE, "csrf_token=abc123")
            .body(Body::empty())
            .unwrap();
        let response = dev_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_comment_budget_exhausts_with_retry_after() {
        let app = dev_router();

        for _ in 0..5 {
            let response = app
                .clone()
                .oneshot(post("/api/comments", VALID, Vec::new()))
                .await
                .unwrap();
            assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        }

        let response = app
            .oneshot(post("/api/comments", VALID, Vec::new()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[X_RATELIMIT_REMAINING], "0");
        let retry: u64 = response.headers()[RETRY_AFTER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&retry), "retry-after {retry}");
        assert_eq!(json(response).await["error"]["code"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn test_rate_limit_runs_before_csrf() {
        let app = dev_router();

        // Rejected by CSRF, but still charged against the budget
        for _ in 0..5 {
            let response = app
                .clone()
                .oneshot(post("/api/comments", None, Vec::new()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }

        let response = app
            .oneshot(post("/api/comments", None, Vec::new()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_production_without_store_fails_closed() {
        let app = create_router(state_for(RuntimePosture::Production));
        let response = app
            .oneshot(post("/api/uploads/avatar", VALID, png(4, 4)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json(response).await;
        assert_eq!(body["error"]["code"], "INTERNAL");
        assert!(!body.to_string().to_lowercase().contains("redis"));
    }

    #[tokio::test]
    async fn test_upload_accepts_png() {
        let response = dev_router()
            .oneshot(post("/api/uploads/avatar", VALID, png(32, 16)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["mime"], "image/png");
        assert_eq!(body["purpose"], "avatar");
        assert_eq!(body["width"], 32);
        assert_eq!(body["height"], 16);
        assert_eq!(body["stripped"], true);
        assert_eq!(body["content_key"].as_str().unwrap().len(), 43);
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let app = dev_router();
        let cases: [(&str, Vec<u8>, StatusCode, &str); 5] = [
            ("/api/uploads/avatar", Vec::new(), StatusCode::BAD_REQUEST, "UPLOAD_EMPTY"),
            (
                "/api/uploads/avatar",
                b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>".to_vec(),
                StatusCode::BAD_REQUEST,
                "UPLOAD_UNRECOGNIZED",
            ),
            (
                "/api/uploads/registration-avatar",
                b"GIF89a\x01\x00\x01\x00\x00\x00\x00".to_vec(),
                StatusCode::BAD_REQUEST,
                "UPLOAD_TYPE_NOT_ALLOWED",
            ),
            (
                "/api/uploads/favicon",
                vec![0xFF; 1024 * 1024 + 1],
                StatusCode::PAYLOAD_TOO_LARGE,
                "UPLOAD_TOO_LARGE",
            ),
            ("/api/uploads/wallpaper", png(4, 4), StatusCode::BAD_REQUEST, "UPLOAD_UNKNOWN_PURPOSE"),
        ];

        for (uri, body, status, code) in cases {
            let response = app.clone().oneshot(post(uri, VALID, body)).await.unwrap();
            assert_eq!(response.status(), status, "{uri}");
            assert_eq!(json(response).await["error"]["code"], code, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_upload_over_dimension_ceiling() {
        let response = dev_router()
            .oneshot(post("/api/uploads/favicon", VALID, png(4097, 1)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json(response).await;
        assert_eq!(body["error"]["code"], "UPLOAD_DIMENSIONS_EXCEEDED");
        assert!(body["error"]["message"].as_str().unwrap().contains("4097x1"));
    }
}
