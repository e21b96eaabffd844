use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Dental clinic API is running!" }))
        .nest("/appointments", appointment_routes(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};
    use tower::ServiceExt;

    #[tokio::test]
    async fn root_reports_liveness() {
        let app = create_router(TestConfig::default().to_arc());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Dental clinic API is running!");
    }

    #[tokio::test]
    async fn appointments_are_nested_and_protected() {
        let config = TestConfig::default();
        let app = create_router(config.to_arc());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/appointments").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // A dentist lacks the delete permission, so this never reaches Supabase.
        let token = JwtTestUtils::create_test_token(&TestUser::dentist("dr@clinic.test"), &config.jwt_secret, None);
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/appointments/6f1c2f0e-8a4b-4a43-9a57-0c9a5a0b7e11")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].is_string());
    }
}
