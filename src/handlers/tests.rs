//! Route-level tests through the full router
//!
//! Each test drives one request through `create_router` with the bundled
//! sample artifacts.

#[cfg(test)]
mod route_tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::artifacts::ArtifactManifest;
    use crate::config::Config;
    use crate::handlers::predict::INVALID_INPUT_MESSAGE;
    use crate::inference::fixtures;
    use crate::models::PredictApiResponse;
    use crate::{create_router, AppState};

    const SAMPLE_FORM: &str = "b=350&d=500&fc=40&rho=1.2&a_d=2.5";

    fn app() -> Router {
        let manifest = ArtifactManifest {
            model_path: "artifacts/xgb_model.json".to_string(),
            model_sha256: "0".repeat(64),
            scaler_path: "artifacts/scaler.json".to_string(),
            scaler_sha256: "0".repeat(64),
            loaded_at: chrono::Utc::now(),
        };
        create_router(AppState {
            context: Arc::new(fixtures::context()),
            manifest: Arc::new(manifest),
            config: Config::default(),
        })
    }

    async fn send(request: Request<Body>) -> (StatusCode, String) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn json_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predict_api")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn form_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_home_page() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (status, html) = send(request).await;

        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("action=\"/predict\""));
        assert!(html.contains("name=\"rho\""));
        assert!(!html.contains("<img"));
    }

    #[tokio::test]
    async fn test_predict_api_success_is_deterministic() {
        let body = json!({"data": {"b": 350, "d": 500, "fc": 40, "rho": 1.2, "a_d": 2.5}});

        let (status, first) = send(json_request(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (_, second) = send(json_request(body)).await;
        assert_eq!(first, second);

        let parsed: PredictApiResponse = serde_json::from_str(&first).unwrap();
        assert!((parsed.prediction - 219.0).abs() < 1e-9);
        assert_eq!(parsed.explanation.len(), 5);

        // Attributions plus the baseline reproduce the prediction.
        let ctx = fixtures::context();
        let total = ctx.explainer().expected_value() + parsed.explanation.iter().sum::<f64>();
        assert!((total - parsed.prediction).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_predict_api_uses_given_order() {
        // Same numbers, different key order: the values are taken positionally.
        let reordered = json!({"data": {"a_d": 350, "rho": 500, "fc": 40, "d": 1.2, "b": 2.5}});
        let (status, body) = send(json_request(reordered)).await;
        assert_eq!(status, StatusCode::OK);

        let parsed: PredictApiResponse = serde_json::from_str(&body).unwrap();
        assert!((parsed.prediction - 219.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_predict_api_missing_data() {
        let (status, body) = send(json_request(json!({"features": [1, 2, 3]}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"error": "No data provided"}));

        let (status, body) = send(json_request(json!({"data": null}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"error": "No data provided"}));
    }

    #[tokio::test]
    async fn test_predict_api_empty_data_is_opaque_server_error() {
        let (status, body) = send(json_request(json!({"data": {}}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"error": "Internal server error"}));
    }

    #[tokio::test]
    async fn test_predict_api_non_numeric_value() {
        let body = json!({"data": {"b": "350", "d": 500, "fc": 40, "rho": 1.2, "a_d": 2.5}});
        let (status, _) = send(json_request(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_predict_form_success() {
        let (status, html) = send(form_request(SAMPLE_FORM)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("The shear capacity is 219.00 KN"));
        assert!(html.contains("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_predict_form_invalid_input() {
        let (status, html) = send(form_request("b=350&d=abc&fc=40&rho=1.2&a_d=2.5")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains(INVALID_INPUT_MESSAGE));
        assert!(!html.contains("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_predict_form_keeps_first_duplicate() {
        let (status, html) = send(form_request(&format!("{}&b=9999", SAMPLE_FORM))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("The shear capacity is 219.00 KN"));
    }

    #[tokio::test]
    async fn test_predict_form_wrong_width() {
        let (status, _) = send(form_request("b=350&d=500")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::OK);

        let health: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["model"]["num_features"], 5);
        assert_eq!(health["model"]["num_trees"], 3);
        assert_eq!(health["model"]["objective"], "identity");
        assert_eq!(health["model"]["model_sha256"].as_str().unwrap().len(), 64);
    }
}
