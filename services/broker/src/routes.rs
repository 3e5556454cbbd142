use crate::error::ApiError;
use crate::provider::{ProviderError, SessionProvider};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use realtime_voice_types::audio::{DEFAULT_MODEL, DEFAULT_VOICE, SUPPORTED_MODELS, Voice};
use realtime_voice_types::{SessionPreferences, SessionRequest};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    provider: Arc<dyn SessionProvider>,
}

impl AppState {
    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self { provider }
    }
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/api/realtime-session", post(create_session))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

/// Browsers call the broker cross-origin. Without an allow-list any origin is accepted.
pub fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    let origin = match allowed_origins {
        Some(origins) => AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        ),
        None => AllowOrigin::from(Any),
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// Applies the broker's allow-lists to what the client asked for.
pub fn resolve_request(preferences: &SessionPreferences) -> SessionRequest {
    let model = preferences
        .model()
        .filter(|model| SUPPORTED_MODELS.contains(model))
        .unwrap_or(DEFAULT_MODEL);
    let voice = preferences
        .voice()
        .and_then(|voice| Voice::from_str(voice).ok())
        .filter(Voice::is_supported)
        .unwrap_or(DEFAULT_VOICE);

    let mut builder = SessionRequest::builder().with_model(model).with_voice(voice);
    if let Some(instructions) = preferences.instructions() {
        builder = builder.with_instructions(instructions);
    }
    builder.build()
}

async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    // Clients may post nothing, or something that is not JSON at all.
    let preferences = serde_json::from_slice::<serde_json::Value>(&body)
        .map(|value| SessionPreferences::from_json_lenient(&value))
        .unwrap_or_default();
    let request = resolve_request(&preferences);

    match state.provider.create_session(&request).await {
        Ok(session) => {
            tracing::info!(
                model = request.model(),
                voice = %request.voice(),
                "realtime session created"
            );
            Ok((StatusCode::CREATED, Json(session)))
        }
        Err(ProviderError::Rejected { status, body }) => {
            tracing::error!(status, details = %body, "realtime session refused upstream");
            Err(ApiError::Upstream { details: body })
        }
        Err(e) => {
            tracing::error!(error = %e, "realtime session request failed");
            Err(ApiError::Unexpected)
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockSessionProvider;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn app(provider: MockSessionProvider) -> Router {
        router(AppState::new(Arc::new(provider)), cors_layer(None))
    }

    fn post_session(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/realtime-session")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_session_is_passed_through_with_created() {
        let mut provider = MockSessionProvider::new();
        provider
            .expect_create_session()
            .withf(|request| {
                request.model() == "gpt-realtime"
                    && request.voice() == &Voice::Ash
                    && request.instructions() == Some("be brief")
            })
            .times(1)
            .returning(|_| {
                Ok(json!({ "client_secret": { "value": "abc123" }, "model": "gpt-realtime" }))
            });

        let response = app(provider)
            .oneshot(post_session(
                r#"{"instructions":"  be brief ","model":"gpt-realtime","voice":"ash"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["client_secret"]["value"], "abc123");
    }

    #[tokio::test]
    async fn test_unknown_choices_fall_back_to_defaults() {
        let mut provider = MockSessionProvider::new();
        provider
            .expect_create_session()
            .withf(|request| {
                request.model() == DEFAULT_MODEL
                    && request.voice() == &DEFAULT_VOICE
                    && request.instructions().is_none()
            })
            .times(1)
            .returning(|_| Ok(json!({ "client_secret": { "value": "x" } })));

        let response = app(provider)
            .oneshot(post_session(
                r#"{"instructions":"   ","model":"gpt-2","voice":"robot"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_invalid_body_means_no_preferences() {
        let mut provider = MockSessionProvider::new();
        provider
            .expect_create_session()
            .withf(|request| request.model() == DEFAULT_MODEL)
            .times(1)
            .returning(|_| Ok(json!({ "client_secret": { "value": "x" } })));

        let response = app(provider).oneshot(post_session("not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_upstream_refusal_carries_details() {
        let mut provider = MockSessionProvider::new();
        provider.expect_create_session().returning(|_| {
            Err(ProviderError::Rejected {
                status: 429,
                body: "rate limited".to_string(),
            })
        });

        let response = app(provider).oneshot(post_session("{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Failed to create realtime session.", "details": "rate limited" })
        );
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_unexpected() {
        let mut provider = MockSessionProvider::new();
        provider
            .expect_create_session()
            .returning(|_| Err(ProviderError::Transport("connection refused".to_string())));

        let response = app(provider).oneshot(post_session("{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Unexpected error while creating realtime session." })
        );
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(MockSessionProvider::new())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_cors_allow_list() {
        let router = router(
            AppState::new(Arc::new(MockSessionProvider::new())),
            cors_layer(Some(&["https://app.example".to_string()])),
        );
        let request = |origin: &str| {
            Request::builder()
                .method("OPTIONS")
                .uri("/api/realtime-session")
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap()
        };

        let allowed = router.clone().oneshot(request("https://app.example")).await.unwrap();
        assert_eq!(
            allowed.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("https://app.example"))
        );

        let denied = router.oneshot(request("https://evil.example")).await.unwrap();
        assert!(denied.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
