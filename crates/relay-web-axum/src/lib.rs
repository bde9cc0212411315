use axum::{
    Router,
    extract::{Query, State, rejection::BytesRejection},
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use bytes::Bytes;
use relay_core::{HttpStatus, RelayError, RelayResponse};
use relay_web_generic::{RelayProcessor, ResponseConverter};
use serde::Deserialize;

#[derive(Clone)]
pub struct AppState {
    pub processor: RelayProcessor,
}

/// Axum-specific response converter
pub struct AxumResponseConverter;

impl ResponseConverter for AxumResponseConverter {
    type ResponseType = axum::response::Response;

    fn from_relay_response(response: RelayResponse) -> Self::ResponseType {
        let status = StatusCode::from_u16(response.status.as_u16())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let content_type = HeaderValue::from_str(&response.content_type)
            .unwrap_or(HeaderValue::from_static("application/json"));
        (status, [(header::CONTENT_TYPE, content_type)], response.body).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckinQuery {
    pub secret: Option<String>,
}

/// Health check: GET /
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    AxumResponseConverter::from_relay_response(state.processor.health())
}

/// Forwarded SMS: POST /android-webhook
pub async fn android_webhook(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> impl IntoResponse {
    let response = match body {
        Ok(body) => state.processor.process_webhook(&body).await,
        Err(rejection) => state
            .processor
            .error_to_response(body_rejection(&state, rejection)),
    };
    AxumResponseConverter::from_relay_response(response)
}

/// Body extraction failures, mostly the body limit layer tripping.
fn body_rejection(state: &AppState, rejection: BytesRejection) -> RelayError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        RelayError::PayloadTooLarge(state.processor.settings().max_body_size)
    } else {
        RelayError::InvalidPayload(rejection.body_text())
    }
}

/// Cron hook: GET /trigger-daily-checkin?secret=...
pub async fn trigger_daily_checkin(
    State(state): State<AppState>,
    Query(query): Query<CheckinQuery>,
) -> impl IntoResponse {
    let response = state
        .processor
        .trigger_daily_checkin(query.secret.as_deref())
        .await;
    AxumResponseConverter::from_relay_response(response)
}

async fn not_found() -> impl IntoResponse {
    AxumResponseConverter::from_relay_response(RelayResponse::error(
        HttpStatus::NotFound,
        "not found",
    ))
}

/// All relay routes bound to `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/android-webhook", post(android_webhook))
        .route("/trigger-daily-checkin", get(trigger_daily_checkin))
        .fallback(not_found)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use relay_core::{MemoryNotifier, MemoryRowStore, MessageRouter};
    use relay_web_generic::ProcessorSettings;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(store: MemoryRowStore, notifier: MemoryNotifier) -> Router {
        let processor = RelayProcessor::new(
            MessageRouter::default(),
            Arc::new(store),
            Arc::new(notifier),
        )
        .with_settings(ProcessorSettings {
            cron_secret: Some("cron".into()),
            owner_number: Some("+15550001111".into()),
            ..ProcessorSettings::default()
        });
        router(AppState { processor })
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn webhook_logs_entry() {
        let store = MemoryRowStore::new("https://example.invalid/sheet");
        let app = app(store.clone(), MemoryNotifier::new());

        let response = app
            .oneshot(
                Request::post("/android-webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"sender":"+15551234567","body":"urgency 6 joint pain"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let value = json_body(response).await;
        assert_eq!(value["action"], "logged_symptom");
        assert_eq!(value["urgency"], 6);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn webhook_rejects_invalid_json() {
        let app = app(MemoryRowStore::new("x"), MemoryNotifier::new());
        let response = app
            .oneshot(
                Request::post("/android-webhook")
                    .body(Body::from("sender=+1&body=hi"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_body_gets_json_error() {
        let store = MemoryRowStore::new("x");
        let app = app(store.clone(), MemoryNotifier::new())
            .layer(axum::extract::DefaultBodyLimit::max(16));

        let response = app
            .oneshot(
                Request::post("/android-webhook")
                    .body(Body::from(r#"{"sender":"+1","body":"far too long for the limit"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let value = json_body(response).await;
        assert!(value["error"].as_str().unwrap().starts_with("Payload too large"));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn checkin_guarded_by_secret() {
        let notifier = MemoryNotifier::new();
        let app = app(MemoryRowStore::new("x"), notifier.clone());

        let forbidden = app
            .clone()
            .oneshot(Request::get("/trigger-daily-checkin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let ok = app
            .oneshot(
                Request::get("/trigger-daily-checkin?secret=cron")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(notifier.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn health_and_fallback() {
        let app = app(MemoryRowStore::new("x"), MemoryNotifier::new());

        let health = app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(json_body(health).await["status"], "ok");

        let missing = app
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
