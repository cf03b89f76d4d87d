use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::events::{SlackChallengeResponse, SlackEnvelope, SlackEvent};
use crate::handlers::{handle_app_mention, handle_thread_message};
use crate::state::AppState;
use crate::verify::verify_slack;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/slack/events", post(slack_events))
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("slack bot listening on {}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {}", err);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Events API endpoint. Work is spawned so Slack gets its ack well inside
/// the three second window.
async fn slack_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let envelope: SlackEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!("failed to parse slack payload: {}", err);
            return (StatusCode::BAD_REQUEST, Json(json!({"status": "bad_json"})));
        }
    };

    if let SlackEnvelope::UrlVerification { challenge } = envelope {
        let response = SlackChallengeResponse { challenge };
        return (StatusCode::OK, Json(json!(response)));
    }

    if let Some(secret) = state.signing_secret.as_deref() {
        let now = chrono::Utc::now().timestamp();
        if let Err(reason) = verify_slack(secret, &headers, &body, now) {
            warn!("rejected slack request: {}", reason);
            return (StatusCode::UNAUTHORIZED, Json(json!({"status": reason})));
        }
    }

    if let Some(retry) = headers.get("x-slack-retry-num") {
        debug!("ignoring slack retry {:?}", retry);
        return (StatusCode::OK, Json(json!({"status": "retry_ignored"})));
    }

    let SlackEnvelope::EventCallback { event_id, event, .. } = envelope else {
        return (StatusCode::OK, Json(json!({"status": "ignored"})));
    };
    debug!("slack event {}", event_id.as_deref().unwrap_or("-"));

    match event {
        SlackEvent::AppMention(event) => {
            tokio::spawn(async move {
                let outcome = handle_app_mention(&state, &event).await;
                debug!("app_mention handled: {:?}", outcome);
            });
        }
        SlackEvent::Message(event) => {
            tokio::spawn(async move {
                let outcome = handle_thread_message(&state, &event).await;
                debug!("message handled: {:?}", outcome);
            });
        }
        SlackEvent::Other => {
            return (StatusCode::OK, Json(json!({"status": "ignored"})));
        }
    }

    (StatusCode::OK, Json(json!({"status": "accepted"})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use action_items_module::backend::{BackendError, TextGenerator};
    use action_items_module::ActionItemExtractor;
    use async_trait::async_trait;
    use std::collections::HashMap;

    use crate::slack::SlackClient;
    use crate::state::AlertChannel;
    use crate::verify::sign_slack_request;

    struct SilentGenerator;

    #[async_trait]
    impl TextGenerator for SilentGenerator {
        fn name(&self) -> &str {
            "silent"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, BackendError> {
            Ok(String::new())
        }
    }

    fn state(secret: Option<&str>) -> Arc<AppState> {
        // Unroutable base URL; these tests never reach a spawned handler.
        let slack = Arc::new(SlackClient::new("xoxb-test", "http://127.0.0.1:9"));
        let directory: HashMap<String, action_items_module::UserProfile> = HashMap::new();
        Arc::new(AppState {
            slack,
            extractor: ActionItemExtractor::new(Box::new(SilentGenerator), Arc::new(directory)),
            alert_channel: AlertChannel::new("action-items-alarm"),
            signing_secret: secret.map(str::to_string),
            thread_replies_enabled: false,
            bot_user_id: Some("UBOT".to_string()),
        })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let response = router(state(None))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn url_verification_echoes_challenge() {
        let request = Request::post("/slack/events")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"type":"url_verification","challenge":"xyz"}"#))
            .unwrap();
        let response = router(state(Some("secret"))).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"challenge": "xyz"}));
    }

    #[tokio::test]
    async fn bad_signature_is_rejected() {
        let request = Request::post("/slack/events")
            .header("x-slack-signature", "v0=00")
            .header("x-slack-request-timestamp", chrono::Utc::now().timestamp().to_string())
            .body(Body::from(r#"{"type":"event_callback","event":{"type":"reaction_added"}}"#))
            .unwrap();
        let response = router(state(Some("secret"))).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await, json!({"status": "invalid_signature"}));
    }

    #[tokio::test]
    async fn signed_unknown_event_is_ignored() {
        let body = r#"{"type":"event_callback","event":{"type":"reaction_added"}}"#;
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_slack_request("secret", &timestamp, body.as_bytes()).unwrap();
        let request = Request::post("/slack/events")
            .header("x-slack-signature", signature)
            .header("x-slack-request-timestamp", timestamp)
            .body(Body::from(body))
            .unwrap();
        let response = router(state(Some("secret"))).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "ignored"}));
    }

    #[tokio::test]
    async fn retries_are_acknowledged_without_processing() {
        let request = Request::post("/slack/events")
            .header("x-slack-retry-num", "1")
            .body(Body::from(
                r#"{"type":"event_callback","event":{"type":"app_mention","channel":"C1","ts":"1.0"}}"#,
            ))
            .unwrap();
        let response = router(state(None)).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "retry_ignored"}));
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let request = Request::post("/slack/events")
            .body(Body::from("not json"))
            .unwrap();
        let response = router(state(None)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
