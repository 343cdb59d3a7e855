//! End-to-end tests for the submission -> queue -> consumer -> query pipeline.
//!
//! The router is driven in-process through `tower::ServiceExt::oneshot` with
//! memory backends, so no Redis, PostgreSQL or listening socket is needed.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio_test::assert_ok;
use tower::ServiceExt;
use uuid::Uuid;

use ara_message_service::config::Settings;
use ara_message_service::dispatch::{
    ConsumerPool, ConsumerSettings, DeliveryOutcome, MessageConsumer,
};
use ara_message_service::message::{Message, MessageStatus};
use ara_message_service::queue::{DispatchPayload, DispatchQueue, MemoryDispatchQueue};
use ara_message_service::server::{create_app, AppState};
use ara_message_service::store::{MemoryMessageStore, MessageFilter, MessageStore};

const NO_WAIT: Duration = Duration::from_millis(0);

struct TestEnvironment {
    app: Router,
    queue: Arc<MemoryDispatchQueue>,
    store: Arc<MemoryMessageStore>,
    consumer: MessageConsumer,
}

fn create_test_environment() -> TestEnvironment {
    let mut settings = Settings::default();
    settings.server.body_limit_bytes = 1024;

    let queue = Arc::new(MemoryDispatchQueue::new());
    let store = Arc::new(MemoryMessageStore::new());

    let state = AppState::new(settings, queue.clone(), store.clone());
    let consumer = MessageConsumer::new(
        queue.clone(),
        store.clone(),
        ConsumerSettings::default(),
    );

    TestEnvironment {
        app: create_app(state),
        queue,
        store,
        consumer,
    }
}

impl TestEnvironment {
    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.call(request).await
    }

    async fn post_send(&self, body: impl Into<Body>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/message/send")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap();
        self.call(request).await
    }

    async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    /// Process everything currently ready on the queue.
    async fn drain(&self) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::new();
        while let Some(delivery) = self.queue.dequeue(NO_WAIT).await.unwrap() {
            outcomes.push(self.consumer.process(delivery).await.unwrap());
        }
        outcomes
    }

    async fn insert(&self, text: &str, status: Option<MessageStatus>) {
        let mut message = Message::new(text).unwrap();
        message.set_status(status);
        assert_ok!(self.store.insert(&message).await);
    }
}

// =============================================================================
// Submission
// =============================================================================

mod send_tests {
    use super::*;

    #[tokio::test]
    async fn test_send_enqueues_exactly_one_payload() {
        let env = create_test_environment();

        let (status, _) = env.post_send(r#"{"text":"Hello World"}"#).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        let pending = env.queue.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].text, "Hello World");
        assert!(pending[0].uuid.is_some());

        // Nothing is persisted until a consumer runs
        assert_eq!(env.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_send_rejects_missing_or_empty_text() {
        let env = create_test_environment();

        for body in [r#"{"text":""}"#, r#"{}"#, r#"{"text":7}"#, "not json", ""] {
            let (status, response) = env.post_send(body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
            assert_eq!(
                response["error"],
                "Invalid text parameter. Must be a non-empty string."
            );
        }

        assert!(env.queue.pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_send_rejects_text_failing_validation() {
        let env = create_test_environment();

        let whitespace = env.post_send(r#"{"text":"   "}"#).await;
        let too_long = env
            .post_send(json!({ "text": "x".repeat(256) }).to_string())
            .await;

        for (status, response) in [whitespace, too_long] {
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(
                response["error"],
                "Text must not be empty or exceed 255 characters."
            );
        }
        assert!(env.queue.pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_send_accepts_text_at_length_limit() {
        let env = create_test_environment();

        let (status, _) = env
            .post_send(json!({ "text": "é".repeat(255) }).to_string())
            .await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(env.queue.pending().await.len(), 1);
    }

    #[tokio::test]
    async fn test_send_rejects_oversized_body() {
        let env = create_test_environment();

        let body = json!({ "text": "a".repeat(2048) }).to_string();
        let (status, _) = env.post_send(body).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(env.queue.pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_send_fails_when_queue_closed() {
        let env = create_test_environment();
        env.queue.close().await;

        let (status, response) = env.post_send(r#"{"text":"late"}"#).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response["error"].is_string());
    }
}

// =============================================================================
// Listing
// =============================================================================

mod list_tests {
    use super::*;

    #[tokio::test]
    async fn test_list_empty_store() {
        let env = create_test_environment();

        let (status, body) = env.get("/messages").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "messages": [] }));
    }

    #[tokio::test]
    async fn test_list_with_valid_status() {
        let env = create_test_environment();
        env.insert("one", Some(MessageStatus::Sent)).await;
        env.insert("two", Some(MessageStatus::Read)).await;
        env.insert("three", None).await;

        let (status, body) = env.get("/messages?status=SENT").await;

        assert_eq!(status, StatusCode::OK);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["text"], "one");
        assert_eq!(messages[0]["status"], "SENT");
    }

    #[tokio::test]
    async fn test_list_without_status_includes_unset() {
        let env = create_test_environment();
        env.insert("one", Some(MessageStatus::Sent)).await;
        env.insert("three", None).await;

        for uri in ["/messages", "/messages?status="] {
            let (status, body) = env.get(uri).await;
            assert_eq!(status, StatusCode::OK);

            let messages = body["messages"].as_array().unwrap();
            assert_eq!(messages.len(), 2);
            assert_eq!(messages[1]["status"], Value::Null);
            assert!(messages[1].get("id").is_none());
        }
    }

    #[tokio::test]
    async fn test_list_with_repeated_status_uses_last_value() {
        let env = create_test_environment();
        env.insert("one", Some(MessageStatus::Sent)).await;
        env.insert("two", Some(MessageStatus::Read)).await;

        let (status, body) = env.get("/messages?status=SENT&status=READ").await;

        assert_eq!(status, StatusCode::OK);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["text"], "two");
    }

    #[tokio::test]
    async fn test_list_with_repeated_invalid_status_is_json_error() {
        let env = create_test_environment();

        let (status, body) = env.get("/messages?status=SENT&status=bogus").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid status value" }));
    }

    #[tokio::test]
    async fn test_list_with_invalid_status() {
        let env = create_test_environment();

        let (status, body) = env.get("/messages?status=invalid_status").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid status value" }));
    }
}

// =============================================================================
// Consumer pipeline
// =============================================================================

mod pipeline_tests {
    use super::*;

    #[tokio::test]
    async fn test_sent_message_becomes_queryable_as_sent() {
        let env = create_test_environment();

        let (status, _) = env.post_send(r#"{"text":"Hello World"}"#).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        assert_eq!(env.drain().await, vec![DeliveryOutcome::Persisted]);

        let (_, body) = env.get("/messages").await;
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["text"], "Hello World");
        assert_eq!(messages[0]["status"], "SENT");
        assert_ok!(Uuid::parse_str(messages[0]["uuid"].as_str().unwrap()));
    }

    #[tokio::test]
    async fn test_redelivered_payload_persists_once() {
        let env = create_test_environment();
        let payload = DispatchPayload::new(Uuid::new_v4(), "only once");

        assert_ok!(env.queue.enqueue(payload.clone()).await);
        assert_ok!(env.queue.enqueue(payload.clone()).await);

        assert_eq!(
            env.drain().await,
            vec![DeliveryOutcome::Persisted, DeliveryOutcome::Duplicate]
        );

        let stored = env.store.query(&MessageFilter::all()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(Some(stored[0].uuid()), payload.uuid);
    }

    #[tokio::test]
    async fn test_persisted_uuid_matches_submission() {
        let env = create_test_environment();

        env.post_send(r#"{"text":"tracked"}"#).await;
        let submitted = env.queue.pending().await[0].uuid;
        env.drain().await;

        let stored = env.store.query(&MessageFilter::all()).await.unwrap();
        assert_eq!(Some(stored[0].uuid()), submitted);
    }

    #[tokio::test]
    async fn test_worker_pool_processes_submissions() {
        let env = create_test_environment();
        let (shutdown_tx, _) = broadcast::channel(1);

        let consumer = MessageConsumer::new(
            env.queue.clone(),
            env.store.clone(),
            ConsumerSettings {
                dequeue_wait: Duration::from_millis(20),
                ..Default::default()
            },
        );
        let workers = ConsumerPool::start(Arc::new(consumer), 2, &shutdown_tx).await;

        for i in 0..5 {
            let (status, _) = env
                .post_send(json!({ "text": format!("message {}", i) }).to_string())
                .await;
            assert_eq!(status, StatusCode::NO_CONTENT);
        }

        let mut persisted = 0;
        for _ in 0..200 {
            persisted = env.store.count().await.unwrap();
            if persisted == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(persisted, 5);

        let (_, body) = env.get("/messages?status=SENT").await;
        assert_eq!(body["messages"].as_array().unwrap().len(), 5);

        shutdown_tx.send(()).unwrap();
        assert_eq!(workers.join(Duration::from_secs(2)).await, 2);
    }
}

// =============================================================================
// Operational endpoints
// =============================================================================

mod ops_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_reports_backends() {
        let env = create_test_environment();
        env.post_send(r#"{"text":"waiting"}"#).await;

        let (status, body) = env.get("/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["queue"]["backend"], "memory");
        assert_eq!(body["queue"]["ready"], 1);
        assert_eq!(body["store"]["backend"], "memory");
    }

    #[tokio::test]
    async fn test_health_degraded_after_close() {
        let env = create_test_environment();
        env.queue.close().await;

        let (_, body) = env.get("/health").await;
        assert_eq!(body["status"], "degraded");
    }

    #[tokio::test]
    async fn test_metrics_exposition() {
        let env = create_test_environment();
        env.post_send(r#"{"text":"counted"}"#).await;

        let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let response = env.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("ara_dispatch_enqueued_total"));
        assert!(text.contains("ara_queue_ready"));
    }
}
