//! Integration tests for the webhook endpoint.
//!
//! Each test spins up the real Axum router on a random port with an
//! in-memory store and fake Graph/generator implementations, then exercises
//! the HTTP contract end to end.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use replyflow::error::DispatchError;
use replyflow::graph::GraphApi;
use replyflow::model::{
    ActionKind, AutomationRule, Campaign, MatchKind, ResponseTemplate, TemplateKind, TenantAccount,
};
use replyflow::pipeline::{Engine, ReplyResolver};
use replyflow::store::{EngineStore, LibSqlStore};
use replyflow::webhook::webhook_routes;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const VERIFY_TOKEN: &str = "test-verify-token";

/// Records every Graph call so tests can assert exact dispatches.
#[derive(Default)]
struct RecordingGraph {
    calls: Mutex<Vec<String>>,
}

impl RecordingGraph {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GraphApi for RecordingGraph {
    async fn reply_to_comment(
        &self,
        comment_id: &str,
        _access_token: &str,
        text: &str,
    ) -> Result<(), DispatchError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("reply:{comment_id}:{text}"));
        Ok(())
    }

    async fn send_private_message(
        &self,
        recipient_id: &str,
        _access_token: &str,
        text: &str,
    ) -> Result<(), DispatchError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("dm:{recipient_id}:{text}"));
        Ok(())
    }

    async fn hide_comment(
        &self,
        comment_id: &str,
        _access_token: &str,
    ) -> Result<(), DispatchError> {
        self.calls.lock().unwrap().push(format!("hide:{comment_id}"));
        Ok(())
    }

    async fn delete_comment(
        &self,
        comment_id: &str,
        _access_token: &str,
    ) -> Result<(), DispatchError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("delete:{comment_id}"));
        Ok(())
    }
}

struct TestServer {
    base_url: String,
    store: Arc<LibSqlStore>,
    graph: Arc<RecordingGraph>,
    client: reqwest::Client,
}

/// Start a server on a random port with a freshly seeded store.
async fn start_server(token: Option<&str>) -> TestServer {
    let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
    store
        .upsert_account(&TenantAccount {
            id: "a1".into(),
            tenant_id: "tenant_1".into(),
            page_id: "P1".into(),
            business_account_id: None,
            access_token: token.map(String::from),
            refresh_token: None,
        })
        .await
        .unwrap();
    store
        .insert_campaign(&Campaign {
            id: "camp_1".into(),
            account_id: "a1".into(),
            name: "launch".into(),
            enabled: true,
        })
        .await
        .unwrap();

    let graph = Arc::new(RecordingGraph::default());
    let engine = Arc::new(Engine::new(
        Arc::clone(&store) as Arc<dyn EngineStore>,
        Arc::clone(&graph) as Arc<dyn GraphApi>,
        ReplyResolver::new(None),
    ));
    let app = webhook_routes(engine, VERIFY_TOKEN);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        base_url: format!("http://127.0.0.1:{port}"),
        store,
        graph,
        client: reqwest::Client::new(),
    }
}

async fn seed_rule(server: &TestServer, keyword: &str, match_kind: MatchKind, action: &str) {
    server
        .store
        .insert_rule(&AutomationRule {
            id: format!("r_{keyword}"),
            campaign_id: "camp_1".into(),
            keyword: keyword.into(),
            match_kind,
            action: action.into(),
            template_id: None,
        })
        .await
        .unwrap();
}

async fn seed_template(server: &TestServer, kind: TemplateKind, text: &str) {
    server
        .store
        .insert_template(&ResponseTemplate {
            id: format!("t_{}", kind.as_str()),
            tenant_id: "tenant_1".into(),
            kind,
            text: text.into(),
        })
        .await
        .unwrap();
}

fn comment_payload(page: &str, text: &str) -> Value {
    json!({
        "object": "page",
        "entry": [{
            "id": page,
            "changes": [{
                "field": "feed",
                "value": {
                    "item": "comment",
                    "verb": "add",
                    "comment_id": "c_123",
                    "message": text,
                    "from": { "id": "user_7" }
                }
            }]
        }]
    })
}

async fn post_webhook(server: &TestServer, payload: &Value) -> (reqwest::StatusCode, Value) {
    let resp = server
        .client
        .post(format!("{}/webhook", server.base_url))
        .json(payload)
        .send()
        .await
        .unwrap();
    let status = resp.status();
    let body: Value = resp.json().await.unwrap();
    (status, body)
}

// ── Verification handshake ──────────────────────────────────────────

#[tokio::test]
async fn handshake_echoes_challenge() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Some("tok")).await;

        let resp = server
            .client
            .get(format!(
                "{}/webhook?hub.mode=subscribe&hub.verify_token={VERIFY_TOKEN}&hub.challenge=12345",
                server.base_url
            ))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), "12345");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn handshake_rejects_bad_token() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Some("tok")).await;

        let resp = server
            .client
            .get(format!(
                "{}/webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=12345",
                server.base_url
            ))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn handshake_rejects_wrong_mode() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Some("tok")).await;

        let resp = server
            .client
            .get(format!(
                "{}/webhook?hub.mode=unsubscribe&hub.verify_token={VERIFY_TOKEN}&hub.challenge=1",
                server.base_url
            ))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);
    })
    .await
    .unwrap();
}

// ── Event delivery scenarios ────────────────────────────────────────

#[tokio::test]
async fn matched_comment_replies_and_logs() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Some("tok")).await;
        seed_rule(&server, "price", MatchKind::Contains, "reply").await;
        seed_template(&server, TemplateKind::Public, "Check our pricing page!").await;

        let (status, body) =
            post_webhook(&server, &comment_payload("P1", "What's the price?")).await;

        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(body["status"], "processed");
        assert_eq!(body["outcome"], "delivered");
        assert_eq!(
            server.graph.calls(),
            ["reply:c_123:Check our pricing page!"]
        );

        let log = server.store.deliveries_for_event("c_123").await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action_taken, ActionKind::Reply);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn unmatched_comment_is_ignored() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Some("tok")).await;
        seed_rule(&server, "price", MatchKind::Contains, "reply").await;

        let (status, body) = post_webhook(&server, &comment_payload("P1", "nice photo!")).await;

        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(body["status"], "ignored");
        assert_eq!(body["outcome"], "no_match");
        assert!(server.graph.calls().is_empty());
        assert!(
            server
                .store
                .deliveries_for_event("c_123")
                .await
                .unwrap()
                .is_empty()
        );
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn account_without_token_is_acknowledged_without_dispatch() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(None).await;
        seed_rule(&server, "price", MatchKind::Contains, "reply").await;

        let (status, body) =
            post_webhook(&server, &comment_payload("P1", "What's the price?")).await;

        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(body["status"], "ignored");
        assert_eq!(body["outcome"], "misconfigured");
        assert!(server.graph.calls().is_empty());
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn delete_action_logs_without_response_text() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Some("tok")).await;
        seed_rule(&server, "spam", MatchKind::Exact, "delete").await;

        let (status, body) = post_webhook(&server, &comment_payload("P1", "Spam")).await;

        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(body["status"], "processed");
        assert_eq!(server.graph.calls(), ["delete:c_123"]);

        let log = server.store.deliveries_for_event("c_123").await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action_taken, ActionKind::Delete);
        assert!(log[0].response_text.is_none());
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn unknown_page_is_acknowledged() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Some("tok")).await;

        let (status, body) = post_webhook(&server, &comment_payload("P_other", "hello")).await;

        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(body["status"], "ignored");
        assert_eq!(body["outcome"], "no_account");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn like_event_is_ignored() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Some("tok")).await;

        let payload = json!({
            "entry": [{
                "id": "P1",
                "changes": [{
                    "field": "feed",
                    "value": { "item": "like", "verb": "add", "post_id": "p_9" }
                }]
            }]
        });
        let (status, body) = post_webhook(&server, &payload).await;

        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(body["outcome"], "ignored");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn direct_message_triggers_dm_rule() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Some("tok")).await;
        seed_rule(&server, "discount", MatchKind::Contains, "dm").await;
        seed_template(&server, TemplateKind::Private, "Here's 10% off: CODE10").await;

        let payload = json!({
            "object": "page",
            "entry": [{
                "id": "P1",
                "messaging": [{
                    "sender": { "id": "user_9" },
                    "recipient": { "id": "P1" },
                    "message": { "mid": "m_42", "text": "any discount codes?" }
                }]
            }]
        });
        let (status, body) = post_webhook(&server, &payload).await;

        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(body["status"], "processed");
        assert_eq!(server.graph.calls(), ["dm:user_9:Here's 10% off: CODE10"]);

        let log = server.store.deliveries_for_event("m_42").await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action_taken, ActionKind::Dm);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn malformed_body_is_an_internal_fault() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Some("tok")).await;

        let resp = server
            .client
            .post(format!("{}/webhook", server.base_url))
            .header("content-type", "application/json")
            .body("{not json at all")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        assert!(server.graph.calls().is_empty());
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Some("tok")).await;

        let resp = server
            .client
            .get(format!("{}/health", server.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    })
    .await
    .unwrap();
}
