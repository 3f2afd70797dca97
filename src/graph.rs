//! Action dispatcher — platform Graph API calls for matched rules.
//!
//! The Graph API authenticates via an `access_token` query parameter and can
//! report failures inside a 2xx JSON body as an `error` object, so every
//! response is checked for both.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::error::DispatchError;
use crate::events::InboundEvent;
use crate::model::ActionKind;

/// Default Graph API base URL.
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.facebook.com/v19.0";

/// Platform API call timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Seam to the platform Graph API — one method per action kind.
///
/// The production implementation is [`GraphClient`]; tests substitute
/// recording fakes.
#[async_trait]
pub trait GraphApi: Send + Sync {
    /// Create a public comment reply on `comment_id`.
    async fn reply_to_comment(
        &self,
        comment_id: &str,
        access_token: &str,
        text: &str,
    ) -> Result<(), DispatchError>;

    /// Send a private message to `recipient_id`.
    async fn send_private_message(
        &self,
        recipient_id: &str,
        access_token: &str,
        text: &str,
    ) -> Result<(), DispatchError>;

    /// Mark `comment_id` as hidden.
    async fn hide_comment(&self, comment_id: &str, access_token: &str)
    -> Result<(), DispatchError>;

    /// Remove `comment_id`.
    async fn delete_comment(
        &self,
        comment_id: &str,
        access_token: &str,
    ) -> Result<(), DispatchError>;
}

/// Map an action to exactly one Graph API call.
///
/// `text` is required for reply/dm; the resolver guarantees it is non-empty,
/// but the fallback acknowledgment covers a missing value defensively.
pub async fn dispatch(
    graph: &dyn GraphApi,
    action: ActionKind,
    event: &InboundEvent,
    access_token: &str,
    text: Option<&str>,
) -> Result<(), DispatchError> {
    let result = match action {
        ActionKind::Reply => {
            let text = text.unwrap_or(crate::pipeline::responder::FALLBACK_REPLY);
            graph
                .reply_to_comment(&event.source_id, access_token, text)
                .await
        }
        ActionKind::Dm => {
            let text = text.unwrap_or(crate::pipeline::responder::FALLBACK_REPLY);
            graph
                .send_private_message(&event.actor_id, access_token, text)
                .await
        }
        ActionKind::Hide => graph.hide_comment(&event.source_id, access_token).await,
        ActionKind::Delete => graph.delete_comment(&event.source_id, access_token).await,
    };

    if result.is_ok() {
        info!(
            action = action.as_str(),
            source_id = %event.source_id,
            "Dispatched action"
        );
    }
    result
}

/// reqwest-backed Graph API client.
pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
}

impl GraphClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Check status and body. The Graph API sometimes returns 200 with an
    /// `error` object, so the body is inspected either way.
    fn check_response(status: reqwest::StatusCode, body: String) -> Result<(), DispatchError> {
        if !status.is_success() {
            return Err(DispatchError::Api {
                status: status.as_u16(),
                body,
            });
        }
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
            if value.get("error").is_some() {
                return Err(DispatchError::Api {
                    status: status.as_u16(),
                    body,
                });
            }
        }
        Ok(())
    }

    async fn post_json(
        &self,
        path: &str,
        access_token: &str,
        body: &serde_json::Value,
    ) -> Result<(), DispatchError> {
        let resp = self
            .client
            .post(self.url(path))
            .query(&[("access_token", access_token)])
            .json(body)
            .send()
            .await
            .map_err(|e| DispatchError::Request(e.to_string()))?;

        let status = resp.status();
        let body_text = resp.text().await.unwrap_or_default();
        Self::check_response(status, body_text)
    }
}

#[async_trait]
impl GraphApi for GraphClient {
    async fn reply_to_comment(
        &self,
        comment_id: &str,
        access_token: &str,
        text: &str,
    ) -> Result<(), DispatchError> {
        self.post_json(
            &format!("{comment_id}/comments"),
            access_token,
            &serde_json::json!({ "message": text }),
        )
        .await
    }

    async fn send_private_message(
        &self,
        recipient_id: &str,
        access_token: &str,
        text: &str,
    ) -> Result<(), DispatchError> {
        // The page access token scopes the sender; the platform routes the
        // message from the token's page.
        self.post_json(
            "me/messages",
            access_token,
            &serde_json::json!({
                "recipient": { "id": recipient_id },
                "message": { "text": text },
            }),
        )
        .await
    }

    async fn hide_comment(
        &self,
        comment_id: &str,
        access_token: &str,
    ) -> Result<(), DispatchError> {
        self.post_json(
            comment_id,
            access_token,
            &serde_json::json!({ "is_hidden": true }),
        )
        .await
    }

    async fn delete_comment(
        &self,
        comment_id: &str,
        access_token: &str,
    ) -> Result<(), DispatchError> {
        let resp = self
            .client
            .delete(self.url(comment_id))
            .query(&[("access_token", access_token)])
            .send()
            .await
            .map_err(|e| DispatchError::Request(e.to_string()))?;

        let status = resp.status();
        let body_text = resp.text().await.unwrap_or_default();
        Self::check_response(status, body_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::events::EventKind;

    /// Records every Graph call for assertion.
    #[derive(Default)]
    pub struct RecordingGraph {
        pub calls: Mutex<Vec<String>>,
    }

    impl RecordingGraph {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
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
            self.record(format!("reply:{comment_id}:{text}"));
            Ok(())
        }

        async fn send_private_message(
            &self,
            recipient_id: &str,
            _access_token: &str,
            text: &str,
        ) -> Result<(), DispatchError> {
            self.record(format!("dm:{recipient_id}:{text}"));
            Ok(())
        }

        async fn hide_comment(
            &self,
            comment_id: &str,
            _access_token: &str,
        ) -> Result<(), DispatchError> {
            self.record(format!("hide:{comment_id}"));
            Ok(())
        }

        async fn delete_comment(
            &self,
            comment_id: &str,
            _access_token: &str,
        ) -> Result<(), DispatchError> {
            self.record(format!("delete:{comment_id}"));
            Ok(())
        }
    }

    fn event() -> InboundEvent {
        InboundEvent {
            page_id: "page_1".into(),
            kind: EventKind::Comment,
            source_id: "c_1".into(),
            actor_id: "user_1".into(),
            text: "hello".into(),
        }
    }

    #[tokio::test]
    async fn reply_targets_source_comment() {
        let graph = RecordingGraph::default();
        dispatch(&graph, ActionKind::Reply, &event(), "tok", Some("hi!"))
            .await
            .unwrap();
        assert_eq!(graph.calls.lock().unwrap().as_slice(), ["reply:c_1:hi!"]);
    }

    #[tokio::test]
    async fn dm_targets_actor() {
        let graph = RecordingGraph::default();
        dispatch(&graph, ActionKind::Dm, &event(), "tok", Some("psst"))
            .await
            .unwrap();
        assert_eq!(graph.calls.lock().unwrap().as_slice(), ["dm:user_1:psst"]);
    }

    #[tokio::test]
    async fn hide_and_delete_take_no_text() {
        let graph = RecordingGraph::default();
        dispatch(&graph, ActionKind::Hide, &event(), "tok", None)
            .await
            .unwrap();
        dispatch(&graph, ActionKind::Delete, &event(), "tok", None)
            .await
            .unwrap();
        assert_eq!(
            graph.calls.lock().unwrap().as_slice(),
            ["hide:c_1", "delete:c_1"]
        );
    }

    #[test]
    fn non_2xx_is_an_api_error() {
        let err = GraphClient::check_response(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"Invalid OAuth access token","code":190}}"#.into(),
        )
        .unwrap_err();
        match err {
            DispatchError::Api { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("Invalid OAuth access token"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn error_object_in_2xx_body_is_an_api_error() {
        let err = GraphClient::check_response(
            reqwest::StatusCode::OK,
            r#"{"error":{"message":"(#10) Permission denied"}}"#.into(),
        )
        .unwrap_err();
        assert!(matches!(err, DispatchError::Api { status: 200, .. }));
    }

    #[test]
    fn clean_2xx_passes() {
        GraphClient::check_response(reqwest::StatusCode::OK, r#"{"id":"c_1_r"}"#.into()).unwrap();
        // Non-JSON bodies on success are tolerated too.
        GraphClient::check_response(reqwest::StatusCode::OK, "true".into()).unwrap();
    }
}
