//! Minimal Telegram Bot API client: `sendMessage` and `getUpdates`.

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ChatId, Notifier, NotifyError};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Slack added on top of the long-poll timeout for the HTTP request itself
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: ChatId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

#[derive(Serialize)]
struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

/// Telegram Bot API client
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    endpoint: String,
    request_timeout: Duration,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// `api_url` is normally [`DEFAULT_API_URL`]
    pub fn new(token: &str, api_url: &str, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        let endpoint = format!("{}/bot{}", api_url.trim_end_matches('/'), token);
        Ok(Self { http, endpoint, request_timeout })
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T, NotifyError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response: ApiResponse<T> = self
            .http
            .post(format!("{}/{}", self.endpoint, method))
            .timeout(timeout)
            .json(body)
            .send()
            .await?
            .json()
            .await?;

        match response {
            ApiResponse { ok: true, result: Some(result), .. } => Ok(result),
            ApiResponse { description, .. } => Err(NotifyError::Api(
                description.unwrap_or_else(|| format!("{method} returned no result")),
            )),
        }
    }

    /// Send `text`, optionally rendered with a Telegram `parse_mode`
    pub async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<(), NotifyError> {
        let body = SendMessage { chat_id, text, parse_mode };
        let _: serde_json::Value = self.call("sendMessage", &body, self.request_timeout).await?;
        Ok(())
    }

    /// Long-poll for new messages starting at `offset`
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        poll_timeout: Duration,
    ) -> Result<Vec<Update>, NotifyError> {
        let body = GetUpdates { offset, timeout: poll_timeout.as_secs(), allowed_updates: ["message"] };
        self.call("getUpdates", &body, poll_timeout + POLL_GRACE).await
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramClient {
    async fn send(&self, recipient: ChatId, text: &str) -> Result<(), NotifyError> {
        self.send_message(recipient, text, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TelegramClient {
        TelegramClient::new("123:abc", &server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_send_message_posts_plain_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(json!({ "chat_id": 42, "text": "hi" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": { "message_id": 1 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).send(42, "hi").await.unwrap();
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let err = client(&server).send(1, "hi").await.unwrap_err();
        assert!(matches!(err, NotifyError::Api(ref msg) if msg.contains("chat not found")));
    }

    #[tokio::test]
    async fn test_get_updates_parses_messages() {
        let server = MockServer::start().await;
        Mock::given(path("/bot123:abc/getUpdates"))
            .and(body_partial_json(json!({ "offset": 10 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    { "update_id": 10, "message": { "chat": { "id": -100 }, "text": "/status" } },
                    { "update_id": 11 }
                ]
            })))
            .mount(&server)
            .await;

        let updates = client(&server).get_updates(Some(10), Duration::from_secs(0)).await.unwrap();
        assert_eq!(updates.len(), 2);

        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, -100);
        assert_eq!(message.text.as_deref(), Some("/status"));
        assert!(updates[1].message.is_none());
    }
}
