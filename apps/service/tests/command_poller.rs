//! Command polling against a mock bot API.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sitewatch::commands::{CommandPoller, CommandResponder, StatusReporter};
use sitewatch::monitoring::{CertificateCheck, HealthState, HealthTracker, Target, TlsCheckError};
use sitewatch::notifier::TelegramClient;

struct ThirtyDays;

#[async_trait::async_trait]
impl CertificateCheck for ThirtyDays {
    async fn days_until_expiry(&self, _host: &str) -> Result<i64, TlsCheckError> {
        Ok(30)
    }
}

#[tokio::test]
async fn test_poller_answers_commands_and_advances_offset() {
    let api = MockServer::start().await;
    Mock::given(path("/botsecret/getUpdates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": [
                { "update_id": 500, "message": { "chat": { "id": 77 }, "text": "/status" } },
                { "update_id": 501, "message": { "chat": { "id": 78 }, "text": "/chat_id@sitewatch_bot" } },
                { "update_id": 502, "message": { "chat": { "id": 79 }, "text": "just chatting" } },
                { "update_id": 503, "message": { "chat": { "id": 80 } } }
            ]
        })))
        .mount(&api)
        .await;
    Mock::given(method("POST"))
        .and(path("/botsecret/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": {} })))
        .expect(2)
        .mount(&api)
        .await;

    let targets: Arc<[Target]> = vec![Target::new("web_main", "WEB main", "https://example.com")].into();
    let tracker = Arc::new(HealthTracker::for_targets(&targets));
    tracker.compare_and_set("web_main", HealthState::Down);

    let reporter = StatusReporter::new(targets, tracker, Arc::new(ThirtyDays));
    let client = TelegramClient::new("secret", &api.uri(), Duration::from_secs(5)).unwrap();
    let mut poller = CommandPoller::new(client, CommandResponder::new(reporter), Duration::from_secs(0));

    let replied = poller.poll_once().await.unwrap();
    assert_eq!(replied, 2);
    assert_eq!(poller.offset(), Some(504));

    let replies: Vec<Value> = api
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path().ends_with("/sendMessage"))
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect();

    assert_eq!(replies[0]["chat_id"], 77);
    assert_eq!(replies[0]["parse_mode"], "Markdown");
    assert_eq!(
        replies[0]["text"],
        "🌐 Services:\n• WEB main: *down*\n\n🔒 SSL:\n• example.com: *30 days*"
    );
    assert_eq!(replies[1]["chat_id"], 78);
    assert_eq!(replies[1]["text"], "Your chat_id: 78");
    // An unbalanced `_` is rejected by the Markdown parser, so this one goes out as plain text
    assert!(replies[1].get("parse_mode").is_none());
}

#[tokio::test]
async fn test_poller_surfaces_api_errors() {
    let api = MockServer::start().await;
    Mock::given(path("/botsecret/getUpdates"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "ok": false,
            "description": "Unauthorized"
        })))
        .mount(&api)
        .await;

    let targets: Arc<[Target]> = vec![Target::new("web", "WEB", "https://example.com")].into();
    let reporter = StatusReporter::new(
        targets.clone(),
        Arc::new(HealthTracker::for_targets(&targets)),
        Arc::new(ThirtyDays),
    );
    let client = TelegramClient::new("secret", &api.uri(), Duration::from_secs(5)).unwrap();
    let mut poller = CommandPoller::new(client, CommandResponder::new(reporter), Duration::from_secs(0));

    assert!(poller.poll_once().await.is_err());
    assert_eq!(poller.offset(), None);
}
