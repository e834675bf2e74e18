//! Mandrill (Mailchimp Transactional) `messages/send` backend.
//!
//! Sends are submitted async on Mandrill's side; the webhook carries the
//! eventual outcome. Webhook bodies arrive form-encoded with the event
//! array under the `mandrill_events` field.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use mailgate_core::{
    Configurer, Email, Posthook, PosthookEvent, Response, Service, ServiceError, apply_config,
};
use serde::{Deserialize, Serialize};

const NAME: &str = "mandrill";
const DEFAULT_BASE: &str = "https://mandrillapp.com";

// Mandrill queues large sends; their API docs recommend a generous client
// timeout over retrying.
const SEND_TIMEOUT: Duration = Duration::from_secs(60);

pub struct Mandrill {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    confer: MandrillConfigurer,
}

impl Mandrill {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE.to_string(),
            client: reqwest::Client::new(),
            confer: MandrillConfigurer,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_message(email: &Email) -> MandrillMessage {
        let mut to = Vec::new();
        for address in &email.to {
            to.push(MandrillRecipient {
                email: address.email.clone(),
                name: address.name.clone(),
                kind: "to".to_string(),
            });
        }
        for address in &email.cc {
            to.push(MandrillRecipient {
                email: address.email.clone(),
                name: address.name.clone(),
                kind: "cc".to_string(),
            });
        }

        MandrillMessage {
            from_email: email.from.email.clone(),
            from_name: email.from.name.clone(),
            subject: email.subject.clone(),
            text: email.text.clone(),
            html: email.html.clone(),
            to,
            headers: email.headers.clone(),
            attachments: email
                .attachments
                .iter()
                .map(|attachment| MandrillAttachment {
                    kind: attachment.content_type.clone(),
                    name: attachment.name.clone(),
                    content: attachment.content.clone(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl Service for Mandrill {
    fn name(&self) -> &str {
        NAME
    }

    async fn send(&self, email: &Email) -> Result<Vec<Response>, ServiceError> {
        let mut message = Self::build_message(email);
        apply_config(NAME, &email.service_config, &self.confer, &mut message);

        let payload = SendPayload {
            key: self.api_key.clone(),
            message,
            run_async: true,
        };

        let response = self
            .client
            .post(format!("{}/api/1.0/messages/send.json", self.base_url))
            .timeout(SEND_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|err| ServiceError::transport(NAME, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::api(NAME, format!("{status}: {body}")));
        }

        let results: Vec<SendResult> = response
            .json()
            .await
            .map_err(|err| ServiceError::api(NAME, err))?;

        Ok(results
            .into_iter()
            .map(|result| Response {
                service: NAME.to_string(),
                message_id: result.id,
                email: result.email,
            })
            .collect())
    }

    fn unmarshal_posthook(&self, body: &[u8]) -> Result<Vec<Posthook>, ServiceError> {
        let events = url::form_urlencoded::parse(body)
            .find(|(name, _)| name == "mandrill_events")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| ServiceError::posthook(NAME, "missing mandrill_events field"))?;

        let hooks: Vec<MandrillHook> = serde_json::from_str(&events)
            .map_err(|err| ServiceError::posthook(NAME, err))?;

        let mut result = Vec::new();
        for hook in hooks {
            if hook.id.is_empty() {
                continue;
            }

            let (event, info) = match hook.event.to_ascii_lowercase().as_str() {
                "send" => (PosthookEvent::Delivered, String::new()),
                "deferral" => {
                    let diags: String = hook
                        .msg
                        .smtp_events
                        .iter()
                        .map(|smtp| format!("{};", smtp.diag))
                        .collect();
                    (PosthookEvent::Deferred, diags)
                }
                "hard_bounce" => (
                    PosthookEvent::Bounce,
                    format!("hard_bounce; {}", hook.msg.bounce_description),
                ),
                // Mandrill converts persistent soft bounces to hard ones, so
                // a soft bounce is reported as a deferral.
                "soft_bounce" => (
                    PosthookEvent::Deferred,
                    format!("deferral; soft_bounce; {}", hook.msg.bounce_description),
                ),
                "open" => (PosthookEvent::Open, String::new()),
                "click" => (PosthookEvent::Click, String::new()),
                "spam" => (PosthookEvent::Spam, String::new()),
                "unsub" => (PosthookEvent::Unsubscribe, String::new()),
                "reject" => (PosthookEvent::Dropped, String::new()),
                _ => (PosthookEvent::Unknown, hook.event),
            };

            result.push(Posthook {
                service: NAME.to_string(),
                event_id: String::new(),
                message_id: hook.id,
                email: hook.msg.email,
                event,
                info,
                timestamp: None,
            });
        }
        Ok(result)
    }
}

#[derive(Serialize)]
struct SendPayload {
    key: String,
    message: MandrillMessage,
    #[serde(rename = "async")]
    run_async: bool,
}

/// Mandrill's send message, the mutation target for config directives.
/// Mandrill has no per-send IP pool or tracking controls the gateway
/// exposes, so the configurer is a pure no-op.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MandrillMessage {
    pub from_email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub from_name: String,
    pub subject: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub html: String,
    pub to: Vec<MandrillRecipient>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<MandrillAttachment>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MandrillRecipient {
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct MandrillAttachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct SendResult {
    #[serde(rename = "_id", default)]
    id: String,
    #[serde(default)]
    email: String,
}

#[derive(Debug, Deserialize)]
struct MandrillHook {
    #[serde(rename = "_id", default)]
    id: String,
    #[serde(default)]
    event: String,
    #[serde(default)]
    msg: MandrillHookMsg,
}

#[derive(Debug, Default, Deserialize)]
struct MandrillHookMsg {
    #[serde(default)]
    email: String,
    #[serde(default)]
    bounce_description: String,
    #[serde(default)]
    smtp_events: Vec<MandrillSmtpEvent>,
}

#[derive(Debug, Default, Deserialize)]
struct MandrillSmtpEvent {
    #[serde(default)]
    diag: String,
}

pub struct MandrillConfigurer;

impl Configurer<MandrillMessage> for MandrillConfigurer {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mailgate_core::Address;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn email() -> Email {
        Email {
            from: Address::new("Ops", "ops@example.com"),
            to: vec![Address::new("Bob", "bob@customer.com")],
            cc: vec![Address::new("", "archive@example.com")],
            subject: "hello".to_string(),
            text: "plain".to_string(),
            ..Email::default()
        }
    }

    #[tokio::test]
    async fn send_submits_async_and_maps_each_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/1.0/messages/send.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"email": "bob@customer.com", "status": "queued", "_id": "m1"},
                {"email": "archive@example.com", "status": "queued", "_id": "m2"}
            ])))
            .mount(&server)
            .await;

        let service = Mandrill::new("md-key").with_base_url(server.uri());
        let responses = service.send(&email()).await.unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].id(), "mandrill:m1");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["key"], "md-key");
        assert_eq!(body["async"], true);
        // Cc recipients travel in the same list, tagged by type.
        assert_eq!(body["message"]["to"][1]["type"], "cc");
    }

    #[tokio::test]
    async fn api_rejection_carries_the_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Invalid_Key"))
            .mount(&server)
            .await;

        let service = Mandrill::new("bad-key").with_base_url(server.uri());
        let err = service.send(&email()).await.unwrap_err();
        assert!(err.to_string().contains("Invalid_Key"));
    }

    #[test]
    fn posthook_body_is_form_encoded_json() {
        let service = Mandrill::new("md-key");
        let events = serde_json::json!([
            {"_id": "m1", "event": "send", "msg": {"email": "bob@customer.com"}},
            {"_id": "m2", "event": "soft_bounce",
             "msg": {"email": "eve@customer.com", "bounce_description": "mailbox full"}},
            {"_id": "m3", "event": "reject", "msg": {"email": "spam@customer.com"}},
            {"_id": "", "event": "send", "msg": {}}
        ]);
        let body: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("mandrill_events", &events.to_string())
            .finish();

        let hooks = service.unmarshal_posthook(body.as_bytes()).unwrap();
        assert_eq!(hooks.len(), 3);
        assert_eq!(hooks[0].event, PosthookEvent::Delivered);
        assert_eq!(hooks[1].event, PosthookEvent::Deferred);
        assert_eq!(hooks[1].info, "deferral; soft_bounce; mailbox full");
        assert_eq!(hooks[2].event, PosthookEvent::Dropped);
    }

    #[test]
    fn missing_events_field_is_an_error() {
        let service = Mandrill::new("md-key");
        let err = service.unmarshal_posthook(b"other=1").unwrap_err();
        assert!(matches!(err, ServiceError::Posthook { .. }));
    }
}
