//! Mailjet v3.1 send API backend.
//!
//! Authenticates with the account's public/private key pair over basic
//! auth. Mailjet reserves a number of routing and tracking headers for
//! itself; those are stripped from the submission instead of failing it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mailgate_core::{
    Address, Configurer, Email, Posthook, PosthookEvent, Response, Service, ServiceError,
    apply_config,
};
use serde::{Deserialize, Serialize};

const NAME: &str = "mailjet";
const DEFAULT_BASE: &str = "https://api.mailjet.com";

/// Headers Mailjet rejects or overwrites; submitting them is a hard API
/// error, so they are dropped up front.
const BANNED_HEADERS: &[&str] = &[
    "from",
    "sender",
    "subject",
    "to",
    "cc",
    "bcc",
    "return-path",
    "delivered-to",
    "dkim-signature",
    "domainkey-status",
    "received-spf",
    "authentication-results",
    "received",
    "x-mailjet-prio",
    "x-mailjet-debug",
    "user-agent",
    "x-mailer",
    "x-mj-customid",
    "x-mj-eventpayload",
    "x-mj-vars",
    "x-mj-templateerrordeliver",
    "x-mj-templateerrorreporting",
    "x-mj-templatelanguage",
    "x-mailjet-trackopen",
    "x-mailjet-trackclick",
    "x-mj-templateid",
    "x-mj-workflowid",
    "x-feedback-id",
    "x-mailjet-segmentation",
    "list-id",
    "x-mj-mid",
    "x-mj-errormessage",
    "date",
    "x-csa-complaints",
    "message-id",
    "x-mailjet-campaign",
    "x-mj-statisticscontactslistid",
];

pub struct Mailjet {
    public_key: String,
    private_key: String,
    base_url: String,
    client: reqwest::Client,
    confer: MailjetConfigurer,
}

impl Mailjet {
    #[must_use]
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
            base_url: DEFAULT_BASE.to_string(),
            client: reqwest::Client::new(),
            confer: MailjetConfigurer,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_message(email: &Email) -> SendPayload {
        let headers: BTreeMap<String, String> = email
            .headers
            .iter()
            .filter(|(name, _)| !BANNED_HEADERS.contains(&name.to_ascii_lowercase().as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        SendPayload {
            messages: vec![Message {
                from: Recipient::from(&email.from),
                to: email.to.iter().map(Recipient::from).collect(),
                cc: email.cc.iter().map(Recipient::from).collect(),
                subject: email.subject.clone(),
                text_part: email.text.clone(),
                html_part: email.html.clone(),
                headers,
            }],
        }
    }
}

#[async_trait]
impl Service for Mailjet {
    fn name(&self) -> &str {
        NAME
    }

    async fn send(&self, email: &Email) -> Result<Vec<Response>, ServiceError> {
        let mut message = Self::build_message(email);
        apply_config(NAME, &email.service_config, &self.confer, &mut message);

        let response = self
            .client
            .post(format!("{}/v3.1/send", self.base_url))
            .basic_auth(&self.public_key, Some(&self.private_key))
            .json(&message)
            .send()
            .await
            .map_err(|err| ServiceError::transport(NAME, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::api(NAME, format!("{status}: {body}")));
        }

        let body: SendResult = response
            .json()
            .await
            .map_err(|err| ServiceError::api(NAME, err))?;

        // One response per accepted recipient; Mailjet assigns a UUID each.
        Ok(body
            .messages
            .into_iter()
            .flat_map(|message| message.to)
            .map(|recipient| Response {
                service: NAME.to_string(),
                message_id: recipient.message_uuid,
                email: recipient.email,
            })
            .collect())
    }

    fn unmarshal_posthook(&self, body: &[u8]) -> Result<Vec<Posthook>, ServiceError> {
        // Event grouping is an account-level toggle: grouped accounts post a
        // JSON array, ungrouped ones a single object per event.
        let trimmed = body.trim_ascii_start();
        let hooks: Vec<MailjetHook> = if trimmed.first() == Some(&b'{') {
            serde_json::from_slice::<MailjetHook>(trimmed)
                .map(|hook| vec![hook])
                .map_err(|err| ServiceError::posthook(NAME, err))?
        } else {
            serde_json::from_slice(trimmed).map_err(|err| ServiceError::posthook(NAME, err))?
        };

        let mut result = Vec::new();
        for hook in hooks {
            if hook.message_guid.is_empty() {
                continue;
            }

            let (event, info) = match hook.event.to_ascii_lowercase().as_str() {
                "sent" => (PosthookEvent::Delivered, String::new()),
                "open" => (PosthookEvent::Open, String::new()),
                "click" => (PosthookEvent::Click, String::new()),
                "bounce" => (
                    PosthookEvent::Bounce,
                    format!("{}; {}", hook.error, hook.comment),
                ),
                "blocked" => (PosthookEvent::Dropped, hook.error),
                "spam" => (PosthookEvent::Spam, hook.source),
                "unsub" => (PosthookEvent::Unsubscribe, String::new()),
                _ => (PosthookEvent::Unknown, String::new()),
            };

            result.push(Posthook {
                service: NAME.to_string(),
                event_id: String::new(),
                message_id: hook.message_guid,
                email: hook.email,
                event,
                info,
                timestamp: None,
            });
        }
        Ok(result)
    }
}

/// Mailjet's v3.1 send payload, the mutation target for config directives.
/// Mailjet exposes neither IP pools nor per-send tracking switches, so the
/// configurer is a pure no-op.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SendPayload {
    #[serde(rename = "Messages")]
    pub messages: Vec<Message>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    pub from: Recipient,
    pub to: Vec<Recipient>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<Recipient>,
    pub subject: String,
    pub text_part: String,
    #[serde(rename = "HTMLPart")]
    pub html_part: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Recipient {
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl From<&Address> for Recipient {
    fn from(address: &Address) -> Self {
        Self {
            email: address.email.clone(),
            name: address.name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendResult {
    #[serde(rename = "Messages", default)]
    messages: Vec<MessageResult>,
}

#[derive(Debug, Deserialize)]
struct MessageResult {
    #[serde(rename = "To", default)]
    to: Vec<RecipientResult>,
}

#[derive(Debug, Deserialize)]
struct RecipientResult {
    #[serde(rename = "Email", default)]
    email: String,
    #[serde(rename = "MessageUUID", default)]
    message_uuid: String,
}

#[derive(Debug, Deserialize)]
struct MailjetHook {
    #[serde(default)]
    event: String,
    #[serde(rename = "Message_GUID", default)]
    message_guid: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    error: String,
    #[serde(default)]
    source: String,
}

pub struct MailjetConfigurer;

impl Configurer<SendPayload> for MailjetConfigurer {}
