//! SendGrid v3 `mail/send` backend.
//!
//! Keys are scoped per sender domain and carry two optional props:
//! `region=eu` routes the send through SendGrid's EU data-residency
//! endpoint, and `unicode-hack=true` appends a word joiner (U+2060) to the
//! HTML body. Without a Unicode character SendGrid encodes the HTML as
//! iso-8859-1, which causes gmail to clip the email.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use mailgate_core::{
    ApiKey, Configurer, Email, Posthook, PosthookEvent, Response, Service, ServiceError,
    WarmupLimiter, apply_config, key_by_email_domain,
};
use serde::{Deserialize, Serialize};

const NAME: &str = "sendgrid";
const DEFAULT_BASE: &str = "https://api.sendgrid.com";
const EU_BASE: &str = "https://api.eu.sendgrid.com";

pub struct Sendgrid {
    keys: Vec<ApiKey>,
    base_url: Option<String>,
    client: reqwest::Client,
    confer: SendgridConfigurer,
}

impl Sendgrid {
    #[must_use]
    pub fn new(keys: Vec<ApiKey>) -> Self {
        Self {
            keys,
            base_url: None,
            client: reqwest::Client::new(),
            confer: SendgridConfigurer::default(),
        }
    }

    /// Restrict the `ip_pool` directive to the given pool names and gate it
    /// behind the shared warmup limiter.
    #[must_use]
    pub fn with_ip_pools(mut self, pools: Vec<String>, limiter: Arc<WarmupLimiter>) -> Self {
        self.confer = SendgridConfigurer {
            pools,
            limiter: Some(limiter),
        };
        self
    }

    /// Override the API base URL. Overrides the per-key region routing.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn endpoint(&self, key: &ApiKey) -> String {
        let base = match &self.base_url {
            Some(base) => base.as_str(),
            None if key.prop("region") == Some("eu") => EU_BASE,
            None => DEFAULT_BASE,
        };
        format!("{base}/v3/mail/send")
    }

    fn build_message(email: &Email, key: &ApiKey) -> MailSend {
        let mut html = email.html.clone();
        if !html.is_empty() && key.prop("unicode-hack") == Some("true") {
            html.push('\u{2060}');
        }

        let mut content = Vec::new();
        if !email.text.is_empty() {
            content.push(Content {
                kind: "text/plain".to_string(),
                value: email.text.clone(),
            });
        }
        if !html.is_empty() {
            content.push(Content {
                kind: "text/html".to_string(),
                value: html,
            });
        }

        let mut headers = BTreeMap::new();
        let mut reply_to = None;
        for (name, value) in &email.headers {
            if name == "Reply-To" {
                reply_to = Some(EmailRef {
                    email: value.clone(),
                    name: String::new(),
                });
            } else {
                headers.insert(name.clone(), value.clone());
            }
        }

        MailSend {
            personalizations: vec![Personalization {
                to: email.to.iter().map(EmailRef::from).collect(),
                cc: email.cc.iter().map(EmailRef::from).collect(),
            }],
            from: EmailRef::from(&email.from),
            subject: email.subject.clone(),
            content,
            headers,
            reply_to,
            attachments: email
                .attachments
                .iter()
                .map(|attachment| MailAttachment {
                    content: attachment.content.clone(),
                    filename: attachment.name.clone(),
                    kind: attachment.content_type.clone(),
                    disposition: "attachment".to_string(),
                })
                .collect(),
            ip_pool_name: None,
            tracking_settings: None,
        }
    }
}

#[async_trait]
impl Service for Sendgrid {
    fn name(&self) -> &str {
        NAME
    }

    fn can_send(&self, email: &Email) -> bool {
        key_by_email_domain(&self.keys, &email.from.email).is_some()
    }

    async fn send(&self, email: &Email) -> Result<Vec<Response>, ServiceError> {
        let key = key_by_email_domain(&self.keys, &email.from.email).ok_or_else(|| {
            ServiceError::MissingApiKey {
                service: NAME.to_string(),
                sender: email.from.email.clone(),
            }
        })?;

        let mut message = Self::build_message(email, key);
        apply_config(NAME, &email.service_config, &self.confer, &mut message);

        let response = self
            .client
            .post(self.endpoint(key))
            .bearer_auth(&key.key)
            .json(&message)
            .send()
            .await
            .map_err(|err| ServiceError::transport(NAME, err))?;

        let status = response.status();
        // SendGrid returns a single X-Message-Id per accepted request, even
        // with multiple recipients in the personalization.
        let ids: Vec<String> = response
            .headers()
            .get_all("X-Message-Id")
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::api(NAME, format!("{status}: {body}")));
        }

        Ok(ids
            .into_iter()
            .map(|id| Response {
                service: NAME.to_string(),
                message_id: id,
                email: String::new(),
            })
            .collect())
    }

    fn unmarshal_posthook(&self, body: &[u8]) -> Result<Vec<Posthook>, ServiceError> {
        let hooks: Vec<SendgridHook> =
            serde_json::from_slice(body).map_err(|err| ServiceError::posthook(NAME, err))?;

        let mut result = Vec::new();
        for hook in hooks {
            if hook.sg_message_id.is_empty() {
                continue;
            }

            let (event, info) = match hook.event.to_ascii_lowercase().as_str() {
                "delivered" => (PosthookEvent::Delivered, hook.response),
                "deferred" => (PosthookEvent::Deferred, hook.response),
                "open" => (PosthookEvent::Open, String::new()),
                "click" => (PosthookEvent::Click, String::new()),
                "bounce" => (
                    PosthookEvent::Bounce,
                    format!(
                        "{}; {}; {}; {}",
                        hook.kind, hook.status, hook.bounce_classification, hook.reason
                    ),
                ),
                "dropped" => (PosthookEvent::Dropped, hook.reason),
                "processed" => (PosthookEvent::Processed, String::new()),
                "spamreport" => (PosthookEvent::Spam, String::new()),
                "unsubscribe" | "group_unsubscribe" => (PosthookEvent::Unsubscribe, String::new()),
                other => {
                    tracing::warn!(event = other, "received unsupported webhook event");
                    (PosthookEvent::Unknown, hook.event)
                }
            };

            // The sg_message_id suffix after the first dot is filter metadata,
            // not part of the id returned at send time.
            let message_id = hook
                .sg_message_id
                .split('.')
                .next()
                .unwrap_or_default()
                .to_string();

            result.push(Posthook {
                service: NAME.to_string(),
                event_id: hook.sg_event_id,
                message_id,
                email: hook.email,
                event,
                info,
                // Whole second precision is all SendGrid provides.
                timestamp: DateTime::from_timestamp(hook.timestamp, 0)
                    .filter(|_| hook.timestamp != 0),
            });
        }
        Ok(result)
    }
}

/// SendGrid's v3 send payload, the mutation target for config directives.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MailSend {
    pub personalizations: Vec<Personalization>,
    pub from: EmailRef,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subject: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Content>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<EmailRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<MailAttachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_pool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_settings: Option<TrackingSettings>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Personalization {
    pub to: Vec<EmailRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<EmailRef>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct EmailRef {
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl From<&mailgate_core::Address> for EmailRef {
    fn from(address: &mailgate_core::Address) -> Self {
        Self {
            email: address.email.clone(),
            name: address.name.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Content {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct MailAttachment {
    pub content: String,
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub disposition: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct TrackingSettings {
    pub click_tracking: Toggle,
    pub open_tracking: Toggle,
    pub subscription_tracking: Toggle,
    pub ganalytics: Toggle,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Toggle {
    pub enable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_text: Option<bool>,
}

/// Honors the `ip_pool` directive only for configured pool names and only
/// while the warmup limiter admits; a denied directive leaves the send on
/// the account's default pool.
#[derive(Default)]
pub struct SendgridConfigurer {
    pools: Vec<String>,
    limiter: Option<Arc<WarmupLimiter>>,
}

impl Configurer<MailSend> for SendgridConfigurer {
    fn set_ip_pool(&self, pool: &str, message: &mut MailSend) {
        if !self.pools.iter().any(|known| known == pool) {
            tracing::warn!(pool, "ignoring directive for unconfigured ip pool");
            return;
        }
        if let Some(limiter) = &self.limiter
            && !limiter.allow()
        {
            tracing::info!(pool, "warmup quota reached, send stays on the default pool");
            return;
        }
        message.ip_pool_name = Some(pool.to_string());
    }

    fn disable_tracking(&self, message: &mut MailSend) {
        message.tracking_settings = Some(TrackingSettings {
            click_tracking: Toggle {
                enable: false,
                enable_text: Some(false),
            },
            open_tracking: Toggle::default(),
            subscription_tracking: Toggle::default(),
            ganalytics: Toggle::default(),
        });
    }
}

/// One entry of SendGrid's event-webhook array body.
#[derive(Debug, Default, Deserialize)]
struct SendgridHook {
    #[serde(default)]
    email: String,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    event: String,
    #[serde(default)]
    sg_event_id: String,
    #[serde(default)]
    sg_message_id: String,
    #[serde(default)]
    response: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    status: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    bounce_classification: String,
}
