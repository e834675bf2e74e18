use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One accepted recipient of a send.
///
/// Cardinality is backend-shaped: some providers return one id for the whole
/// send, others one per recipient. The gateway does not normalize this.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub service: String,
    pub message_id: String,
    #[serde(default)]
    pub email: String,
}

impl Response {
    /// Globally unique id of the accepted message, `service:message_id`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}:{}", self.service, self.message_id)
    }
}

/// The unified delivery-status event taxonomy.
///
/// `Unknown` is the default when a backend-specific event code has no
/// mapping; receiving one is not an error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PosthookEvent {
    /// Message was accepted by the receiving server.
    Delivered,
    /// Recipient's server temporarily rejected the message.
    Deferred,
    /// Receiving server could not or would not accept the message.
    Bounce,
    /// Provider dropped the message before attempting delivery.
    Dropped,
    /// Recipient opened the HTML message (requires open tracking).
    Open,
    /// Recipient clicked a link in the message (requires click tracking).
    Click,
    /// Recipient marked the message as spam.
    Spam,
    /// Recipient used the message's subscription management link.
    Unsubscribe,
    /// Provider accepted the message for processing.
    Processed,
    #[default]
    Unknown,
}

impl Display for PosthookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Delivered => "delivered",
            Self::Deferred => "deferred",
            Self::Bounce => "bounce",
            Self::Dropped => "dropped",
            Self::Open => "open",
            Self::Click => "click",
            Self::Spam => "spam",
            Self::Unsubscribe => "unsubscribe",
            Self::Processed => "processed",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A backend's asynchronous delivery-status callback, normalized.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posthook {
    pub service: String,
    #[serde(default)]
    pub event_id: String,
    pub message_id: String,
    #[serde(default)]
    pub email: String,
    pub event: PosthookEvent,
    #[serde(default)]
    pub info: String,
    /// When the provider recorded the event, if it tells us.
    pub timestamp: Option<DateTime<Utc>>,
}

impl Posthook {
    /// Globally unique id of the affected message, `service:message_id`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}:{}", self.service, self.message_id)
    }
}
