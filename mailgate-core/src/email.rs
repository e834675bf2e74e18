use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Address, ConfigItem};

/// A file attached to an [`Email`]. `content` is base64 encoded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    #[serde(default)]
    pub content_type: String,
    pub content: String,
}

/// One logical outbound email, as submitted to the gateway.
///
/// Immutable from the facade's perspective; only the allow-list decorator
/// may forward a copy with a filtered `to` list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub service_config: Vec<ConfigItem>,
    pub from: Address,
    #[serde(default)]
    pub to: Vec<Address>,
    #[serde(default)]
    pub cc: Vec<Address>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Email {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn minimal_submission_deserializes() {
        let email: Email = serde_json::from_str(
            r#"{
                "from": {"name": "Ops", "email": "ops@example.com"},
                "to": [{"email": "bob@example.com"}],
                "subject": "hi",
                "text": "hello"
            }"#,
        )
        .unwrap();
        assert_eq!(email.from.email, "ops@example.com");
        assert_eq!(email.to.len(), 1);
        assert!(email.headers.is_empty());
        assert!(email.service_config.is_empty());
    }
}
