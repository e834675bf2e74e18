use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// A generic per-send configuration directive.
///
/// An empty `service` means the item applies to every backend; otherwise it
/// applies only to the backend whose name matches. Items are applied in list
/// order, so a later item overwrites an earlier one for the same key
/// (service-specific entries are conventionally ordered after global ones).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigItem {
    #[serde(default)]
    pub service: String,
    pub key: ConfigKey,
    #[serde(default)]
    pub value: String,
}

impl ConfigItem {
    #[must_use]
    pub fn new(service: impl Into<String>, key: ConfigKey, value: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            key,
            value: value.into(),
        }
    }
}

/// Recognized configuration keys.
///
/// Unrecognized keys deserialize into [`ConfigKey::Other`] so that a stale or
/// misspelled directive passes validation; it is logged and ignored at apply
/// time rather than failing the send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKey {
    /// Route the send through a named provider-side IP pool.
    IpPool,
    /// Informational vendor marker, never acted upon.
    Vendor,
    /// Turn off provider-side open/click/subscription tracking.
    DisableTracking,
    #[serde(untagged)]
    Other(String),
}

impl Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IpPool => f.write_str("ip_pool"),
            Self::Vendor => f.write_str("vendor"),
            Self::DisableTracking => f.write_str("disable_tracking"),
            Self::Other(key) => f.write_str(key),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn known_keys_round_trip() {
        let item: ConfigItem =
            serde_json::from_str(r#"{"service":"sendgrid","key":"ip_pool","value":"warm"}"#)
                .unwrap();
        assert_eq!(item.key, ConfigKey::IpPool);
        assert_eq!(
            serde_json::to_string(&item.key).unwrap(),
            r#""ip_pool""#
        );
    }

    #[test]
    fn unrecognized_key_is_not_an_error() {
        let item: ConfigItem =
            serde_json::from_str(r#"{"service":"","key":"frobnicate","value":"x"}"#).unwrap();
        assert_eq!(item.key, ConfigKey::Other("frobnicate".to_string()));
    }
}
