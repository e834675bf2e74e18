use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{Email, Posthook, Response, ServiceError};

/// A delivery backend: one configured email provider or raw SMTP target.
///
/// Implementations live outside the core; the core treats them as opaque
/// capabilities. Decorators wrap a `Service` and must delegate [`name`],
/// [`can_send`] and [`weight`] unchanged so that preferred-service routing,
/// eligibility filtering and weighted selection are unaffected by decoration
/// order.
///
/// [`name`]: Service::name
/// [`can_send`]: Service::can_send
/// [`weight`]: Service::weight
#[async_trait]
pub trait Service: Send + Sync {
    /// Stable, lowercase name, unique among the configured backend set.
    /// Used both for preferred-service routing and webhook dispatch.
    fn name(&self) -> &str;

    /// Whether this backend is able to deliver the given email, e.g. "has an
    /// API key whose domain matches the sender".
    fn can_send(&self, _email: &Email) -> bool {
        true
    }

    /// Deliver the email. One [`Response`] per accepted recipient, in the
    /// provider's own cardinality.
    ///
    /// # Errors
    ///
    /// Any provider or transport failure, wrapped with the backend name.
    async fn send(&self, email: &Email) -> Result<Vec<Response>, ServiceError>;

    /// Parse this backend's raw webhook body into unified [`Posthook`]s.
    ///
    /// # Errors
    ///
    /// If the body cannot be parsed or its signature cannot be verified.
    fn unmarshal_posthook(&self, body: &[u8]) -> Result<Vec<Posthook>, ServiceError>;

    /// Selection weight, if this service carries one.
    ///
    /// Only the weight decorator answers `Some`; consulted by the weighted
    /// selection strategy.
    fn weight(&self) -> Option<u32> {
        None
    }
}

/// The wildcard domain, matched when no domain-specific key applies.
pub const ANY_DOMAIN: &str = "";

/// A provider API key, scoped to a sender domain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApiKey {
    /// Sender domain this key is valid for; [`ANY_DOMAIN`] matches any.
    pub domain: String,
    pub key: String,
    /// Free-form provider properties, e.g. `region=eu`.
    pub props: BTreeMap<String, String>,
}

impl ApiKey {
    #[must_use]
    pub fn new(domain: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            key: key.into(),
            props: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn prop(&self, name: &str) -> Option<&str> {
        self.props.get(name).map(String::as_str)
    }
}

/// An [`ApiKey`] tagged with the backend it belongs to, as configured.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceApiKey {
    pub service: String,
    pub key: ApiKey,
}

/// Pick the key for a sender address: the key whose domain matches the
/// sender's domain (case-insensitive), falling back to the wildcard key.
#[must_use]
pub fn key_by_email_domain<'a>(keys: &'a [ApiKey], sender: &str) -> Option<&'a ApiKey> {
    let domain = sender
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim())
        .filter(|domain| !domain.is_empty());

    if let Some(domain) = domain
        && let Some(key) = keys
            .iter()
            .find(|key| !key.domain.is_empty() && key.domain.eq_ignore_ascii_case(domain))
    {
        return Some(key);
    }
    keys.iter().find(|key| key.domain == ANY_DOMAIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_key_preferred_over_wildcard() {
        let keys = vec![
            ApiKey::new(ANY_DOMAIN, "fallback"),
            ApiKey::new("example.com", "specific"),
        ];
        let key = key_by_email_domain(&keys, "ops@Example.COM");
        assert_eq!(key.map(|k| k.key.as_str()), Some("specific"));
    }

    #[test]
    fn wildcard_is_last_resort() {
        let keys = vec![
            ApiKey::new("other.com", "other"),
            ApiKey::new(ANY_DOMAIN, "fallback"),
        ];
        let key = key_by_email_domain(&keys, "ops@example.com");
        assert_eq!(key.map(|k| k.key.as_str()), Some("fallback"));
    }

    #[test]
    fn no_match_without_wildcard() {
        let keys = vec![ApiKey::new("other.com", "other")];
        assert!(key_by_email_domain(&keys, "ops@example.com").is_none());
        assert!(key_by_email_domain(&keys, "malformed").is_none());
    }
}
