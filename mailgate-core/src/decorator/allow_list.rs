use std::sync::Arc;

use async_trait::async_trait;

use crate::{Address, Email, Posthook, Response, Service, ServiceError};

/// Drops recipients outside a configured allow-list before delegating.
///
/// Entries are either exact addresses (`ops@example.com`) or domain
/// suffixes (`@example.com`); matching is case-insensitive. When no
/// recipient survives the filter the wrapped send is skipped entirely and
/// an empty response list is returned, not an error. An empty allow-list
/// passes everything through.
pub struct AllowList {
    inner: Arc<dyn Service>,
    allow: Vec<String>,
}

impl AllowList {
    #[must_use]
    pub fn new(inner: Arc<dyn Service>, allow: Vec<String>) -> Self {
        Self {
            inner,
            allow: allow
                .into_iter()
                .map(|entry| entry.trim().to_ascii_lowercase())
                .filter(|entry| !entry.is_empty())
                .collect(),
        }
    }

    fn is_allowed(&self, recipient: &Address) -> bool {
        let email = recipient.email.to_ascii_lowercase();
        if self.allow.iter().any(|entry| *entry == email) {
            return true;
        }
        recipient
            .domain()
            .is_some_and(|domain| {
                let suffix = format!("@{}", domain.to_ascii_lowercase());
                self.allow.iter().any(|entry| *entry == suffix)
            })
    }
}

#[async_trait]
impl Service for AllowList {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn can_send(&self, email: &Email) -> bool {
        self.inner.can_send(email)
    }

    async fn send(&self, email: &Email) -> Result<Vec<Response>, ServiceError> {
        if self.allow.is_empty() {
            return self.inner.send(email).await;
        }

        let (allowed, blocked): (Vec<Address>, Vec<Address>) = email
            .to
            .iter()
            .cloned()
            .partition(|recipient| self.is_allowed(recipient));

        if !blocked.is_empty() {
            tracing::info!(
                service = self.inner.name(),
                blocked = blocked.len(),
                "allow-list filter dropped recipients"
            );
        }
        if allowed.is_empty() {
            tracing::warn!(
                service = self.inner.name(),
                "no recipients left after allow-list filter, skipping send"
            );
            return Ok(Vec::new());
        }

        let mut filtered = email.clone();
        filtered.to = allowed;
        self.inner.send(&filtered).await
    }

    fn unmarshal_posthook(&self, body: &[u8]) -> Result<Vec<Posthook>, ServiceError> {
        self.inner.unmarshal_posthook(body)
    }

    fn weight(&self) -> Option<u32> {
        self.inner.weight()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::MockService;

    fn wrapped(allow: &[&str]) -> (Arc<MockService>, AllowList) {
        let mock = Arc::new(MockService::new("mock"));
        let filter = AllowList::new(
            Arc::clone(&mock) as Arc<dyn Service>,
            allow.iter().map(ToString::to_string).collect(),
        );
        (mock, filter)
    }

    fn email_to(recipients: &[&str]) -> Email {
        Email {
            to: recipients.iter().map(|r| Address::new("", *r)).collect(),
            ..Email::default()
        }
    }

    #[tokio::test]
    async fn only_allowed_recipients_reach_the_wrapped_send() {
        let (mock, filter) = wrapped(&["allowed@x.com"]);
        let email = email_to(&["allowed@x.com", "blocked@y.com"]);
        filter.send(&email).await.unwrap();
        let seen = mock.sent();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].to.len(), 1);
        assert_eq!(seen[0].to[0].email, "allowed@x.com");
    }

    #[tokio::test]
    async fn domain_suffix_entries_match() {
        let (mock, filter) = wrapped(&["@x.com"]);
        let email = email_to(&["anyone@X.COM", "blocked@y.com"]);
        filter.send(&email).await.unwrap();
        assert_eq!(mock.sent()[0].to[0].email, "anyone@X.COM");
    }

    #[tokio::test]
    async fn empty_remainder_short_circuits_without_error() {
        let (mock, filter) = wrapped(&["allowed@x.com"]);
        let email = email_to(&["blocked@y.com"]);
        let responses = filter.send(&email).await.unwrap();
        assert!(responses.is_empty());
        assert_eq!(mock.send_count(), 0);
    }

    #[tokio::test]
    async fn empty_allow_list_passes_everything_through() {
        let (mock, filter) = wrapped(&[]);
        let email = email_to(&["anyone@anywhere.com"]);
        filter.send(&email).await.unwrap();
        assert_eq!(mock.sent()[0].to.len(), 1);
    }

    #[test]
    fn name_is_preserved() {
        let (_, filter) = wrapped(&["@x.com"]);
        assert_eq!(filter.name(), "mock");
    }
}
