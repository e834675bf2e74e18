//! In-memory backend for local development and tests.

use async_trait::async_trait;
use mailgate_core::{Email, Posthook, Response, Service, ServiceError};
use parking_lot::Mutex;

/// Accepts everything, delivers nothing. Sent emails are recorded and one
/// response per recipient is fabricated; posthook bodies are expected to
/// already be in the unified shape and are echoed back with this backend's
/// name stamped on.
pub struct Mock {
    name: String,
    fail_with: Option<String>,
    sent: Mutex<Vec<Email>>,
}

impl Mock {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fail_with: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Make every send fail with the given message.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    /// Emails accepted so far, in submission order.
    #[must_use]
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Service for Mock {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, email: &Email) -> Result<Vec<Response>, ServiceError> {
        if let Some(message) = &self.fail_with {
            return Err(ServiceError::api(&self.name, message));
        }

        let mut sent = self.sent.lock();
        sent.push(email.clone());
        let sequence = sent.len();

        Ok(email
            .to
            .iter()
            .enumerate()
            .map(|(index, recipient)| Response {
                service: self.name.clone(),
                message_id: format!("mock-{sequence}-{index}"),
                email: recipient.email.clone(),
            })
            .collect())
    }

    fn unmarshal_posthook(&self, body: &[u8]) -> Result<Vec<Posthook>, ServiceError> {
        let mut hooks: Vec<Posthook> = serde_json::from_slice(body)
            .map_err(|err| ServiceError::posthook(&self.name, err))?;
        for hook in &mut hooks {
            hook.service = self.name.clone();
        }
        Ok(hooks)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mailgate_core::{Address, PosthookEvent};

    #[tokio::test]
    async fn records_sends_and_fabricates_one_response_per_recipient() {
        let mock = Mock::new("mock");
        let email = Email {
            from: Address::new("Ops", "ops@example.com"),
            to: vec![
                Address::new("", "a@customer.com"),
                Address::new("", "b@customer.com"),
            ],
            ..Email::default()
        };

        let responses = mock.send(&email).await.unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].message_id, "mock-1-0");
        assert_eq!(responses[1].email, "b@customer.com");
        assert_eq!(mock.sent().len(), 1);
    }

    #[tokio::test]
    async fn scripted_failure_is_an_api_error() {
        let mock = Mock::new("mock").failing("scripted outage");
        let err = mock.send(&Email::new()).await.unwrap_err();
        assert!(err.to_string().contains("scripted outage"));
        assert!(mock.sent().is_empty());
    }

    #[test]
    fn posthook_echo_stamps_the_backend_name() {
        let mock = Mock::new("mock");
        let body = br#"[{"service": "", "message_id": "m1", "event": "delivered"}]"#;
        let hooks = mock.unmarshal_posthook(body).unwrap();
        assert_eq!(hooks[0].service, "mock");
        assert_eq!(hooks[0].event, PosthookEvent::Delivered);
    }
}
