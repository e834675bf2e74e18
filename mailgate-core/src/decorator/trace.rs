use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use crate::{Email, Posthook, Response, Service, ServiceError};

/// Wraps `send` and `unmarshal_posthook` in tracing spans carrying the
/// service name. Return values and errors pass through unchanged.
pub struct Traced {
    inner: Arc<dyn Service>,
}

impl Traced {
    #[must_use]
    pub fn new(inner: Arc<dyn Service>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Service for Traced {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn can_send(&self, email: &Email) -> bool {
        self.inner.can_send(email)
    }

    async fn send(&self, email: &Email) -> Result<Vec<Response>, ServiceError> {
        let span = tracing::info_span!("mail_transfer", service = self.inner.name());
        self.inner.send(email).instrument(span).await
    }

    fn unmarshal_posthook(&self, body: &[u8]) -> Result<Vec<Posthook>, ServiceError> {
        let span = tracing::info_span!("posthook_unmarshal", service = self.inner.name());
        span.in_scope(|| self.inner.unmarshal_posthook(body))
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

    #[tokio::test]
    async fn decoration_order_does_not_change_the_contract() {
        let inner: Arc<dyn Service> = Arc::new(MockService::new("mock").with_weight(3));
        let traced = Traced::new(inner);
        assert_eq!(traced.name(), "mock");
        assert_eq!(traced.weight(), Some(3));
        let responses = traced.send(&Email::new()).await.unwrap();
        assert_eq!(responses[0].service, "mock");
    }
}
