use std::sync::Arc;

use async_trait::async_trait;

use crate::{Email, Posthook, Response, Service, ServiceError};

/// Pure metadata carrier tagging a service with a selection weight.
///
/// Consulted only by the weighted selection strategy through
/// [`Service::weight`]; send behavior is untouched.
pub struct Weight {
    inner: Arc<dyn Service>,
    weight: u32,
}

impl Weight {
    #[must_use]
    pub fn new(weight: u32, inner: Arc<dyn Service>) -> Self {
        Self { inner, weight }
    }
}

#[async_trait]
impl Service for Weight {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn can_send(&self, email: &Email) -> bool {
        self.inner.can_send(email)
    }

    async fn send(&self, email: &Email) -> Result<Vec<Response>, ServiceError> {
        self.inner.send(email).await
    }

    fn unmarshal_posthook(&self, body: &[u8]) -> Result<Vec<Posthook>, ServiceError> {
        self.inner.unmarshal_posthook(body)
    }

    fn weight(&self) -> Option<u32> {
        Some(self.weight)
    }
}
