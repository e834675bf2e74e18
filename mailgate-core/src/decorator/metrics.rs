use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};

use crate::{Email, Posthook, Response, Service, ServiceError};

/// Records send/posthook counters and send durations for the wrapped
/// service. Return values and errors pass through unchanged.
pub struct Metrics {
    inner: Arc<dyn Service>,
}

impl Metrics {
    #[must_use]
    pub fn new(inner: Arc<dyn Service>) -> Self {
        Self { inner }
    }

    fn status(result: &Result<Vec<Response>, ServiceError>) -> &'static str {
        if result.is_ok() { "success" } else { "error" }
    }
}

#[async_trait]
impl Service for Metrics {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn can_send(&self, email: &Email) -> bool {
        self.inner.can_send(email)
    }

    async fn send(&self, email: &Email) -> Result<Vec<Response>, ServiceError> {
        let service = self.inner.name().to_string();
        let started = Instant::now();
        let result = self.inner.send(email).await;
        histogram!("mailgate_service_send_duration_seconds", "service" => service.clone())
            .record(started.elapsed().as_secs_f64());
        counter!(
            "mailgate_service_send_total",
            "service" => service,
            "status" => Self::status(&result)
        )
        .increment(1);
        result
    }

    fn unmarshal_posthook(&self, body: &[u8]) -> Result<Vec<Posthook>, ServiceError> {
        let result = self.inner.unmarshal_posthook(body);
        counter!(
            "mailgate_service_posthook_total",
            "service" => self.inner.name().to_string(),
            "status" => if result.is_ok() { "success" } else { "error" }
        )
        .increment(1);
        result
    }

    fn weight(&self) -> Option<u32> {
        self.inner.weight()
    }
}
