//! In-crate test double for the [`Service`] trait.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{Email, Posthook, Response, Service, ServiceError};

pub(crate) struct MockService {
    name: String,
    weight: Option<u32>,
    refuse_all: bool,
    fail_message: Option<String>,
    failures_left: Mutex<u32>,
    sent: Mutex<Vec<Email>>,
}

impl MockService {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            weight: None,
            refuse_all: false,
            fail_message: None,
            failures_left: Mutex::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Every send fails with the given diagnostic.
    pub(crate) fn failing(mut self, message: &str) -> Self {
        self.fail_message = Some(message.to_string());
        self
    }

    /// The first `n` sends fail, subsequent ones succeed.
    pub(crate) fn failing_times(self, n: u32) -> Self {
        *self.failures_left.lock() = n;
        self
    }

    /// `can_send` answers false for every email.
    pub(crate) fn refusing_all(mut self) -> Self {
        self.refuse_all = true;
        self
    }

    pub(crate) fn send_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub(crate) fn sent(&self) -> Vec<Email> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Service for MockService {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_send(&self, _email: &Email) -> bool {
        !self.refuse_all
    }

    async fn send(&self, email: &Email) -> Result<Vec<Response>, ServiceError> {
        self.sent.lock().push(email.clone());
        if let Some(message) = &self.fail_message {
            return Err(ServiceError::transport(&self.name, message));
        }
        {
            let mut left = self.failures_left.lock();
            if *left > 0 {
                *left -= 1;
                return Err(ServiceError::transport(&self.name, "transient failure"));
            }
        }
        Ok(vec![Response {
            service: self.name.clone(),
            message_id: format!("mock-{}", self.send_count()),
            email: email.to.first().map(|a| a.email.clone()).unwrap_or_default(),
        }])
    }

    fn unmarshal_posthook(&self, body: &[u8]) -> Result<Vec<Posthook>, ServiceError> {
        let mut hooks: Vec<Posthook> = serde_json::from_slice(body)
            .map_err(|err| ServiceError::posthook(&self.name, err))?;
        for hook in &mut hooks {
            hook.service.clone_from(&self.name);
        }
        Ok(hooks)
    }

    fn weight(&self) -> Option<u32> {
        self.weight
    }
}
