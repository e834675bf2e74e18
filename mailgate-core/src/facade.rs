use std::sync::Arc;

use crate::{
    Email, GatewayError, NoRetry, Posthook, Random, Response, RetryStrategy, SelectStrategy,
    Service,
};

/// The single entry point used by the HTTP layer.
///
/// Orchestrates capability filtering, the preferred-service override,
/// selection, retry and webhook dispatch. Read-only after construction and
/// safely shared across concurrent calls.
pub struct Facade {
    services: Vec<Arc<dyn Service>>,
    select: Box<dyn SelectStrategy>,
    retry: Box<dyn RetryStrategy>,
}

impl Facade {
    /// Builds a facade with the default strategies: [`Random`] selection,
    /// [`NoRetry`] failover.
    #[must_use]
    pub fn new(services: Vec<Arc<dyn Service>>) -> Self {
        Self {
            services,
            select: Box::new(Random),
            retry: Box::new(NoRetry),
        }
    }

    #[must_use]
    pub fn with_select(mut self, select: Box<dyn SelectStrategy>) -> Self {
        self.select = select;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: Box<dyn RetryStrategy>) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn services(&self) -> &[Arc<dyn Service>] {
        &self.services
    }

    /// Route and deliver one email.
    ///
    /// `preferred` is a case-insensitive backend name hint. If it names an
    /// eligible backend it bypasses the selection strategy; a stale or
    /// unsupported hint falls through to strategy-based selection rather
    /// than hard-failing the call.
    ///
    /// # Errors
    ///
    /// [`GatewayError::NoEligibleService`] when no backend accepts the
    /// email, [`GatewayError::NoServiceSelected`] when the strategy yields
    /// nothing, otherwise whatever the retry strategy surfaces.
    pub async fn send(
        &self,
        email: &Email,
        preferred: Option<&str>,
    ) -> Result<Vec<Response>, GatewayError> {
        let eligible: Vec<Arc<dyn Service>> = self
            .services
            .iter()
            .filter(|service| service.can_send(email))
            .cloned()
            .collect();
        if eligible.is_empty() {
            return Err(GatewayError::NoEligibleService);
        }

        let preferred = preferred.map(str::trim).filter(|name| !name.is_empty());
        let chosen = match preferred.and_then(|name| {
            eligible
                .iter()
                .find(|service| service.name().eq_ignore_ascii_case(name))
        }) {
            Some(service) => Arc::clone(service),
            None => Arc::clone(
                self.select
                    .select(&eligible)
                    .ok_or(GatewayError::NoServiceSelected)?,
            ),
        };

        let recipients: Vec<&str> = email.to.iter().map(|a| a.email.as_str()).collect();
        tracing::info!(
            service = chosen.name(),
            recipients = ?recipients,
            "sending email"
        );

        self.retry.send(chosen.as_ref(), email, &eligible).await
    }

    /// Dispatch a raw webhook body to the backend it came from.
    ///
    /// `service` is the identifier the HTTP layer extracted from the webhook
    /// request's query string; lookup is case-insensitive.
    ///
    /// # Errors
    ///
    /// [`GatewayError::NoSuchService`] when no backend matches, otherwise
    /// the backend's own unmarshal error.
    pub fn unmarshal_posthook(
        &self,
        service: &str,
        body: &[u8],
    ) -> Result<Vec<Posthook>, GatewayError> {
        let backend = self
            .services
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(service))
            .ok_or_else(|| GatewayError::NoSuchService(service.to_string()))?;
        backend.unmarshal_posthook(body).map_err(GatewayError::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::MockService;
    use crate::{Address, PosthookEvent, RetryEach};

    fn facade(services: Vec<MockService>) -> Facade {
        Facade::new(
            services
                .into_iter()
                .map(|s| Arc::new(s) as Arc<dyn Service>)
                .collect(),
        )
    }

    fn email_from(sender: &str) -> Email {
        Email {
            from: Address::new("", sender),
            to: vec![Address::new("", "to@example.com")],
            ..Email::default()
        }
    }

    #[tokio::test]
    async fn no_eligible_service_is_terminal() {
        let f = facade(vec![MockService::new("a").refusing_all()]);
        let err = f.send(&email_from("ops@example.com"), None).await;
        assert!(matches!(err, Err(GatewayError::NoEligibleService)));
    }

    #[tokio::test]
    async fn preferred_service_bypasses_selection() {
        let f = facade(vec![MockService::new("a"), MockService::new("b")]);
        for _ in 0..20 {
            let res = f
                .send(&email_from("ops@example.com"), Some("B"))
                .await
                .unwrap();
            assert_eq!(res[0].service, "b");
        }
    }

    #[tokio::test]
    async fn stale_preferred_hint_falls_through_to_selection() {
        let f = facade(vec![MockService::new("a")]);
        let res = f
            .send(&email_from("ops@example.com"), Some("gone"))
            .await
            .unwrap();
        assert_eq!(res[0].service, "a");
    }

    #[tokio::test]
    async fn ineligible_services_are_not_selectable() {
        let f = facade(vec![
            MockService::new("a").refusing_all(),
            MockService::new("b"),
        ]);
        for _ in 0..20 {
            let res = f.send(&email_from("ops@example.com"), None).await.unwrap();
            assert_eq!(res[0].service, "b");
        }
    }

    #[tokio::test]
    async fn retry_strategy_receives_the_eligible_set() {
        let f = facade(vec![
            MockService::new("a").failing("a down"),
            MockService::new("b").failing("b down"),
        ])
        .with_retry(Box::new(RetryEach));
        let err = f
            .send(&email_from("ops@example.com"), Some("a"))
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("a down") && text.contains("b down"));
    }

    #[test]
    fn posthook_dispatch_is_case_insensitive() {
        let f = facade(vec![MockService::new("sendgrid")]);
        let body = br#"[{"service":"","message_id":"m1","event":"delivered","timestamp":null}]"#;
        let hooks = f.unmarshal_posthook("SendGrid", body).unwrap();
        assert_eq!(hooks[0].service, "sendgrid");
        assert_eq!(hooks[0].event, PosthookEvent::Delivered);
    }

    #[test]
    fn posthook_unknown_service_errors() {
        let f = facade(vec![MockService::new("a")]);
        let err = f.unmarshal_posthook("nope", b"[]").unwrap_err();
        assert!(matches!(err, GatewayError::NoSuchService(name) if name == "nope"));
    }

    #[test]
    fn posthook_unmarshal_is_idempotent() {
        let f = facade(vec![MockService::new("a")]);
        let body = br#"[{"service":"","message_id":"m1","event":"open","timestamp":null}]"#;
        let first = f.unmarshal_posthook("a", body).unwrap();
        let second = f.unmarshal_posthook("a", body).unwrap();
        assert_eq!(first, second);
    }
}
