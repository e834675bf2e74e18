//! Error taxonomy for the gateway core.
//!
//! [`ServiceError`] covers failures inside one backend and always carries the
//! backend's name. [`GatewayError`] covers routing-level failures and wraps
//! backend errors when they surface to the caller.

use thiserror::Error;

/// A failure inside a single delivery backend.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The provider's API rejected the request.
    #[error("{service}: api error: {message}")]
    Api { service: String, message: String },

    /// The request never reached the provider (connect, TLS, timeout).
    #[error("{service}: transport error: {message}")]
    Transport { service: String, message: String },

    /// No API key is configured for the sender's domain.
    #[error("{service}: no api key for sender {sender}")]
    MissingApiKey { service: String, sender: String },

    /// The email could not be translated into the provider's shape.
    #[error("{service}: invalid message: {message}")]
    InvalidMessage { service: String, message: String },

    /// A webhook body could not be parsed or verified.
    #[error("{service}: posthook error: {message}")]
    Posthook { service: String, message: String },
}

impl ServiceError {
    pub fn api(service: impl Into<String>, message: impl ToString) -> Self {
        Self::Api {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn transport(service: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_message(service: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidMessage {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn posthook(service: impl Into<String>, message: impl ToString) -> Self {
        Self::Posthook {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// Name of the backend the error originated from.
    #[must_use]
    pub fn service(&self) -> &str {
        match self {
            Self::Api { service, .. }
            | Self::Transport { service, .. }
            | Self::MissingApiKey { service, .. }
            | Self::InvalidMessage { service, .. }
            | Self::Posthook { service, .. } => service,
        }
    }
}

/// A routing-level failure surfaced to the gateway's caller.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// No configured backend accepts this email.
    #[error("no configured service is able to send this email")]
    NoEligibleService,

    /// The selection strategy produced no candidate; indicates an empty or
    /// misconfigured backend set.
    #[error("selection strategy did not produce a service")]
    NoServiceSelected,

    /// Webhook dispatch found no backend with the given name.
    #[error("no service named {0:?} to dispatch the posthook to")]
    NoSuchService(String),

    /// A backend failed and the retry strategy did not recover it.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Every attempted backend failed, in attempt order.
    #[error("all delivery attempts failed: {}", join_errors(.0))]
    AllAttemptsFailed(Vec<ServiceError>),
}

fn join_errors(errors: &[ServiceError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregated_error_preserves_every_diagnostic() {
        let err = GatewayError::AllAttemptsFailed(vec![
            ServiceError::api("sendgrid", "429 too many requests"),
            ServiceError::transport("mailjet", "connection refused"),
        ]);
        let text = err.to_string();
        assert!(text.contains("sendgrid: api error: 429 too many requests"));
        assert!(text.contains("mailjet: transport error: connection refused"));
        // Attempt order is preserved.
        assert!(text.find("sendgrid").unwrap_or(usize::MAX) < text.find("mailjet").unwrap_or(0));
    }

    #[test]
    fn service_error_names_its_backend() {
        let err = ServiceError::MissingApiKey {
            service: "sendgrid".to_string(),
            sender: "ops@example.com".to_string(),
        };
        assert_eq!(err.service(), "sendgrid");
    }
}
