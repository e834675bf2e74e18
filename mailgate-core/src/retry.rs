//! Retry / failover strategies.
//!
//! The acceptable cost of cross-provider duplicate sends versus delivery
//! guarantees is an operational trade-off, so the policy is caller-selected
//! rather than hardcoded. A retried send may result in duplicate
//! provider-side sends; the gateway does not guarantee exactly-once.
//!
//! Cancellation: the caller cancels by dropping the returned future (or
//! racing it against a timeout), which aborts the in-flight provider call;
//! no attempt is started after that point.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{Email, GatewayError, Response, Service, ServiceError};

/// Encodes the failover policy after the chosen backend fails.
#[async_trait]
pub trait RetryStrategy: Send + Sync {
    /// Deliver `email` through `chosen`, falling over to `eligible` services
    /// per policy.
    ///
    /// # Errors
    ///
    /// Backend failures the policy did not recover from.
    async fn send(
        &self,
        chosen: &dyn Service,
        email: &Email,
        eligible: &[Arc<dyn Service>],
    ) -> Result<Vec<Response>, GatewayError>;
}

/// Single attempt; the chosen backend's error is propagated verbatim.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRetry;

#[async_trait]
impl RetryStrategy for NoRetry {
    async fn send(
        &self,
        chosen: &dyn Service,
        email: &Email,
        _eligible: &[Arc<dyn Service>],
    ) -> Result<Vec<Response>, GatewayError> {
        chosen.send(email).await.map_err(GatewayError::from)
    }
}

/// On failure, one more attempt on the same backend. Useful for transient
/// network blips; the second attempt's outcome is returned either way.
#[derive(Clone, Copy, Debug, Default)]
pub struct RetrySame;

#[async_trait]
impl RetryStrategy for RetrySame {
    async fn send(
        &self,
        chosen: &dyn Service,
        email: &Email,
        _eligible: &[Arc<dyn Service>],
    ) -> Result<Vec<Response>, GatewayError> {
        match chosen.send(email).await {
            Ok(responses) => Ok(responses),
            Err(err) => {
                tracing::warn!(service = chosen.name(), error = %err, "send failed, retrying once on the same service");
                chosen.send(email).await.map_err(GatewayError::from)
            }
        }
    }
}

/// On failure, exactly one alternate: the first eligible backend whose name
/// differs from the chosen one. Without an alternate, the original error is
/// returned.
#[derive(Clone, Copy, Debug, Default)]
pub struct RetryOneOther;

#[async_trait]
impl RetryStrategy for RetryOneOther {
    async fn send(
        &self,
        chosen: &dyn Service,
        email: &Email,
        eligible: &[Arc<dyn Service>],
    ) -> Result<Vec<Response>, GatewayError> {
        let err = match chosen.send(email).await {
            Ok(responses) => return Ok(responses),
            Err(err) => err,
        };
        let Some(other) = eligible
            .iter()
            .find(|service| service.name() != chosen.name())
        else {
            return Err(err.into());
        };
        tracing::warn!(
            service = chosen.name(),
            fallback = other.name(),
            error = %err,
            "send failed, falling over to one other service"
        );
        other.send(email).await.map_err(GatewayError::from)
    }
}

/// On failure, every eligible backend in order (skipping none), stopping at
/// the first success. If all fail, the error aggregates every attempt's
/// diagnostic, original failure first.
#[derive(Clone, Copy, Debug, Default)]
pub struct RetryEach;

#[async_trait]
impl RetryStrategy for RetryEach {
    async fn send(
        &self,
        chosen: &dyn Service,
        email: &Email,
        eligible: &[Arc<dyn Service>],
    ) -> Result<Vec<Response>, GatewayError> {
        let mut failures: Vec<ServiceError> = Vec::new();
        match chosen.send(email).await {
            Ok(responses) => return Ok(responses),
            Err(err) => failures.push(err),
        }
        for service in eligible {
            tracing::warn!(
                fallback = service.name(),
                attempts = failures.len(),
                "send failed, trying next eligible service"
            );
            match service.send(email).await {
                Ok(responses) => return Ok(responses),
                Err(err) => failures.push(err),
            }
        }
        Err(GatewayError::AllAttemptsFailed(failures))
    }
}
