//! Routing and failover engine for the mailgate delivery gateway.
//!
//! The gateway fronts several independent email providers behind one
//! interface. Callers hand the [`Facade`] one logical email; the facade
//! filters the configured [`Service`]s by capability, picks one with a
//! [`SelectStrategy`], delivers through a [`RetryStrategy`], and later
//! normalizes that provider's delivery webhook into a [`Posthook`].

mod address;
mod config;
mod configurer;
pub mod decorator;
mod email;
mod error;
mod facade;
mod posthook;
mod retry;
mod select;
mod service;
mod warmup;

#[cfg(test)]
pub(crate) mod test_support;

pub use address::Address;
pub use config::{ConfigItem, ConfigKey};
pub use configurer::{Configurer, apply_config};
pub use email::{Attachment, Email};
pub use error::{GatewayError, ServiceError};
pub use facade::Facade;
pub use posthook::{Posthook, PosthookEvent, Response};
pub use retry::{NoRetry, RetryEach, RetryOneOther, RetrySame, RetryStrategy};
pub use select::{Random, RoundRobin, SelectStrategy, Weighted};
pub use service::{ANY_DOMAIN, ApiKey, Service, ServiceApiKey, key_by_email_domain};
pub use warmup::{WarmupLimiter, WarmupPolicy};
