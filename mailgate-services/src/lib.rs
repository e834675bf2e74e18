//! Provider adapters for the mailgate delivery gateway.
//!
//! Each backend implements [`mailgate_core::Service`]: it translates the
//! unified [`mailgate_core::Email`] into the provider's request shape,
//! applies config directives through its own
//! [`mailgate_core::Configurer`], and normalizes the provider's webhook
//! bodies back into unified posthooks.

pub mod mailjet;
pub mod mandrill;
pub mod mock;
pub mod sendgrid;
pub mod smtp;

pub use mailjet::Mailjet;
pub use mandrill::Mandrill;
pub use mock::Mock;
pub use sendgrid::Sendgrid;
pub use smtp::Smtp;
