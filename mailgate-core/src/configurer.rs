//! Per-backend application of generic configuration directives.

use crate::{ConfigItem, ConfigKey};

/// Translates a generic directive into a provider-specific mutation of the
/// backend's message type `M`.
///
/// Both operations default to no-ops: not every provider exposes IP pools or
/// tracking switches, and a backend that supports neither still participates
/// in config application without error.
pub trait Configurer<M>: Send + Sync {
    fn set_ip_pool(&self, _pool: &str, _message: &mut M) {}

    fn disable_tracking(&self, _message: &mut M) {}
}

/// Apply the directives addressed to `service` to `message`, in list order.
///
/// Items with an empty `service` apply to every backend. Because items are
/// applied strictly in order, a later item wins over an earlier one for the
/// same key; service-specific entries are conventionally ordered after
/// global ones and therefore override them. Unrecognized keys are logged
/// and skipped, never an error.
pub fn apply_config<M>(
    service: &str,
    items: &[ConfigItem],
    configurer: &dyn Configurer<M>,
    message: &mut M,
) {
    let addressed = items
        .iter()
        .filter(|item| item.service.is_empty() || item.service.eq_ignore_ascii_case(service));

    for item in addressed {
        match &item.key {
            ConfigKey::IpPool => {
                tracing::debug!(service, pool = %item.value, "applying ip pool directive");
                configurer.set_ip_pool(&item.value, message);
            }
            // Informational passthrough only.
            ConfigKey::Vendor => {}
            ConfigKey::DisableTracking => {
                tracing::debug!(service, "disabling tracking");
                configurer.disable_tracking(message);
            }
            ConfigKey::Other(key) => {
                tracing::warn!(service, %key, "skipping unrecognized config key");
            }
        }
    }
}
