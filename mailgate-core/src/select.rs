//! Selection strategies: pick one backend out of the eligible set.
//!
//! Strategies are pure policy objects; the only shared state is the
//! round-robin counter, which is owned by its strategy instance rather than
//! living in a process global so tests can construct independent instances.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};

use crate::Service;

/// Picks one service out of the eligible set.
pub trait SelectStrategy: Send + Sync {
    /// Returns `None` only for an empty input slice.
    fn select<'a>(&self, services: &'a [Arc<dyn Service>]) -> Option<&'a Arc<dyn Service>>;
}

/// Uniform pick; every call is independent, no session affinity.
#[derive(Clone, Copy, Debug, Default)]
pub struct Random;

impl SelectStrategy for Random {
    fn select<'a>(&self, services: &'a [Arc<dyn Service>]) -> Option<&'a Arc<dyn Service>> {
        services.choose(&mut rand::rng())
    }
}

/// Rotates through the slice with a single shared counter.
///
/// The counter lives for the strategy instance, not per caller. Rotation
/// order follows the slice ordering as presented, so callers must pass the
/// same ordering across calls for the rotation to be meaningful.
#[derive(Debug, Default)]
pub struct RoundRobin {
    next: Mutex<u64>,
}

impl RoundRobin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectStrategy for RoundRobin {
    fn select<'a>(&self, services: &'a [Arc<dyn Service>]) -> Option<&'a Arc<dyn Service>> {
        if services.is_empty() {
            return None;
        }
        // Held only for the arithmetic, never across a send.
        let mut next = self.next.lock();
        let index = usize::try_from(*next).unwrap_or(0) % services.len();
        *next = next.wrapping_add(1);
        services.get(index)
    }
}

/// Weight-proportional pick over services tagged with a weight.
///
/// E.g. service A with weight 9 and B with weight 1: out of every 100 sends,
/// on average 90 go to A and 10 to B. Untagged services are excluded from
/// the weighted pool; if no service carries a weight the strategy falls back
/// to [`Random`] over the whole eligible set.
#[derive(Clone, Copy, Debug, Default)]
pub struct Weighted;

impl SelectStrategy for Weighted {
    fn select<'a>(&self, services: &'a [Arc<dyn Service>]) -> Option<&'a Arc<dyn Service>> {
        let mut pool: Vec<(&'a Arc<dyn Service>, u64)> = services
            .iter()
            .filter_map(|service| service.weight().map(|w| (service, u64::from(w))))
            .collect();
        if pool.is_empty() {
            return Random.select(services);
        }

        let total: u64 = pool.iter().map(|(_, weight)| weight).sum();
        if total == 0 {
            return Random.select(services);
        }

        let mut rng = rand::rng();
        // Shuffle so a draw landing on a boundary carries no first-candidate
        // bias.
        pool.shuffle(&mut rng);

        let mut draw = i128::from(rng.random_range(1..=total));
        for (service, weight) in &pool {
            draw -= i128::from(*weight);
            if draw <= 0 {
                return Some(service);
            }
        }
        // Guards against rounding edge cases.
        pool.last().map(|(service, _)| *service)
    }
}
