//! Cross-cutting wrappers around a [`Service`](crate::Service).
//!
//! Each decorator owns the wrapped service and implements the same contract,
//! delegating the methods it does not modify, so decorators compose in any
//! order and the facade is unaware of the stack depth. Every decorator
//! delegates `name`, `can_send` and `weight` so routing, eligibility and
//! weighted selection survive decoration.

mod allow_list;
mod metrics;
mod trace;
mod weight;

pub use allow_list::AllowList;
pub use metrics::Metrics;
pub use trace::Traced;
pub use weight::Weight;
