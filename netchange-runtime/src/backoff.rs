//! Bounded exponential backoff for the per-partition reconcile loop
//! (spec.md §4.3, §5): base 20ms, doubling, capped after 5 attempts
//! (20+40+80+160+320 ms).
//!
//! Grounded on `kube_runtime::controller::Controller::trigger_backoff`,
//! which is typed against `backoff::backoff::Backoff`; this module wraps
//! the same crate's `ExponentialBackoff` with the spec's exact constants
//! instead of exposing a free-running policy.

use backoff::backoff::Backoff as _;
use backoff::ExponentialBackoff;
use std::time::Duration;

pub const BASE_DELAY: Duration = Duration::from_millis(20);
pub const MAX_ATTEMPTS: u32 = 5;

/// Returns the delay to use before the `attempt`-th retry (1-indexed), or
/// `None` once the attempt budget is exhausted and the item should be
/// dropped instead of requeued.
#[must_use]
pub fn delay_for_attempt(attempt: u32) -> Option<Duration> {
    if attempt == 0 || attempt > MAX_ATTEMPTS {
        return None;
    }
    let mut backoff = ExponentialBackoff {
        current_interval: BASE_DELAY,
        initial_interval: BASE_DELAY,
        multiplier: 2.0,
        randomization_factor: 0.0,
        max_interval: BASE_DELAY * (1 << (MAX_ATTEMPTS - 1)),
        max_elapsed_time: None,
        ..ExponentialBackoff::default()
    };
    let mut delay = backoff.next_backoff();
    for _ in 1..attempt {
        delay = backoff.next_backoff();
    }
    delay
}
