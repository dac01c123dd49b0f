//! Kernel tick counter.
//!
//! There is no timer interrupt in this kernel — "ticks" are a logical
//! counter advanced only by `Scheduler::decide_yield`/`decide_sleep`, one
//! per voluntary suspension. Split out from `task::scheduler` because the
//! tick count is independently observable from the REPL's `ps` command.

use core::sync::atomic::{AtomicU64, Ordering};

/// Global tick counter.
static TICKS: AtomicU64 = AtomicU64::new(0);

/// Advances the tick counter by one. Called once per suspension point.
#[inline]
pub fn tick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Return the current tick count.
#[inline]
pub fn now() -> u64 {
    TICKS.load(Ordering::Relaxed)
}
