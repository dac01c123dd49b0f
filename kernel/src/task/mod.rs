//! Cooperative task scheduling.
//!
//! `scheduler` is the core subsystem; `clock` is the tick counter it
//! advances, split out because `get_ticks()` is independently observable;
//! `context` is the portable seam the architecture-specific switch plugs
//! into (see `arch::x86_64::context`).

pub mod clock;
pub mod context;
pub mod scheduler;
