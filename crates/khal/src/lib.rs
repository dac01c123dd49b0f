//! Hardware Abstraction Layer.
//!
//! This kernel has no interrupts, no paging and no SMP, so the HAL shrinks
//! to exactly what the core subsystems need from the outside world: a
//! serial console to read/write bytes on. Port I/O is kept as its own
//! module because it is the one piece of genuinely unsafe hardware access
//! in the whole stack.
#![no_std]

pub mod port;
pub mod serial;

pub use serial::Serial;
