// =============================================================================
// CoopKernel — Kernel Synchronization Primitives
// =============================================================================
//
// This module provides the one synchronization primitive the kernel needs:
// a spinlock around the `Kernel` singleton (`kernel::state::kernel()`). In a
// `no_std` binary there is no `std::sync` to reach for, so we bring our own.
//
// There is exactly one lock in this kernel, so there is no lock-ordering
// question to get wrong — see `kernel::state`'s module docs for why the
// heap, scheduler and process manager live behind a single shared lock
// rather than one each.
// =============================================================================

pub mod spinlock;

