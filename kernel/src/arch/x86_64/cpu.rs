// =============================================================================
// CoopKernel — CPU Utilities (x86_64)
// =============================================================================
//
// Low-level CPU operations that don't fit in a specific subsystem. Thin
// wrappers around privileged x86_64 instructions, kept minimal: this
// kernel never leaves CPL 0 and never deals with interrupts beyond the
// spinlock's CLI/STI pair, so there is no GDT/IDT/paging code here.
// =============================================================================

/// Halts the CPU until the next interrupt arrives. Not currently called
/// by the scheduler — when no task is READY it falls back to the
/// bootstrap slot, which resumes the REPL's own input loop rather than
/// idling on HLT. Kept for a future true idle state.
#[inline(always)]
pub fn halt() {
    // SAFETY: HLT simply stops instruction execution until an interrupt
    // fires. Always safe to execute in kernel mode.
    unsafe {
        core::arch::asm!("hlt", options(nomem, nostack));
    }
}

/// Halts the CPU in an unrecoverable state. Never returns.
///
/// Used by the panic handler: disables interrupts and loops on HLT so
/// nothing can wake the core back up.
#[inline(always)]
pub fn halt_forever() -> ! {
    loop {
        // SAFETY: CLI + HLT in a loop keeps the CPU stopped; no interrupt
        // can wake us because interrupts are disabled.
        unsafe {
            core::arch::asm!("cli", "hlt", options(nomem, nostack));
        }
    }
}
