// =============================================================================
// CoopKernel — Kernel Panic Handler
// =============================================================================
//
// A kernel panic indicates a violated invariant — corrupted allocator
// state, a scheduler table inconsistency, a process table bug. There is
// no way to recover from the trusted computing base being wrong, so we
// print the location and message to the serial console (our only output)
// and halt every core for good.
//
// We go through `klog::error!` rather than touching `khal::serial`
// directly. If the panic happened while the serial lock was already held,
// the spin lock inside `klog`/`khal` will simply spin forever here — an
// acceptable outcome for a condition that is already fatal.
// =============================================================================

use crate::arch::x86_64::cpu;
use core::panic::PanicInfo;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    klog::error!("================================================");
    klog::error!("KERNEL PANIC");
    if let Some(location) = info.location() {
        klog::error!("  at {}:{}", location.file(), location.line());
    }
    klog::error!("  {}", info.message());
    klog::error!("system halted");
    klog::error!("================================================");

    cpu::halt_forever()
}
