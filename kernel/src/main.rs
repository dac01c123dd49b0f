// =============================================================================
// CoopKernel — Boot Entry Point
// =============================================================================
//
// Brings up the heap, the scheduler and the process manager in that
// order, seeds two demo tasks (a READY task and a soon-to-be-BLOCKED
// one, to exercise round-robin selection across a sleep), then drops
// into the REPL, which is the kernel's idle loop from here on.
// =============================================================================

#![no_std]
#![no_main]

mod arch;
mod memory;
mod process;
mod repl;
mod state;
mod sync;
mod task;
mod util;

use limine::BaseRevision;

/// Base revision supported by this kernel. The bootloader refuses to boot
/// us if it doesn't understand this revision — the one piece of boot
/// protocol plumbing this kernel still depends on.
#[used]
#[link_section = ".limine_requests"]
static BASE_REVISION: BaseRevision = BaseRevision::new();

/// Backing storage for the heap allocator. `memory::heap::Heap::init`
/// expects one contiguous region handed to it at boot; a static buffer in
/// the kernel's own BSS section is that region, with no physical-memory
/// discovery required (this kernel has no paging or frame allocator to do
/// that discovery with).
const HEAP_SIZE: usize = 128 * 1024;

#[repr(align(8))]
struct HeapRegion([u8; HEAP_SIZE]);

static mut HEAP_REGION: HeapRegion = HeapRegion([0; HEAP_SIZE]);

/// Demo task A: mirrors the reference kernel's `task_a`, reporting the
/// current tick count and sleeping between reports.
fn demo_task_a() {
    loop {
        klog::info!("[task a] running (ticks={})", task::clock::now());
        task::scheduler::sleep(2);
    }
}

/// Demo task B: mirrors the reference kernel's `task_b`, at a different
/// sleep period so the two tasks interleave under the round-robin rule.
fn demo_task_b() {
    loop {
        klog::info!("[task b] hello");
        task::scheduler::sleep(3);
    }
}

/// Kernel entry point called by the Limine bootloader.
#[unsafe(no_mangle)]
unsafe extern "C" fn _start() -> ! {
    assert!(BASE_REVISION.is_supported());

    klog::init();
    klog::println!();
    klog::println!("========================================");
    klog::println!("    CoopKernel - Minimal Cooperative OS");
    klog::println!("========================================");
    klog::println!("Initializing managers...");

    // SAFETY: `_start` runs once, before any task or interrupt could
    // observe `HEAP_REGION`; taking its address here does not alias any
    // other live reference.
    let heap_start = unsafe { core::ptr::addr_of_mut!(HEAP_REGION.0) as usize };
    state::kernel().lock().init(heap_start, HEAP_SIZE);

    {
        let mut kernel = state::kernel().lock();
        kernel.scheduler.create_task(demo_task_a, 1);
        kernel.scheduler.create_task(demo_task_b, 1);
    }

    klog::info!("type 'help' for a list of commands");
    repl::run();
}
