// =============================================================================
// CoopKernel — x86_64 Context Switch
// =============================================================================
//
// The cooperative scheduler needs exactly two things from the CPU: a way
// to build a brand-new task's stack so switching to it lands somewhere
// sane, and a way to swap the callee-saved registers (+ return address)
// between two stacks. Both are implemented here; `task::context` exposes
// them to the scheduler through the `ContextSwitch` trait so the scheduler
// itself never touches an `asm!` block.
//
// REGISTER LAYOUT (must match the push/pop order below):
//   [top-8]  rip   ← return address (trampoline, on first switch)
//   [top-16] rbp
//   [top-24] rbx
//   [top-32] r12   ← carries the task's entry function pointer on first entry
//   [top-40] r13
//   [top-48] r14
//   [top-56] r15
// =============================================================================

use crate::task::context::{ContextSwitch, TaskEntry};

core::arch::global_asm!(
    ".global coopkernel_switch_asm",
    "coopkernel_switch_asm:",
    // rdi = &mut old_rsp, rsi = new_rsp
    "push rbp",
    "push rbx",
    "push r12",
    "push r13",
    "push r14",
    "push r15",
    "mov [rdi], rsp",
    "mov rsp, rsi",
    "pop r15",
    "pop r14",
    "pop r13",
    "pop r12",
    "pop rbx",
    "pop rbp",
    "ret",
);

core::arch::global_asm!(
    ".global coopkernel_trampoline_asm",
    "coopkernel_trampoline_asm:",
    // On first switch into a new task, control `ret`s here with the
    // task's entry function pointer sitting in r12 (see
    // `X86_64::build_initial_frame`). Move it into the first
    // argument register and hand off to safe Rust.
    "mov rdi, r12",
    "call coopkernel_trampoline_entry",
);

unsafe extern "C" {
    fn coopkernel_switch_asm(old_rsp: *mut u64, new_rsp: u64);
    fn coopkernel_trampoline_asm();
}

/// Reached once, on a task's first switch-in. Calls the task's entry
/// function; if the task ever returns instead of calling `exit_task`
/// itself, it is exited on its behalf.
#[unsafe(no_mangle)]
extern "C" fn coopkernel_trampoline_entry(entry: u64) -> ! {
    // SAFETY: `entry` was produced by `X86_64::build_initial_frame` from a
    // genuine `TaskEntry` function pointer.
    let task: TaskEntry = unsafe { core::mem::transmute::<u64, TaskEntry>(entry) };
    task();
    crate::task::scheduler::exit_task();
}

/// The x86_64 implementation of the portable context-switch contract.
pub struct X86_64;

impl ContextSwitch for X86_64 {
    fn build_initial_frame(stack_top: usize, entry: TaskEntry) -> usize {
        let sp = stack_top - 7 * core::mem::size_of::<u64>();
        // SAFETY: `stack_top` is the top of a stack owned by the task being
        // built and is large enough to hold this frame (enforced by the
        // scheduler's `STACK_SIZE` constant).
        unsafe {
            let ptr = sp as *mut u64;
            ptr.add(0).write(0); // r15
            ptr.add(1).write(0); // r14
            ptr.add(2).write(0); // r13
            ptr.add(3).write(entry as usize as u64); // r12 — carries entry
            ptr.add(4).write(0); // rbx
            ptr.add(5).write(0); // rbp
            ptr.add(6).write(coopkernel_trampoline_asm as usize as u64); // rip
        }
        sp
    }

    unsafe fn switch(old_rsp: *mut usize, new_rsp: usize) {
        // SAFETY: forwarded from the caller's contract.
        unsafe {
            coopkernel_switch_asm(old_rsp as *mut u64, new_rsp as u64);
        }
    }
}
