//! Portable side of the context-switch primitive.
//!
//! The scheduler (`task::scheduler`) only ever talks to the architecture's
//! register save/restore through this trait — it never knows whether a
//! switch is a `ret`-trampoline trick on x86_64 or something else on a
//! future target. This is the seam the design notes call for: add
//! `arch/aarch64/context.rs` implementing the same trait and the scheduler
//! does not change.

/// A task's entry function. Called once, from the trampoline, the first
/// time a task is switched to. Tasks that return are exited automatically
/// (see `task::scheduler::exit_task`).
pub type TaskEntry = fn();

/// Architecture hook for suspending one task and resuming another.
///
/// Implementors provide exactly two primitives: lay out a brand-new task's
/// stack so that switching to it for the first time lands in the
/// trampoline, and perform the actual register save/restore.
pub trait ContextSwitch {
    /// Writes an initial frame at the top of `stack`, so that switching to
    /// it resumes at the trampoline with `entry` recoverable from it.
    /// Returns the resulting stack pointer to store as the task's saved
    /// `rsp`.
    fn build_initial_frame(stack_top: usize, entry: TaskEntry) -> usize;

    /// Switches from the currently running task to another.
    ///
    /// # Safety
    /// `old_rsp` must point at a valid, writable `u64` slot belonging to
    /// the currently running task, and `new_rsp` must be a stack pointer
    /// previously produced by `build_initial_frame` or saved by a prior
    /// call to `switch`.
    unsafe fn switch(old_rsp: *mut usize, new_rsp: usize);
}
