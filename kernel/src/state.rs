// =============================================================================
// CoopKernel — Kernel Singleton
// =============================================================================
//
// The heap, scheduler and process manager are explicitly-initialized
// collaborators, not free-floating globals: they live together in one
// `Kernel` struct behind one `SpinLock`, and every cross-subsystem
// operation (spawning a process, reaping a zombie) is a method here that
// borrows exactly the sibling fields it needs. Nothing outside this module
// reaches into `heap`/`scheduler`/`processes` directly.
// =============================================================================

use crate::memory::heap::{BlockInfo, Heap, HeapStats};
use crate::process::{ProcessInfo, ProcessManager, SignalHandler, PROC_STACK_SIZE};
use crate::sync::spinlock::SpinLock;
use crate::task::context::TaskEntry;
use crate::task::scheduler::{Scheduler, SwitchOp, TaskInfo};

pub struct Kernel {
    pub heap: Heap,
    pub scheduler: Scheduler,
    pub processes: ProcessManager,
}

impl Kernel {
    const fn new() -> Self {
        Self {
            heap: Heap::new(),
            scheduler: Scheduler::new(),
            processes: ProcessManager::new(),
        }
    }

    /// Brings up all three subsystems. Must be called once, before
    /// anything else touches the kernel.
    pub fn init(&mut self, heap_start: usize, heap_size: usize) {
        self.heap.init(heap_start, heap_size);
        self.scheduler.init();
        self.processes.init();
        klog::info!(
            "[kernel] heap ready ({} KiB), scheduler and process manager ready",
            heap_size / 1024
        );
    }

    // -- Heap -----------------------------------------------------------

    pub fn allocate(&mut self, size: usize) -> *mut u8 {
        self.heap.allocate(size)
    }

    pub fn free(&mut self, p: *mut u8) {
        if !self.heap.free(p) {
            klog::warn!("[heap] free({:p}) rejected: double free or invalid pointer", p);
        }
    }

    pub fn resize(&mut self, p: *mut u8, new_size: usize) -> *mut u8 {
        self.heap.resize(p, new_size)
    }

    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    pub fn heap_dump(&self, visit: impl FnMut(BlockInfo)) {
        self.heap.dump(visit);
    }

    // -- Processes + scheduler -------------------------------------------

    /// Creates a new process: allocates its stack from the heap, creates
    /// its scheduler task, and registers process bookkeeping. On any
    /// failure, resources already acquired are released and `None` is
    /// returned.
    pub fn spawn(&mut self, entry: TaskEntry, priority: u8) -> Option<u32> {
        let parent_pid = self.current_pid();

        let stack = self.heap.allocate(PROC_STACK_SIZE);
        if stack.is_null() {
            klog::warn!("[proc] spawn failed: out of memory for process stack");
            return None;
        }

        let Some(tid) = self.scheduler.create_task(entry, priority) else {
            klog::warn!("[proc] spawn failed: task table full");
            self.heap.free(stack);
            return None;
        };

        match self.processes.create(parent_pid, tid, stack, PROC_STACK_SIZE) {
            Some(pid) => {
                klog::info!("[proc] spawned pid {} (tid {}, priority {})", pid, tid, priority);
                Some(pid)
            }
            None => {
                klog::warn!("[proc] spawn failed: process table full");
                self.heap.free(stack);
                self.scheduler.kill(tid);
                None
            }
        }
    }

    /// The pid of whichever process is driving the currently running
    /// scheduler task. `Some(0)` while the bootstrap context (the REPL) is
    /// running.
    pub fn current_pid(&self) -> Option<u32> {
        let tid = self.scheduler.current();
        self.processes.pid_for_tid(tid)
    }

    /// Non-blocking poll of `pid`: if it is already a zombie, reaps it.
    /// Returns `None` if `pid` is still live or does not exist. The
    /// process's stack was already released back to the heap at `exit`
    /// time, so there is nothing left to free here.
    pub fn wait(&mut self, pid: u32) -> Option<(u32, i32)> {
        let reaped = self.processes.wait(pid)?;
        Some((reaped.pid, reaped.exit_code))
    }

    /// Marks the calling process a zombie with `exit_code`, releases its
    /// stack back to the heap immediately, and decides the switch away
    /// from it. Does not perform the switch itself — see
    /// `exit_current_process` and `task::scheduler::SwitchOp`.
    fn decide_exit_process(&mut self, exit_code: i32) -> SwitchOp {
        if let Some(pid) = self.current_pid() {
            if let Some((stack, _size)) = self.processes.exit(pid, exit_code) {
                self.heap.free(stack);
            }
        }
        self.scheduler.decide_exit()
    }

    pub fn signal_register(&mut self, pid: u32, signal: u32, handler: SignalHandler) -> bool {
        self.processes.signal_register(pid, signal, handler)
    }

    pub fn signal_send(&mut self, pid: u32, signal: u32) -> bool {
        self.processes.signal_send(pid, signal)
    }

    pub fn get_pid(&self) -> Option<u32> {
        self.current_pid()
    }

    pub fn get_parent_pid(&self, pid: u32) -> Option<i32> {
        self.processes.get_parent_pid(pid)
    }

    pub fn get_process(&self, pid: u32) -> Option<ProcessInfo> {
        self.processes.get(pid)
    }

    pub fn list_processes(&self) -> impl Iterator<Item = ProcessInfo> + '_ {
        self.processes.list()
    }

    pub fn list_tasks(&self) -> impl Iterator<Item = TaskInfo> + '_ {
        self.scheduler.list()
    }

    pub fn ticks(&self) -> u64 {
        self.scheduler.ticks()
    }
}

/// The single kernel-wide instance. Every subsystem is reached through
/// this lock — see the module docs for why there is exactly one.
static KERNEL: SpinLock<Kernel> = SpinLock::new(Kernel::new());

/// Returns the kernel singleton lock.
pub fn kernel() -> &'static SpinLock<Kernel> {
    &KERNEL
}

/// Exits the calling process with `exit_code` and switches to whatever the
/// scheduler picks next. Never returns.
///
/// Mirrors `task::scheduler::exit_task`: the decision is made with the
/// kernel lock held, then the lock is released before the register swap,
/// so a task that the switch lands on can immediately re-lock the kernel
/// (e.g. its own eventual exit) without deadlocking.
pub fn exit_current_process(exit_code: i32) -> ! {
    let op = KERNEL.lock().decide_exit_process(exit_code);
    // SAFETY: the lock above was released when the statement completed.
    unsafe { op.perform() };
    unreachable!("a zombie process's task is never switched back to")
}
