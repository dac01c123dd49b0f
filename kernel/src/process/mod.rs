// =============================================================================
// CoopKernel — Process Manager
// =============================================================================
//
// A fixed-size process table tracking parent/child relationships, exit
// status and registered signal handlers. This is metadata layered over a
// scheduler task (`task::scheduler::Tcb`), not a second execution engine —
// see the process/task duality design note: a process is "a task plus
// bookkeeping", not a competing abstraction.
//
// SIGNAL DISPATCH is synchronous: `signal_send` looks up the target's
// handler and calls it immediately, in the sender's own context. There is
// no signal queue and no deferred delivery (see Non-goals).
//
// REAPING: `wait(pid)` is non-blocking. It checks once whether `pid` is
// already a ZOMBIE; if so it reaps it and returns its exit code. If `pid`
// is still live or unknown, it returns `None` immediately rather than
// blocking the caller or scanning the caller's children.
//
// EXIT releases the exited process's stack back to the heap immediately,
// at `exit` time, not when it is later reaped by `wait` — a ZOMBIE
// descriptor never holds a live stack.
// =============================================================================

/// Maximum number of simultaneously tracked processes.
pub const MAX_PROCESSES: usize = 32;

/// Maximum number of direct children a single process can have.
pub const MAX_CHILDREN: usize = 8;

/// Maximum number of distinct signal numbers with a registered handler,
/// per process.
pub const MAX_SIGNALS: usize = 16;

/// Size, in bytes, of the heap-allocated stack reserved for each process.
pub const PROC_STACK_SIZE: usize = 2048;

/// A signal handler: invoked synchronously with the signal number.
pub type SignalHandler = fn(signal: u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Unused,
    /// Registered but not yet scheduled to run for the first time.
    Created,
    Running,
    /// Reserved for a blocked process; the scheduler tracks sleep/block
    /// state on the task side (`task::scheduler::TaskState::Blocked`), so
    /// nothing currently drives a process into this state directly.
    Blocked,
    Zombie,
}

#[derive(Clone, Copy)]
struct ProcessDescriptor {
    pid: u32,
    /// -1 when the process has no parent (the bootstrap process).
    parent_pid: i32,
    /// Links this descriptor to its scheduler task.
    tid: u32,
    state: ProcessState,
    exit_code: i32,
    /// -1 marks an empty child slot.
    children: [i32; MAX_CHILDREN],
    child_count: usize,
    handlers: [Option<SignalHandler>; MAX_SIGNALS],
    stack: *mut u8,
    stack_size: usize,
    /// Accounting counter shown by `plist`'s CPU column. Carried from the
    /// reference process table; nothing in this design (or the reference
    /// it is grounded on) currently advances it — see DESIGN.md.
    cpu_ticks: u64,
}

impl ProcessDescriptor {
    const fn unused() -> Self {
        Self {
            pid: 0,
            parent_pid: -1,
            tid: 0,
            state: ProcessState::Unused,
            exit_code: 0,
            children: [-1; MAX_CHILDREN],
            child_count: 0,
            handlers: [None; MAX_SIGNALS],
            stack: core::ptr::null_mut(),
            stack_size: 0,
            cpu_ticks: 0,
        }
    }
}

/// Snapshot of one process, for the `ps`/`plist` REPL commands and for
/// `get`.
#[derive(Debug, Clone, Copy)]
pub struct ProcessInfo {
    pub pid: u32,
    pub parent_pid: i32,
    pub state: ProcessState,
    pub exit_code: i32,
    pub child_count: usize,
    pub cpu_ticks: u64,
}

/// A process reaped by `wait`. Its stack was already released back to the
/// heap at `exit` time — a ZOMBIE descriptor never holds a live stack —
/// so there is nothing left for the caller to free here.
pub struct ReapedChild {
    pub pid: u32,
    pub exit_code: i32,
}

pub struct ProcessManager {
    table: [ProcessDescriptor; MAX_PROCESSES],
    next_pid: u32,
    initialized: bool,
}

// SAFETY: the raw `stack` pointers are owned exclusively by the table and
// only ever touched behind the caller's own lock (`kernel::state::Kernel`).
unsafe impl Send for ProcessManager {}

impl ProcessManager {
    pub const fn new() -> Self {
        Self {
            table: [ProcessDescriptor::unused(); MAX_PROCESSES],
            next_pid: 1,
            initialized: false,
        }
    }

    /// Registers the bootstrap process (pid 0, no parent, driving scheduler
    /// task 0) in slot 0, then marks the manager ready for `create`.
    pub fn init(&mut self) {
        assert!(!self.initialized, "ProcessManager::init called twice");
        self.table[0] = ProcessDescriptor {
            pid: 0,
            parent_pid: -1,
            tid: crate::task::scheduler::BOOTSTRAP_TASK_ID,
            state: ProcessState::Running,
            exit_code: 0,
            children: [-1; MAX_CHILDREN],
            child_count: 0,
            handlers: [None; MAX_SIGNALS],
            stack: core::ptr::null_mut(),
            stack_size: 0,
            cpu_ticks: 0,
        };
        self.initialized = true;
    }

    fn slot_for_pid(&self, pid: u32) -> Option<usize> {
        self.table
            .iter()
            .position(|p| p.state != ProcessState::Unused && p.pid == pid)
    }

    /// Registers bookkeeping for a process whose scheduler task (`tid`)
    /// and heap stack have already been created by the caller. Returns
    /// the new pid, or `None` if the table is full.
    pub fn create(
        &mut self,
        parent_pid: Option<u32>,
        tid: u32,
        stack: *mut u8,
        stack_size: usize,
    ) -> Option<u32> {
        assert!(self.initialized, "ProcessManager used before init");

        let slot = self
            .table
            .iter()
            .position(|p| p.state == ProcessState::Unused)?;

        let pid = self.next_pid;
        self.next_pid += 1;

        self.table[slot] = ProcessDescriptor {
            pid,
            parent_pid: parent_pid.map(|p| p as i32).unwrap_or(-1),
            tid,
            state: ProcessState::Created,
            exit_code: 0,
            children: [-1; MAX_CHILDREN],
            child_count: 0,
            handlers: [None; MAX_SIGNALS],
            stack,
            stack_size,
            cpu_ticks: 0,
        };

        if let Some(parent) = parent_pid {
            if let Some(pslot) = self.slot_for_pid(parent) {
                let parent_desc = &mut self.table[pslot];
                if parent_desc.child_count < MAX_CHILDREN {
                    parent_desc.children[parent_desc.child_count] = pid as i32;
                    parent_desc.child_count += 1;
                } else {
                    klog::warn!(
                        "[proc] pid {} already has {} children, not tracking child {}",
                        parent,
                        MAX_CHILDREN,
                        pid
                    );
                }
            }
        }

        Some(pid)
    }

    /// Marks `pid` a zombie with the given exit code and releases its
    /// stack back to the heap immediately — a ZOMBIE descriptor never
    /// holds a live stack (see Data Model invariants). Returns the
    /// released stack and its size for the caller (`Kernel::decide_exit_process`)
    /// to actually free through the allocator, or `None` if `pid` had no
    /// stack to release (the bootstrap process) or does not exist.
    pub fn exit(&mut self, pid: u32, exit_code: i32) -> Option<(*mut u8, usize)> {
        let slot = self.slot_for_pid(pid)?;
        self.table[slot].state = ProcessState::Zombie;
        self.table[slot].exit_code = exit_code;
        let stack = self.table[slot].stack;
        let stack_size = self.table[slot].stack_size;
        self.table[slot].stack = core::ptr::null_mut();
        self.table[slot].stack_size = 0;
        klog::info!("[proc] pid {} exited with code {}", pid, exit_code);

        if stack.is_null() {
            None
        } else {
            Some((stack, stack_size))
        }
    }

    /// Non-blocking poll of a specific process: if `pid` is already a
    /// zombie, reclaims its slot and returns its exit status. Returns
    /// `None` if `pid` is still live or does not exist — this does not
    /// suspend the caller (see module docs).
    pub fn wait(&mut self, pid: u32) -> Option<ReapedChild> {
        let slot = self.slot_for_pid(pid)?;
        if self.table[slot].state != ProcessState::Zombie {
            return None;
        }

        let reaped = ReapedChild {
            pid: self.table[slot].pid,
            exit_code: self.table[slot].exit_code,
        };

        let parent_pid = self.table[slot].parent_pid;
        self.table[slot] = ProcessDescriptor::unused();

        if parent_pid >= 0 {
            if let Some(pslot) = self.slot_for_pid(parent_pid as u32) {
                let parent = &mut self.table[pslot];
                if let Some(i) = parent.children[..parent.child_count]
                    .iter()
                    .position(|&c| c == pid as i32)
                {
                    parent.children[i] = -1;
                }
            }
        }

        Some(reaped)
    }

    /// Registers `handler` to run when `signal` is sent to `pid`.
    pub fn signal_register(&mut self, pid: u32, signal: u32, handler: SignalHandler) -> bool {
        if signal as usize >= MAX_SIGNALS {
            return false;
        }
        match self.slot_for_pid(pid) {
            Some(slot) => {
                self.table[slot].handlers[signal as usize] = Some(handler);
                true
            }
            None => false,
        }
    }

    /// Synchronously invokes `pid`'s registered handler for `signal`, if
    /// any. Returns `false` if the process or the handler does not exist.
    pub fn signal_send(&mut self, pid: u32, signal: u32) -> bool {
        if signal as usize >= MAX_SIGNALS {
            return false;
        }
        let Some(slot) = self.slot_for_pid(pid) else {
            return false;
        };
        match self.table[slot].handlers[signal as usize] {
            Some(handler) => {
                handler(signal);
                true
            }
            None => {
                klog::warn!("[proc] pid {} has no handler for signal {}", pid, signal);
                false
            }
        }
    }

    /// The pid of the process driving scheduler task `tid`, if any.
    pub fn pid_for_tid(&self, tid: u32) -> Option<u32> {
        self.table
            .iter()
            .find(|p| p.state != ProcessState::Unused && p.tid == tid)
            .map(|p| p.pid)
    }

    pub fn get_parent_pid(&self, pid: u32) -> Option<i32> {
        self.slot_for_pid(pid).map(|slot| self.table[slot].parent_pid)
    }

    pub fn get(&self, pid: u32) -> Option<ProcessInfo> {
        self.slot_for_pid(pid).map(|slot| {
            let p = &self.table[slot];
            ProcessInfo {
                pid: p.pid,
                parent_pid: p.parent_pid,
                state: p.state,
                exit_code: p.exit_code,
                child_count: p.child_count,
                cpu_ticks: p.cpu_ticks,
            }
        })
    }

    pub fn list(&self) -> impl Iterator<Item = ProcessInfo> + '_ {
        self.table
            .iter()
            .filter(|p| p.state != ProcessState::Unused)
            .map(|p| ProcessInfo {
                pid: p.pid,
                parent_pid: p.parent_pid,
                state: p.state,
                exit_code: p.exit_code,
                child_count: p.child_count,
                cpu_ticks: p.cpu_ticks,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::ptr;

    fn dummy_signal(_sig: u32) {}

    #[test]
    fn init_registers_bootstrap_as_pid_zero() {
        let mut pm = ProcessManager::new();
        pm.init();
        let boot = pm.get(0).expect("bootstrap process must exist after init");
        assert_eq!(boot.parent_pid, -1);
        assert_eq!(boot.state, ProcessState::Running);
        assert_eq!(pm.pid_for_tid(crate::task::scheduler::BOOTSTRAP_TASK_ID), Some(0));
    }

    #[test]
    fn create_assigns_increasing_pids() {
        let mut pm = ProcessManager::new();
        pm.init();
        let a = pm.create(None, 0, ptr::null_mut(), 0).unwrap();
        let b = pm.create(None, 1, ptr::null_mut(), 0).unwrap();
        assert!(b > a);
    }

    #[test]
    fn child_is_tracked_under_parent() {
        let mut pm = ProcessManager::new();
        pm.init();
        let parent = pm.create(None, 0, ptr::null_mut(), 0).unwrap();
        let child = pm.create(Some(parent), 1, ptr::null_mut(), 0).unwrap();
        let info = pm.get(parent).unwrap();
        assert_eq!(info.child_count, 1);
        assert_eq!(pm.get_parent_pid(child), Some(parent as i32));
    }

    #[test]
    fn wait_is_non_blocking_until_child_exits() {
        let mut pm = ProcessManager::new();
        pm.init();
        let parent = pm.create(None, 0, ptr::null_mut(), 0).unwrap();
        let child = pm.create(Some(parent), 1, ptr::null_mut(), 0).unwrap();

        assert!(pm.wait(child).is_none(), "wait must not block on a live process");

        pm.exit(child, 7);
        let reaped = pm.wait(child).expect("zombie child should now be reaped");
        assert_eq!(reaped.pid, child);
        assert_eq!(reaped.exit_code, 7);

        assert!(pm.get(child).is_none(), "reaped child must be removed from the table");
        assert_eq!(pm.get(parent).unwrap().child_count, 1, "slot count is not decremented, only the entry cleared");
        assert!(pm.wait(child).is_none(), "a second wait on the same pid must fail");
    }

    #[test]
    fn exit_releases_the_stack_immediately() {
        let mut pm = ProcessManager::new();
        pm.init();
        let mut fake_stack = [0u8; 8];
        let pid = pm.create(None, 0, fake_stack.as_mut_ptr(), fake_stack.len()).unwrap();

        let released = pm.exit(pid, 1).expect("a process created with a stack must release it on exit");
        assert_eq!(released, (fake_stack.as_mut_ptr(), fake_stack.len()));

        let info = pm.get(pid).unwrap();
        assert_eq!(info.state, ProcessState::Zombie);

        let reaped = pm.wait(pid).expect("zombie process should be reaped");
        assert_eq!(reaped.exit_code, 1);
    }

    #[test]
    fn signal_send_without_handler_returns_false() {
        let mut pm = ProcessManager::new();
        pm.init();
        let pid = pm.create(None, 0, ptr::null_mut(), 0).unwrap();
        assert!(!pm.signal_send(pid, 1));
    }

    #[test]
    fn signal_send_invokes_registered_handler() {
        let mut pm = ProcessManager::new();
        pm.init();
        let pid = pm.create(None, 0, ptr::null_mut(), 0).unwrap();
        assert!(pm.signal_register(pid, 2, dummy_signal));
        assert!(pm.signal_send(pid, 2));
    }
}
