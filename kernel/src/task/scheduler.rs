// =============================================================================
// CoopKernel — Cooperative Round-Robin Scheduler
// =============================================================================
//
// A fixed-size table of Task Control Blocks (TCBs), selected round-robin
// with priority tie-breaking. There is no preemption: a task only ever
// gives up the CPU by calling `yield_now`, `sleep`, or by returning from
// its entry function (handled by the trampoline in
// `arch::x86_64::context`, which calls `exit_task` on the task's behalf).
//
// SELECTION RULE:
//   1. Promote every BLOCKED task whose `wake_tick` has arrived to READY.
//   2. Scan the table starting just after the last-selected slot (round
//      robin order).
//   3. Among the READY tasks found, pick the one with the highest
//      priority; ties go to whichever comes first in the scan, i.e. the
//      one closest behind the previous pick.
//
// SLOT 0 / BOOTSTRAP: table slot 0 is the "null process" — the boot-time
// kernel stack the REPL runs on. It is initialized RUNNING by `init()`,
// never freed, never recycled by `create_task`, and is exactly the
// fallback `select_next` leaves in place when no other task is eligible.
//
// TASK IDS: a task's id is a monotonically increasing counter independent
// of which table slot it occupies — two different tasks created in the
// same (recycled) slot over the kernel's lifetime never share an id. This
// mirrors the reference scheduler, whose `pcbs[i].pid` counter is
// similarly detached from the array index `i`.
// =============================================================================

use crate::arch::x86_64::context::X86_64;
use crate::task::clock;
use crate::task::context::{ContextSwitch, TaskEntry};

/// Maximum number of resident table slots, including slot 0 (bootstrap).
pub const MAX_TASKS: usize = 16;

/// Size, in bytes, of each task's stack.
pub const STACK_SIZE: usize = 4096;

/// Task id reserved for the bootstrap context (table slot 0).
pub const BOOTSTRAP_TASK_ID: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Slot is free and holds no task.
    Unused,
    Ready,
    Running,
    /// Sleeping until `Tcb::wake_tick`.
    Blocked,
    /// Finished; the slot is retained only so `list()` can still report it
    /// until `create_task` recycles the slot.
    Dead,
}

#[repr(C, align(16))]
#[derive(Clone, Copy)]
struct TaskStack {
    bytes: [u8; STACK_SIZE],
}

impl TaskStack {
    const fn new() -> Self {
        Self {
            bytes: [0; STACK_SIZE],
        }
    }

    fn top(&self) -> usize {
        self.bytes.as_ptr() as usize + STACK_SIZE
    }
}

#[derive(Clone, Copy)]
struct Tcb {
    /// Monotonically increasing task id; see module docs. 0 is reserved
    /// for the slot-0 bootstrap context and never reassigned.
    tid: u32,
    state: TaskState,
    priority: u8,
    rsp: usize,
    wake_tick: u64,
    stack: TaskStack,
}

impl Tcb {
    const fn new() -> Self {
        Self {
            tid: 0,
            state: TaskState::Unused,
            priority: 0,
            rsp: 0,
            wake_tick: 0,
            stack: TaskStack::new(),
        }
    }
}

/// A point-in-time summary of one task, for the `ps` REPL command.
#[derive(Debug, Clone, Copy)]
pub struct TaskInfo {
    pub tid: u32,
    pub state: TaskState,
    pub priority: u8,
    pub wake_tick: u64,
}

pub struct Scheduler {
    tasks: [Tcb; MAX_TASKS],
    /// Table slot index of the currently running task. Slot 0 (bootstrap)
    /// is always a valid value, so this is never `None`.
    current: usize,
    /// Next task id to hand out from `create_task`.
    next_task_id: u32,
    /// Index the last selection started scanning from.
    last_ran: usize,
    initialized: bool,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            tasks: [Tcb::new(); MAX_TASKS],
            current: 0,
            next_task_id: 1,
            last_ran: MAX_TASKS - 1,
            initialized: false,
        }
    }

    /// Zeroes the table and brings slot 0 up as the running bootstrap
    /// context. Must be called once, before the first `create_task`.
    pub fn init(&mut self) {
        assert!(!self.initialized, "Scheduler::init called twice");
        self.tasks[0] = Tcb {
            tid: BOOTSTRAP_TASK_ID,
            state: TaskState::Running,
            priority: 0,
            rsp: 0,
            wake_tick: 0,
            stack: TaskStack::new(),
        };
        self.current = 0;
        self.initialized = true;
    }

    /// Creates a new task running `entry` at the given priority (higher
    /// value runs first on a tie). Returns the new task's id, or `None` if
    /// the table is full. Never recycles slot 0.
    pub fn create_task(&mut self, entry: TaskEntry, priority: u8) -> Option<u32> {
        assert!(self.initialized, "Scheduler used before init");

        let slot = (1..MAX_TASKS)
            .find(|&i| matches!(self.tasks[i].state, TaskState::Unused | TaskState::Dead))?;

        let stack_top = self.tasks[slot].stack.top();
        let rsp = X86_64::build_initial_frame(stack_top, entry);

        let tid = self.next_task_id;
        self.next_task_id += 1;

        let tcb = &mut self.tasks[slot];
        tcb.tid = tid;
        tcb.state = TaskState::Ready;
        tcb.priority = priority;
        tcb.rsp = rsp;
        tcb.wake_tick = 0;

        Some(tid)
    }

    /// Advances the tick counter and, if a different READY task is
    /// available, decides to switch to it. Returns the switch to perform,
    /// if any — see `SwitchOp` for why this is split from actually
    /// performing it.
    pub fn decide_yield(&mut self) -> Option<SwitchOp> {
        clock::tick();
        self.promote_ready();
        let next = self.select_next();
        self.prepare_switch(next)
    }

    /// Puts the current task to sleep for `ticks` scheduler ticks, then
    /// decides the next switch exactly like `decide_yield`. Sleeping the
    /// bootstrap context (slot 0) is legal — the REPL never calls this,
    /// but nothing stops a future caller from doing so.
    pub fn decide_sleep(&mut self, ticks: u64) -> Option<SwitchOp> {
        let wake_at = clock::now() + ticks;
        let current = self.current;
        self.tasks[current].state = TaskState::Blocked;
        self.tasks[current].wake_tick = wake_at;
        self.decide_yield()
    }

    /// Marks the task in slot `slot` dead without switching. Used when a
    /// task is created but the process it belongs to fails to register
    /// (process table full): the slot is abandoned rather than ever being
    /// scheduled. `slot` is the table index, as returned by looking the
    /// task id up — callers that only have the public tid should go
    /// through `kill_tid`.
    fn kill_slot(&mut self, slot: usize) {
        self.tasks[slot].state = TaskState::Dead;
    }

    /// Marks the task with id `tid` dead without switching. No-op if `tid`
    /// is not a live task.
    pub fn kill(&mut self, tid: u32) {
        if let Some(slot) = self.slot_for_tid(tid) {
            self.kill_slot(slot);
        }
    }

    /// Marks the current task dead and decides the switch away from it.
    /// Always returns a real switch, since a dead task is never selected
    /// again: either another READY task, or the bootstrap context.
    pub fn decide_exit(&mut self) -> SwitchOp {
        self.tasks[self.current].state = TaskState::Dead;
        clock::tick();
        self.promote_ready();
        let next = self.select_next();
        self.prepare_switch(next)
            .expect("exiting task must always produce a switch away from it")
    }

    /// Current scheduler tick, as advanced by `yield_now`/`sleep`.
    pub fn ticks(&self) -> u64 {
        clock::now()
    }

    /// Task id of the currently running task. `BOOTSTRAP_TASK_ID` while
    /// the boot context (REPL) is running.
    pub fn current(&self) -> u32 {
        self.tasks[self.current].tid
    }

    /// Snapshot of every live task slot, for `ps`.
    pub fn list(&self) -> impl Iterator<Item = TaskInfo> + '_ {
        self.tasks
            .iter()
            .filter(|t| !matches!(t.state, TaskState::Unused))
            .map(|t| TaskInfo {
                tid: t.tid,
                state: t.state,
                priority: t.priority,
                wake_tick: t.wake_tick,
            })
    }

    fn slot_for_tid(&self, tid: u32) -> Option<usize> {
        self.tasks
            .iter()
            .position(|t| !matches!(t.state, TaskState::Unused) && t.tid == tid)
    }

    /// Sweeps BLOCKED tasks whose wake time has arrived back to READY.
    /// Implements the promotion resolution recorded in DESIGN.md: a
    /// sleeping task must eventually become selectable again.
    fn promote_ready(&mut self) {
        let now = clock::now();
        for tcb in self.tasks.iter_mut() {
            if tcb.state == TaskState::Blocked && tcb.wake_tick <= now {
                tcb.state = TaskState::Ready;
            }
        }
    }

    /// Applies the selection rule described in the module docs.
    fn select_next(&self) -> Option<usize> {
        let mut best: Option<(usize, u8)> = None;
        for step in 1..=MAX_TASKS {
            let idx = (self.last_ran + step) % MAX_TASKS;
            if self.tasks[idx].state != TaskState::Ready {
                continue;
            }
            let priority = self.tasks[idx].priority;
            if best.is_none_or(|(_, best_priority)| priority > best_priority) {
                best = Some((idx, priority));
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Updates bookkeeping for a switch to table slot `target` and hands
    /// back the two raw stack pointers the architecture layer needs,
    /// without actually performing the switch (see `SwitchOp`).
    fn prepare_switch(&mut self, target: Option<usize>) -> Option<SwitchOp> {
        let target = match target {
            Some(idx) if idx != self.current => idx,
            _ => return None,
        };

        let old = self.current;
        if self.tasks[old].state == TaskState::Running {
            self.tasks[old].state = TaskState::Ready;
        }
        let old_rsp_slot: *mut usize = &mut self.tasks[old].rsp as *mut usize;

        self.tasks[target].state = TaskState::Running;
        let new_rsp = self.tasks[target].rsp;

        self.last_ran = target;
        self.current = target;

        Some(SwitchOp { old_rsp_slot, new_rsp })
    }
}

/// A decided-but-not-yet-performed context switch.
///
/// Every entry point (`yield_now`, `sleep`, `exit_task`) locks the kernel
/// singleton, asks the scheduler to decide what to do, then **drops the
/// lock** before calling `perform`. Actually executing the register swap
/// while still holding the lock would deadlock: the task being switched
/// to may immediately need the same lock (the trampoline calls
/// `exit_task`, which locks it again, the moment a task's entry function
/// returns).
pub struct SwitchOp {
    old_rsp_slot: *mut usize,
    new_rsp: usize,
}

// SAFETY: the pointer is only ever handed to `perform`, which the caller
// invokes on the same core that produced it, after releasing the lock
// that protected the scheduler state it points into.
unsafe impl Send for SwitchOp {}

impl SwitchOp {
    /// Performs the switch. Must be called with the kernel lock released.
    ///
    /// # Safety
    /// Must be called at most once, on the core that produced this
    /// `SwitchOp`, with the kernel singleton's lock not held.
    pub unsafe fn perform(self) {
        // SAFETY: forwarded from the caller's contract; the pointers were
        // produced by `Scheduler::prepare_switch` from live task state.
        unsafe {
            X86_64::switch(self.old_rsp_slot, self.new_rsp);
        }
    }
}

/// Voluntarily gives up the CPU for one round of scheduling.
pub fn yield_now() {
    let op = crate::state::kernel().lock().scheduler.decide_yield();
    if let Some(op) = op {
        // SAFETY: the kernel lock was released when the statement above
        // completed; see `SwitchOp`.
        unsafe { op.perform() };
    }
}

/// Sleeps the current task for `ticks` scheduler ticks.
pub fn sleep(ticks: u64) {
    let op = crate::state::kernel().lock().scheduler.decide_sleep(ticks);
    if let Some(op) = op {
        // SAFETY: see `yield_now`.
        unsafe { op.perform() };
    }
}

/// Called by the architecture trampoline when a task's entry function
/// returns, or directly by a task that wants to exit without going
/// through the process manager. Never returns.
pub fn exit_task() -> ! {
    let op = crate::state::kernel().lock().scheduler.decide_exit();
    // SAFETY: see `yield_now`.
    unsafe { op.perform() };
    unreachable!("a dead task is never switched back to")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_entry() {}

    #[test]
    fn create_task_assigns_distinct_ready_slots() {
        let mut sched = Scheduler::new();
        sched.init();
        let a = sched.create_task(dummy_entry, 0).unwrap();
        let b = sched.create_task(dummy_entry, 0).unwrap();
        assert_ne!(a, b);
        assert!(sched
            .list()
            .filter(|t| t.tid != BOOTSTRAP_TASK_ID)
            .all(|t| matches!(t.state, TaskState::Ready)));
    }

    #[test]
    fn table_full_returns_none() {
        let mut sched = Scheduler::new();
        sched.init();
        // Slot 0 is reserved for bootstrap, so MAX_TASKS - 1 real tasks fit.
        for _ in 0..(MAX_TASKS - 1) {
            assert!(sched.create_task(dummy_entry, 0).is_some());
        }
        assert!(sched.create_task(dummy_entry, 0).is_none());
    }

    #[test]
    fn higher_priority_wins_selection_tie() {
        let mut sched = Scheduler::new();
        sched.init();
        let _low = sched.create_task(dummy_entry, 1).unwrap();
        let high = sched.create_task(dummy_entry, 5).unwrap();
        let slot = sched.slot_for_tid(high).unwrap();
        assert_eq!(sched.select_next(), Some(slot));
    }

    #[test]
    fn dead_tasks_are_never_selected() {
        let mut sched = Scheduler::new();
        sched.init();
        let a = sched.create_task(dummy_entry, 0).unwrap();
        let slot = sched.slot_for_tid(a).unwrap();
        sched.tasks[slot].state = TaskState::Dead;
        assert_eq!(sched.select_next(), None);
    }

    #[test]
    fn task_ids_stay_monotonic_across_slot_reuse() {
        let mut sched = Scheduler::new();
        sched.init();
        let a = sched.create_task(dummy_entry, 0).unwrap();
        sched.kill(a);
        let b = sched.create_task(dummy_entry, 0).unwrap();
        assert!(b > a, "a recycled slot must not reuse the old task id");
    }

    #[test]
    fn bootstrap_is_fallback_when_nothing_is_ready() {
        let mut sched = Scheduler::new();
        sched.init();
        assert_eq!(sched.current(), BOOTSTRAP_TASK_ID);
        assert_eq!(sched.select_next(), None);
    }
}
