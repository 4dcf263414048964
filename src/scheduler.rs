//! # Scheduler
//!
//! Owns the task table, the kernel clock and the record of which task is
//! running. Selection is a pure fixed-priority rule:
//!
//! 1. Consider every created application task whose release time has come
//!    (`tick >= release_time`) and which is not blocked on a semaphore.
//! 2. Pick the numerically lowest `priority`; break ties by lowest id.
//! 3. If nothing qualifies, pick the idle task in slot 0.
//!
//! Everything here runs inside a critical section owned by the caller.
//! [`Scheduler::select_next`] never mutates and is safe to call from the
//! tick interrupt; [`Scheduler::switch_context`] is the one entry point the
//! port's context switch uses.

use crate::config::MAX_TASKS;
use crate::error::ConfigError;
use crate::frame;
use crate::task::{Priority, TaskControlBlock, TaskEntry, TaskId, TaskState, Tick};

// ---------------------------------------------------------------------------
// Scheduler struct
// ---------------------------------------------------------------------------

/// The task table plus dispatcher state.
///
/// ## Design Notes
///
/// - All TCBs are stored inline in a fixed-size array (no heap)
/// - `current` is the single designation of the running task; `None` until
///   the first context switch
/// - Slot 0 is the idle task and only runs when nothing else can
pub struct Scheduler {
    /// Fixed-size array of TCBs. Index 0 is reserved for the idle task.
    tasks: [TaskControlBlock; MAX_TASKS],

    /// The task that owns the CPU.
    current: Option<TaskId>,

    /// Monotonic tick counter, advanced by the tick source.
    tick: Tick,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            tasks: [TaskControlBlock::EMPTY; MAX_TASKS],
            current: None,
            tick: 0,
        }
    }

    /// Populate slot `id` with a new task, eligible to run immediately.
    ///
    /// The initial context frame is written into the top of `stack`.
    /// Nothing is modified if an error is returned.
    pub fn create_task(
        &mut self,
        id: TaskId,
        entry: TaskEntry,
        stack: &'static mut [u32],
        priority: Priority,
    ) -> Result<(), ConfigError> {
        if id.index() >= MAX_TASKS {
            return Err(ConfigError::TaskIdOutOfRange(id.index()));
        }
        if id.is_idle() {
            return Err(ConfigError::TaskIdReserved);
        }
        self.populate(id, entry, stack, priority)
    }

    /// Install the idle task in slot 0 at the lowest priority.
    pub fn install_idle(
        &mut self,
        entry: TaskEntry,
        stack: &'static mut [u32],
    ) -> Result<(), ConfigError> {
        self.populate(TaskId::IDLE, entry, stack, Priority::IDLE)
    }

    fn populate(
        &mut self,
        id: TaskId,
        entry: TaskEntry,
        stack: &'static mut [u32],
        priority: Priority,
    ) -> Result<(), ConfigError> {
        if self.tasks[id.index()].active {
            return Err(ConfigError::DuplicateTask(id.index()));
        }
        let base = frame::init_stack(stack, entry)?;
        let stack_pointer = stack[base..].as_mut_ptr();
        self.tasks[id.index()].init(id, priority, stack_pointer);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Selection and dispatch
    // -----------------------------------------------------------------------

    /// The task that should run at the current tick.
    pub fn select_next(&self) -> TaskId {
        let next = self.tasks[1..]
            .iter()
            .filter(|tcb| tcb.is_ready(self.tick))
            .min_by_key(|tcb| (tcb.priority, tcb.id))
            .map_or(TaskId::IDLE, |tcb| tcb.id);
        trace!("selected {} at tick {}", next, self.tick);
        next
    }

    /// Record that `next` now owns the CPU.
    pub fn dispatch(&mut self, next: TaskId) {
        self.current = Some(next);
    }

    /// Context switch bookkeeping.
    ///
    /// Stores the outgoing task's stack pointer (if a task was running),
    /// selects and dispatches the next task, and returns the stack pointer
    /// to resume it from.
    pub fn switch_context(&mut self, outgoing_sp: *mut u32) -> *mut u32 {
        if let Some(tcb) = self.current_tcb_mut() {
            tcb.stack_pointer = outgoing_sp;
        }
        let next = self.select_next();
        self.dispatch(next);
        self.tasks[next.index()].stack_pointer
    }

    /// Whether a switch would run a different task than the current one.
    pub fn needs_switch(&self) -> bool {
        self.current != Some(self.select_next())
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Current tick count.
    #[inline]
    pub fn now(&self) -> Tick {
        self.tick
    }

    /// Advance the clock by one tick. Called by the tick source only.
    pub fn advance_tick(&mut self) -> Tick {
        self.tick = self.tick.wrapping_add(1);
        self.tick
    }

    /// Suspend the current task until the tick stored in `next_release`,
    /// then move `next_release` one `period` further.
    ///
    /// The cursor advances by exactly `period` per call, however late the
    /// task actually woke, so the cadence never drifts. The caller must
    /// reschedule afterwards.
    ///
    /// # Panics
    /// If no task is running, or the running task is the idle task.
    pub fn delay_until(&mut self, next_release: &mut Tick, period: Tick) {
        let tcb = match self.current_tcb_mut() {
            Some(tcb) => tcb,
            None => panic!("delay_until outside of a task"),
        };
        if tcb.id.is_idle() {
            panic!("idle task cannot delay");
        }
        tcb.release_time = *next_release;
        *next_release = next_release.wrapping_add(period);
    }

    // -----------------------------------------------------------------------
    // Table access
    // -----------------------------------------------------------------------

    /// The running task, if the kernel has started.
    #[inline]
    pub fn current(&self) -> Option<TaskId> {
        self.current
    }

    pub fn current_tcb(&self) -> Option<&TaskControlBlock> {
        self.current.map(|id| &self.tasks[id.index()])
    }

    pub fn current_tcb_mut(&mut self) -> Option<&mut TaskControlBlock> {
        match self.current {
            Some(id) => Some(&mut self.tasks[id.index()]),
            None => None,
        }
    }

    pub fn tcb(&self, id: TaskId) -> &TaskControlBlock {
        &self.tasks[id.index()]
    }

    pub fn tcb_mut(&mut self, id: TaskId) -> &mut TaskControlBlock {
        &mut self.tasks[id.index()]
    }

    /// The whole task table, idle slot included.
    pub fn tasks(&self) -> &[TaskControlBlock] {
        &self.tasks
    }

    /// Where `id` sits in the task state machine right now. Ids past the
    /// end of the table are reported as dormant.
    pub fn state_of(&self, id: TaskId) -> TaskState {
        self.tasks
            .get(id.index())
            .map_or(TaskState::Dormant, |tcb| tcb.state(self.tick, self.current))
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
