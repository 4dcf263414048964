//! # Task Control Block
//!
//! Defines the task model. A task is a never-returning function with a
//! private stack, a fixed priority and two pieces of scheduling state: the
//! tick before which it must not run, and the semaphore it is waiting on.
//!
//! TCBs live in the [`Scheduler`](crate::scheduler::Scheduler)'s fixed table
//! and are indexed by [`TaskId`]. Slot 0 is the idle task.

use core::fmt;

use crate::semaphore::SemaphoreId;

/// Kernel time, in ticks since boot.
pub type Tick = u32;

/// Task body. Must loop forever.
pub type TaskEntry = extern "C" fn() -> !;

// ---------------------------------------------------------------------------
// Identity and priority
// ---------------------------------------------------------------------------

/// Index of a task in the task table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskId(pub(crate) u8);

impl TaskId {
    /// The idle/background task. Selected when nothing else is ready.
    pub const IDLE: TaskId = TaskId(0);

    /// Build an id from a raw table index.
    pub const fn new(index: u8) -> TaskId {
        TaskId(index)
    }

    /// Table index of this task.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_idle(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{:02}", self.0)
    }
}

/// Fixed task priority. **Lower value = higher priority.**
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Priority(pub u8);

impl Priority {
    /// Most urgent priority.
    pub const HIGHEST: Priority = Priority(0);
    /// Reserved for the idle task; ranks below every application task.
    pub const IDLE: Priority = Priority(u8::MAX);

    /// Strictly more urgent than `other`.
    #[inline]
    pub const fn is_higher_than(self, other: Priority) -> bool {
        self.0 < other.0
    }
}

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Scheduling state of a task, derived from its TCB and the kernel clock.
///
/// ```text
///   ┌───────────┐ tick >= release_time ┌───────┐  select_next()  ┌─────────┐
///   │ Suspended │ ───────────────────► │ Ready │ ──────────────► │ Running │
///   └───────────┘                      └───────┘                 └─────────┘
///         ▲                                ▲                       │     │
///         │         delay_until()          │ give()         take() │     │
///         └────────────────────────────────┼───────────────────────┼─────┘
///                                     ┌─────────┐                  │
///                                     │ Blocked │ ◄────────────────┘
///                                     └─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskState {
    /// Waiting for its release time.
    Suspended,
    /// Eligible to run.
    Ready,
    /// The one task currently on the CPU.
    Running,
    /// Waiting on a semaphore.
    Blocked,
    /// Slot was never populated.
    Dormant,
}

// ---------------------------------------------------------------------------
// Task Control Block
// ---------------------------------------------------------------------------

/// Task Control Block (TCB): everything the scheduler knows about one task.
///
/// The `stack_pointer` is the only field the context switch touches. It
/// points at the lowest word of the saved context on the task's own stack.
#[derive(Debug, Clone, Copy)]
pub struct TaskControlBlock {
    /// The TCB's own table index.
    pub id: TaskId,

    /// Saved stack pointer. Written by [`crate::frame`] at creation and by
    /// the port on every context switch.
    pub stack_pointer: *mut u32,

    /// The task must not be scheduled before this tick.
    pub release_time: Tick,

    /// Fixed at creation.
    pub priority: Priority,

    /// Semaphore this task is waiting on, if any.
    pub blocked_on: Option<SemaphoreId>,

    /// Whether the slot holds a created task.
    pub active: bool,
}

// Safety: the raw stack pointer always points into the task's own
// `'static` stack and is only read or written inside critical sections.
unsafe impl Send for TaskControlBlock {}
unsafe impl Sync for TaskControlBlock {}

impl TaskControlBlock {
    /// An unpopulated slot, used to initialise the static table.
    pub const EMPTY: TaskControlBlock = TaskControlBlock {
        id: TaskId(0),
        stack_pointer: core::ptr::null_mut(),
        release_time: 0,
        priority: Priority::IDLE,
        blocked_on: None,
        active: false,
    };

    /// Populate this slot for a new task, immediately eligible to run.
    pub fn init(&mut self, id: TaskId, priority: Priority, stack_pointer: *mut u32) {
        self.id = id;
        self.stack_pointer = stack_pointer;
        self.release_time = 0;
        self.priority = priority;
        self.blocked_on = None;
        self.active = true;
    }

    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.blocked_on.is_some()
    }

    /// Blocked on this particular semaphore.
    #[inline]
    pub fn is_blocked_on(&self, sem: SemaphoreId) -> bool {
        self.blocked_on == Some(sem)
    }

    /// Released and not waiting: the scheduler may pick it at `now`.
    #[inline]
    pub fn is_ready(&self, now: Tick) -> bool {
        self.active && now >= self.release_time && !self.is_blocked()
    }

    /// Derive the state-machine position of this task.
    pub fn state(&self, now: Tick, current: Option<TaskId>) -> TaskState {
        if !self.active {
            TaskState::Dormant
        } else if self.is_blocked() {
            TaskState::Blocked
        } else if current == Some(self.id) {
            TaskState::Running
        } else if now < self.release_time {
            TaskState::Suspended
        } else {
            TaskState::Ready
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
