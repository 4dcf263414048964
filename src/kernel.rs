//! # Kernel
//!
//! The public API task bodies call. A [`Kernel`] owns all kernel state
//! behind a single critical-section mutex and pairs it with a [`Port`], the
//! collaborator that actually switches CPU contexts.
//!
//! Every operation follows the same shape: do the check-and-update inside a
//! critical section, get back an outcome from the core, leave the critical
//! section, and call [`Port::reschedule`] only if the running task has to
//! stop. The hook is never invoked with interrupts masked.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► KERNEL.create_semaphore() / create_mailbox()   ← pools
//!         ├─► KERNEL.create_task()  (×N)                     ← frames
//!         └─► arch::cortex_m4::start()                       ← no return
//!               ├─► install idle task in slot 0
//!               ├─► set PendSV / SysTick priorities
//!               ├─► configure SysTick
//!               └─► pend PendSV → first context switch
//! ```
//!
//! Boot-time configuration mistakes panic immediately rather than leaving
//! a half-built task table behind.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::ConfigError;
use crate::mailbox::{MailboxId, MailboxPool};
use crate::scheduler::Scheduler;
use crate::semaphore::{Acquire, SemaphoreId, SemaphorePool};
use crate::sync::{self, Mutex};
use crate::task::{Priority, TaskEntry, TaskId, TaskState, Tick};

/// The context-switch collaborator.
pub trait Port {
    /// The running task must stop (or may be preempted).
    ///
    /// The port must eventually call [`Kernel::switch_context`], save the
    /// outgoing task's registers to the stack pointer it passes in, and
    /// restore the incoming task from the one it gets back. From the
    /// caller's point of view this returns when the calling task runs again.
    fn reschedule(&self);
}

/// Everything the kernel mutates, guarded as one unit.
pub struct KernelState {
    pub scheduler: Scheduler,
    pub semaphores: SemaphorePool,
    pub mailboxes: MailboxPool,
}

impl KernelState {
    pub const fn new() -> Self {
        Self {
            scheduler: Scheduler::new(),
            semaphores: SemaphorePool::new(),
            mailboxes: MailboxPool::new(),
        }
    }
}

impl Default for KernelState {
    fn default() -> Self {
        Self::new()
    }
}

/// Kernel instance: state plus the port that switches contexts.
pub struct Kernel<P: Port> {
    state: Mutex<RefCell<KernelState>>,
    idle_count: AtomicU32,
    port: P,
}

impl<P: Port> Kernel<P> {
    pub const fn new(port: P) -> Self {
        Self {
            state: Mutex::new(RefCell::new(KernelState::new())),
            idle_count: AtomicU32::new(0),
            port,
        }
    }

    /// Run `f` on the kernel state with interrupts masked.
    fn with<R>(&self, f: impl FnOnce(&mut KernelState) -> R) -> R {
        sync::critical_section(|cs| f(&mut self.state.borrow_ref_mut(cs)))
    }

    /// Read-only view of the kernel state, for diagnostics and tests.
    pub fn inspect<R>(&self, f: impl FnOnce(&KernelState) -> R) -> R {
        sync::critical_section(|cs| f(&self.state.borrow_ref(cs)))
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    // -----------------------------------------------------------------------
    // Boot-time configuration
    // -----------------------------------------------------------------------

    /// Allocate a binary semaphore from the pool.
    ///
    /// # Panics
    /// If the pool is exhausted.
    pub fn create_semaphore(&self, taken: bool) -> SemaphoreId {
        let id = fail_fast(self.with(|k| k.semaphores.allocate(taken)));
        info!("created {} (taken: {})", id, taken);
        id
    }

    /// Create an empty mailbox.
    ///
    /// # Panics
    /// If either pool is exhausted.
    pub fn create_mailbox(&self) -> MailboxId {
        let id = fail_fast(self.with(|k| {
            let KernelState { semaphores, mailboxes, .. } = k;
            mailboxes.create(semaphores)
        }));
        info!("created {}", id);
        id
    }

    /// Create task `id`, ready to run from tick 0.
    ///
    /// # Panics
    /// If `id` is out of range, reserved or already used, or if `stack`
    /// cannot hold the initial frame.
    pub fn create_task(
        &self,
        id: TaskId,
        entry: TaskEntry,
        stack: &'static mut [u32],
        priority: Priority,
    ) {
        fail_fast(self.with(|k| k.scheduler.create_task(id, entry, stack, priority)));
        info!("created {} at priority {}", id, priority);
    }

    /// Put the background task in slot 0.
    ///
    /// # Panics
    /// If called twice or `stack` is too small.
    pub fn install_idle(&self, entry: TaskEntry, stack: &'static mut [u32]) {
        fail_fast(self.with(|k| k.scheduler.install_idle(entry, stack)));
    }

    // -----------------------------------------------------------------------
    // Task-side operations
    // -----------------------------------------------------------------------

    /// Acquire `sem`, blocking the calling task until it is handed over.
    pub fn take(&self, sem: SemaphoreId) {
        let outcome = self.with(|k| k.semaphores.get_mut(sem).take(&mut k.scheduler));
        if outcome == Acquire::Blocked {
            self.port.reschedule();
        }
    }

    /// Release `sem`, handing it to the most urgent waiter if there is one.
    ///
    /// Switches away immediately if that waiter outranks the caller.
    pub fn give(&self, sem: SemaphoreId) {
        let release = self.with(|k| k.semaphores.get_mut(sem).give(&mut k.scheduler));
        if release.preempts() {
            self.port.reschedule();
        }
    }

    /// Put `value` in the mailbox, waiting for the slot to be empty.
    pub fn write(&self, mbox: MailboxId, value: u32) {
        let outcome = self.with(|k| {
            let KernelState { scheduler, semaphores, mailboxes } = k;
            mailboxes.get(mbox).reserve(semaphores, scheduler)
        });
        if outcome == Acquire::Blocked {
            self.port.reschedule();
        }

        let release = self.with(|k| {
            let KernelState { scheduler, semaphores, mailboxes } = k;
            mailboxes.get_mut(mbox).deposit(value, semaphores, scheduler)
        });
        if release.preempts() {
            self.port.reschedule();
        }
    }

    /// Take the value out of the mailbox, waiting for one to arrive.
    pub fn read(&self, mbox: MailboxId) -> u32 {
        let outcome = self.with(|k| {
            let KernelState { scheduler, semaphores, mailboxes } = k;
            mailboxes.get(mbox).await_data(semaphores, scheduler)
        });
        if outcome == Acquire::Blocked {
            self.port.reschedule();
        }

        let (value, release) = self.with(|k| {
            let KernelState { scheduler, semaphores, mailboxes } = k;
            mailboxes.get_mut(mbox).withdraw(semaphores, scheduler)
        });
        if release.preempts() {
            self.port.reschedule();
        }
        value
    }

    /// Sleep until `*next_release`, then advance it by `period`.
    ///
    /// Keep `next_release` in the task across iterations for a drift-free
    /// period.
    pub fn delay_until(&self, next_release: &mut Tick, period: Tick) {
        self.with(|k| k.scheduler.delay_until(next_release, period));
        self.port.reschedule();
    }

    // -----------------------------------------------------------------------
    // Port-side operations
    // -----------------------------------------------------------------------

    /// Tick source entry point: advance the clock by one and request a
    /// switch if a different task should now be running.
    pub fn tick(&self) {
        let switch = self.with(|k| {
            k.scheduler.advance_tick();
            k.scheduler.needs_switch()
        });
        if switch {
            self.port.reschedule();
        }
    }

    /// Context-switch entry point. Store `outgoing_sp` for the running task
    /// (ignored before the first switch) and return the stack pointer of
    /// the task to resume.
    pub fn switch_context(&self, outgoing_sp: *mut u32) -> *mut u32 {
        self.with(|k| k.scheduler.switch_context(outgoing_sp))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Current tick count.
    pub fn now(&self) -> Tick {
        self.inspect(|k| k.scheduler.now())
    }

    /// The running task.
    pub fn current(&self) -> Option<TaskId> {
        self.inspect(|k| k.scheduler.current())
    }

    pub fn state_of(&self, id: TaskId) -> TaskState {
        self.inspect(|k| k.scheduler.state_of(id))
    }

    /// Count one pass of the idle loop.
    #[inline]
    pub fn record_idle(&self) {
        self.idle_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Idle loop passes so far: a rough measure of spare CPU.
    pub fn idle_count(&self) -> u32 {
        self.idle_count.load(Ordering::Relaxed)
    }
}

fn fail_fast<T>(result: Result<T, ConfigError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("kernel configuration error: {}", err),
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
