//! # Binary Semaphores
//!
//! One-bit take/give primitive with **direct ownership handoff**: `give`
//! never frees a semaphore that somebody is waiting for. It unblocks the
//! most urgent waiter and leaves the semaphore taken on its behalf, so no
//! third task can grab it between the give and the waiter resuming.
//!
//! Both operations run inside the caller's critical section and only report
//! what happened; leaving the critical section and invoking the reschedule
//! hook is up to [`crate::kernel`].

use crate::config::MAX_SEMAPHORES;
use crate::error::ConfigError;
use crate::scheduler::Scheduler;
use crate::task::TaskId;

/// Identity of a semaphore: its index in the [`SemaphorePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SemaphoreId(pub(crate) u8);

impl SemaphoreId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Result of [`BinarySemaphore::take`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[must_use]
pub enum Acquire {
    /// The semaphore was free and now belongs to the caller.
    Acquired,
    /// The current task is now blocked; it must be switched out and will
    /// own the semaphore when it next runs.
    Blocked,
}

/// Result of [`BinarySemaphore::give`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[must_use]
pub enum Release {
    /// Nobody was waiting; the semaphore is free again.
    Freed,
    /// Ownership went straight to `to`, which is ready again. `preempt` is
    /// set when `to` outranks the giver and should run right away.
    HandedOff { to: TaskId, preempt: bool },
}

impl Release {
    /// Whether the giver should reschedule immediately.
    #[inline]
    pub fn preempts(self) -> bool {
        matches!(self, Release::HandedOff { preempt: true, .. })
    }
}

/// A binary semaphore.
#[derive(Debug, Clone, Copy)]
pub struct BinarySemaphore {
    /// Held, or promised to a waiter that was just unblocked.
    pub taken: bool,
    pub id: SemaphoreId,
}

impl BinarySemaphore {
    pub const fn new(id: SemaphoreId, taken: bool) -> Self {
        Self { taken, id }
    }

    /// Acquire the semaphore for the current task, or block it.
    ///
    /// # Panics
    /// If the semaphore is taken and there is no current task to block, or
    /// the current task is the idle task, which must always stay runnable.
    pub fn take(&mut self, sched: &mut Scheduler) -> Acquire {
        if !self.taken {
            self.taken = true;
            return Acquire::Acquired;
        }

        let tcb = match sched.current_tcb_mut() {
            Some(tcb) => tcb,
            None => panic!("blocking take outside of a task"),
        };
        if tcb.id.is_idle() {
            panic!("idle task cannot block on {:?}", self.id);
        }
        tcb.blocked_on = Some(self.id);
        debug!("{} blocked on {}", tcb.id, self.id);
        Acquire::Blocked
    }

    /// Release the semaphore, handing it to the most urgent waiter if any.
    ///
    /// Waiters are ranked by priority value (lowest first), ties by task id.
    pub fn give(&mut self, sched: &mut Scheduler) -> Release {
        let Some(waiter) = self.most_urgent_waiter(sched) else {
            self.taken = false;
            return Release::Freed;
        };

        // `taken` stays set: the waiter owns it now.
        let woken = sched.tcb_mut(waiter);
        woken.blocked_on = None;
        let woken_priority = woken.priority;

        let preempt = match sched.current_tcb() {
            Some(current) => woken_priority.is_higher_than(current.priority),
            None => false,
        };
        debug!("{} handed to {} (preempt: {})", self.id, waiter, preempt);
        Release::HandedOff { to: waiter, preempt }
    }

    /// Id of the task `give` would wake, without waking it.
    pub fn most_urgent_waiter(&self, sched: &Scheduler) -> Option<TaskId> {
        sched
            .tasks()
            .iter()
            .filter(|tcb| tcb.active && tcb.is_blocked_on(self.id))
            .min_by_key(|tcb| (tcb.priority, tcb.id))
            .map(|tcb| tcb.id)
    }
}

// ---------------------------------------------------------------------------
// Boot-time pool
// ---------------------------------------------------------------------------

/// Fixed pool of semaphores, handed out once at boot.
///
/// Every slot starts free and carries its own index as identity.
pub struct SemaphorePool {
    slots: [BinarySemaphore; MAX_SEMAPHORES],
    allocated: usize,
}

impl SemaphorePool {
    pub const fn new() -> Self {
        let mut slots = [BinarySemaphore::new(SemaphoreId(0), false); MAX_SEMAPHORES];
        let mut i = 0;
        while i < MAX_SEMAPHORES {
            slots[i].id = SemaphoreId(i as u8);
            i += 1;
        }
        Self {
            slots,
            allocated: 0,
        }
    }

    /// Hand out the next free slot in the given initial state.
    pub fn allocate(&mut self, taken: bool) -> Result<SemaphoreId, ConfigError> {
        let slot = self
            .slots
            .get_mut(self.allocated)
            .ok_or(ConfigError::SemaphorePoolExhausted)?;
        slot.taken = taken;
        self.allocated += 1;
        Ok(slot.id)
    }

    /// Number of semaphores handed out so far.
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn get(&self, id: SemaphoreId) -> &BinarySemaphore {
        &self.slots[id.index()]
    }

    pub fn get_mut(&mut self, id: SemaphoreId) -> &mut BinarySemaphore {
        &mut self.slots[id.index()]
    }
}

impl Default for SemaphorePool {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
