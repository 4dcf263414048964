//! # Mailboxes
//!
//! A depth-1 channel carrying one `u32`, built from two binary semaphores:
//!
//! - `space` starts free: an empty mailbox can be written.
//! - `data` starts taken: an empty mailbox has nothing to read.
//!
//! A write is `take(space)`, store, `give(data)`; a read is `take(data)`,
//! load, `give(space)`. Each half runs in its own critical section and the
//! potential blocking point sits between them, so the core exposes the
//! halves separately and [`crate::kernel`] strings them together.
//!
//! Both semaphores come out of the shared [`SemaphorePool`], so a mailbox
//! never aliases the identity of an application semaphore.

use crate::config::{MAX_MAILBOXES, MAX_SEMAPHORES};
use crate::error::ConfigError;
use crate::scheduler::Scheduler;
use crate::semaphore::{Acquire, Release, SemaphoreId, SemaphorePool};

/// Identity of a mailbox: its index in the [`MailboxPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MailboxId(pub(crate) u8);

impl MailboxId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Single-slot mailbox.
#[derive(Debug, Clone, Copy)]
pub struct Mailbox {
    /// Free while the slot is empty.
    pub space: SemaphoreId,
    /// Free while the slot holds an unread value.
    pub data: SemaphoreId,
    /// Meaningful only between a successful `data` take and the matching
    /// `space` give.
    payload: u32,
}

impl Mailbox {
    const UNUSED: Mailbox = Mailbox {
        space: SemaphoreId(0),
        data: SemaphoreId(0),
        payload: 0,
    };

    /// Build an empty mailbox, taking two semaphores from `sems`.
    pub fn create(sems: &mut SemaphorePool) -> Result<Mailbox, ConfigError> {
        if MAX_SEMAPHORES - sems.allocated() < 2 {
            return Err(ConfigError::SemaphorePoolExhausted);
        }
        Ok(Mailbox {
            space: sems.allocate(false)?,
            data: sems.allocate(true)?,
            payload: 0,
        })
    }

    /// First half of a write: claim the slot.
    pub fn reserve(&self, sems: &mut SemaphorePool, sched: &mut Scheduler) -> Acquire {
        sems.get_mut(self.space).take(sched)
    }

    /// Second half of a write: store `value` and signal a reader.
    ///
    /// The caller must own `space`.
    pub fn deposit(
        &mut self,
        value: u32,
        sems: &mut SemaphorePool,
        sched: &mut Scheduler,
    ) -> Release {
        self.payload = value;
        sems.get_mut(self.data).give(sched)
    }

    /// First half of a read: wait for a value.
    pub fn await_data(&self, sems: &mut SemaphorePool, sched: &mut Scheduler) -> Acquire {
        sems.get_mut(self.data).take(sched)
    }

    /// Second half of a read: copy the value out and free the slot.
    ///
    /// The caller must own `data`.
    pub fn withdraw(&mut self, sems: &mut SemaphorePool, sched: &mut Scheduler) -> (u32, Release) {
        let value = self.payload;
        (value, sems.get_mut(self.space).give(sched))
    }
}

/// Fixed pool of mailboxes, created at boot.
pub struct MailboxPool {
    slots: [Mailbox; MAX_MAILBOXES],
    allocated: usize,
}

impl MailboxPool {
    pub const fn new() -> Self {
        Self {
            slots: [Mailbox::UNUSED; MAX_MAILBOXES],
            allocated: 0,
        }
    }

    /// Create the next mailbox, drawing its semaphores from `sems`.
    pub fn create(&mut self, sems: &mut SemaphorePool) -> Result<MailboxId, ConfigError> {
        if self.allocated >= MAX_MAILBOXES {
            return Err(ConfigError::MailboxPoolExhausted);
        }
        let id = MailboxId(self.allocated as u8);
        self.slots[id.index()] = Mailbox::create(sems)?;
        self.allocated += 1;
        Ok(id)
    }

    pub fn get(&self, id: MailboxId) -> &Mailbox {
        &self.slots[id.index()]
    }

    pub fn get_mut(&mut self, id: MailboxId) -> &mut Mailbox {
        &mut self.slots[id.index()]
    }
}

impl Default for MailboxPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::tests::scheduler_with;
    use crate::task::{TaskId, TaskState};

    struct Fixture {
        sched: Scheduler,
        sems: SemaphorePool,
        mbox: Mailbox,
    }

    impl Fixture {
        fn new() -> Self {
            let mut sems = SemaphorePool::new();
            let mbox = Mailbox::create(&mut sems).unwrap();
            Self {
                sched: scheduler_with(&[1, 2, 3]),
                sems,
                mbox,
            }
        }

        fn as_task(&mut self, id: u8) -> &mut Self {
            self.sched.dispatch(TaskId(id));
            self
        }

        fn reserve(&mut self) -> Acquire {
            self.mbox.reserve(&mut self.sems, &mut self.sched)
        }

        fn deposit(&mut self, value: u32) -> Release {
            self.mbox.deposit(value, &mut self.sems, &mut self.sched)
        }

        fn await_data(&mut self) -> Acquire {
            self.mbox.await_data(&mut self.sems, &mut self.sched)
        }

        fn withdraw(&mut self) -> (u32, Release) {
            self.mbox.withdraw(&mut self.sems, &mut self.sched)
        }
    }

    #[test]
    fn test_new_mailbox_is_empty() {
        let f = Fixture::new();
        assert!(!f.sems.get(f.mbox.space).taken);
        assert!(f.sems.get(f.mbox.data).taken);
        assert_ne!(f.mbox.space, f.mbox.data);
    }

    #[test]
    fn test_write_then_read_returns_value() {
        let mut f = Fixture::new();
        f.as_task(1);
        assert_eq!(f.reserve(), Acquire::Acquired);
        assert_eq!(f.deposit(7), Release::Freed);

        f.as_task(2);
        assert_eq!(f.await_data(), Acquire::Acquired);
        assert_eq!(f.withdraw(), (7, Release::Freed));

        // Empty again: a second read blocks
        assert_eq!(f.await_data(), Acquire::Blocked);
        assert_eq!(f.sched.state_of(TaskId(2)), TaskState::Blocked);
    }

    #[test]
    fn test_reader_first_then_write_42() {
        let mut f = Fixture::new();

        // Reader (priority 1) finds the mailbox empty and blocks.
        f.as_task(1);
        assert_eq!(f.await_data(), Acquire::Blocked);

        // Writer (priority 3) fills it; the reader outranks the writer.
        f.as_task(3);
        assert_eq!(f.reserve(), Acquire::Acquired);
        assert_eq!(
            f.deposit(42),
            Release::HandedOff { to: TaskId(1), preempt: true }
        );
        assert_eq!(f.sched.select_next(), TaskId(1));

        // Reader resumes owning `data`.
        f.as_task(1);
        let (value, release) = f.withdraw();
        assert_eq!(value, 42);
        assert_eq!(release, Release::Freed);
        assert!(!f.sems.get(f.mbox.space).taken);
    }

    #[test]
    fn test_second_write_blocks_until_read() {
        let mut f = Fixture::new();
        f.as_task(2);
        assert_eq!(f.reserve(), Acquire::Acquired);
        let _ = f.deposit(1);

        // Slot full: the next writer waits for space.
        assert_eq!(f.reserve(), Acquire::Blocked);

        f.as_task(3);
        assert_eq!(f.await_data(), Acquire::Acquired);
        let (value, release) = f.withdraw();
        assert_eq!(value, 1);
        // Space goes straight to the blocked writer, which outranks task 3.
        assert_eq!(release, Release::HandedOff { to: TaskId(2), preempt: true });

        f.as_task(2);
        let _ = f.deposit(2);
        f.as_task(3);
        assert_eq!(f.await_data(), Acquire::Acquired);
        assert_eq!(f.withdraw().0, 2);
    }

    #[test]
    fn test_mailboxes_do_not_alias_semaphores() {
        let mut sems = SemaphorePool::new();
        let app = sems.allocate(false).unwrap();
        let mut boxes = MailboxPool::new();
        let a = boxes.create(&mut sems).unwrap();
        let b = boxes.create(&mut sems).unwrap();

        let mut ids = [
            app,
            boxes.get(a).space,
            boxes.get(a).data,
            boxes.get(b).space,
            boxes.get(b).data,
        ];
        ids.sort_by_key(|id| id.index());
        assert!(ids.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_pool_limits() {
        let mut sems = SemaphorePool::new();
        let mut boxes = MailboxPool::new();
        for _ in 0..MAX_MAILBOXES {
            boxes.create(&mut sems).unwrap();
        }
        assert_eq!(boxes.create(&mut sems).err(), Some(ConfigError::MailboxPoolExhausted));

        let mut sems = SemaphorePool::new();
        for _ in 0..MAX_SEMAPHORES - 1 {
            sems.allocate(false).unwrap();
        }
        assert_eq!(
            Mailbox::create(&mut sems).err(),
            Some(ConfigError::SemaphorePoolExhausted)
        );
        assert_eq!(sems.allocated(), MAX_SEMAPHORES - 1);
    }
}
