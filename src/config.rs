//! # Kernel Configuration
//!
//! Compile-time constants for the task table, the synchronization pools and
//! the tick source. Everything is sized here; nothing is allocated at runtime.

/// Number of task table slots, including the idle task in slot 0.
///
/// Application task ids are therefore `1..MAX_TASKS`.
pub const MAX_TASKS: usize = 5;

/// Number of binary semaphores in the boot-time pool. Every mailbox
/// consumes two of them.
pub const MAX_SEMAPHORES: usize = 8;

/// Number of mailboxes that can be created at boot.
pub const MAX_MAILBOXES: usize = 2;

/// SysTick frequency in Hz. One kernel tick per millisecond.
pub const TICK_HZ: u32 = 1000;

/// Core clock after reset (HFRCO default on the EFM32 Giant Gecko).
pub const SYSTEM_CLOCK_HZ: u32 = 14_000_000;

/// Default per-task stack size in 32-bit words.
pub const STACK_WORDS: usize = 100;

/// Words occupied by the initial context frame (see [`crate::frame`]).
pub const FRAME_WORDS: usize = 17;

/// Smallest stack accepted by task creation: the initial frame, a second
/// hardware frame for a nested tick interrupt, and a little working room.
pub const MIN_STACK_WORDS: usize = FRAME_WORDS + 8 + 7;
