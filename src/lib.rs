//! # Plato RTOS
//!
//! A minimal preemptive real-time kernel for single-core ARM Cortex-M
//! microcontrollers: a fixed set of statically created tasks, fixed-priority
//! scheduling, binary semaphores with priority-ordered wakeup, and
//! single-slot mailboxes built on top of them.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                    Application Tasks                    │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │   take · give · read · write · delay_until · tick       │
//! ├──────────────┬──────────────────┬──────────────────────┤
//! │  Scheduler   │  Semaphores      │  Mailboxes           │
//! │  scheduler.rs│  semaphore.rs    │  mailbox.rs          │
//! │  select_next │  take / give     │  reserve / deposit   │
//! │  delay_until │  direct handoff  │  await / withdraw    │
//! ├──────────────┴──────────────────┴──────────────────────┤
//! │        Task Model (task.rs) · Initial Frame (frame.rs)  │
//! ├────────────────────────────────────────────────────────┤
//! │            Arch Port (arch/cortex_m4.rs)                │
//! │          PendSV · SysTick · Context Switch              │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scheduling Model
//!
//! - **Priorities**: lower number = more urgent, fixed at creation
//! - **Selection**: most urgent task that is released and not blocked;
//!   the idle task (slot 0) when there is none
//! - **Semaphores**: `give` hands ownership straight to the most urgent
//!   waiter and preempts the giver if that waiter outranks it
//! - **Periodic tasks**: `delay_until` keeps an absolute release cursor,
//!   so periods never drift
//!
//! ## Memory Model
//!
//! - **No heap**: all state is statically allocated
//! - **Fixed pools**: `MAX_TASKS` TCBs, `MAX_SEMAPHORES` semaphores,
//!   `MAX_MAILBOXES` mailboxes
//! - **Per-task stack**: a [`Stack`] handed to task creation
//! - **Critical sections**: `critical-section` for all shared state

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod arch;
pub mod config;
pub mod error;
pub mod frame;
pub mod kernel;
pub mod mailbox;
pub mod scheduler;
pub mod semaphore;
pub mod stack;
pub mod sync;
pub mod task;

pub use error::ConfigError;
pub use kernel::{Kernel, Port};
pub use mailbox::MailboxId;
pub use semaphore::SemaphoreId;
pub use stack::Stack;
pub use task::{Priority, TaskEntry, TaskId, Tick};

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use arch::cortex_m4::{start, KERNEL};
