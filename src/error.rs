//! # Configuration Errors
//!
//! The kernel has no runtime error channel. Everything that can go wrong is
//! a mistake in the static boot-time configuration, reported here by the
//! core and turned into a panic by the [`crate::kernel`] façade.

use core::fmt;

/// A boot-time configuration mistake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Task id is not below [`crate::config::MAX_TASKS`].
    TaskIdOutOfRange(usize),
    /// Slot 0 belongs to the idle task.
    TaskIdReserved,
    /// The task slot has already been populated.
    DuplicateTask(usize),
    /// The stack cannot hold the initial frame plus headroom.
    StackTooSmall { words: usize, required: usize },
    /// All semaphore slots have been handed out.
    SemaphorePoolExhausted,
    /// All mailbox slots have been handed out.
    MailboxPoolExhausted,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::TaskIdOutOfRange(id) => write!(f, "task id {} is out of range", id),
            ConfigError::TaskIdReserved => write!(f, "task id 0 is reserved for the idle task"),
            ConfigError::DuplicateTask(id) => write!(f, "task {} was already created", id),
            ConfigError::StackTooSmall { words, required } => {
                write!(f, "stack of {} words is smaller than {} words", words, required)
            }
            ConfigError::SemaphorePoolExhausted => write!(f, "semaphore pool exhausted"),
            ConfigError::MailboxPoolExhausted => write!(f, "mailbox pool exhausted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::string::ToString;

    #[test]
    fn test_display_names_the_offending_value() {
        assert_eq!(ConfigError::DuplicateTask(3).to_string(), "task 3 was already created");
        assert_eq!(
            ConfigError::StackTooSmall { words: 8, required: 32 }.to_string(),
            "stack of 8 words is smaller than 32 words"
        );
    }
}
