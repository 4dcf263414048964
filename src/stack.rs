//! Holds the [`Stack`] type and methods

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

/// Statically allocated task stack of `WORDS` 32-bit words.
///
/// Aligned on 8 bytes, as AAPCS requires at public interfaces, so the
/// hardware part of the initial frame starts on an aligned address.
#[repr(C, align(8))]
pub struct Stack<const WORDS: usize> {
    contents: UnsafeCell<[u32; WORDS]>,
    claimed: AtomicBool,
}

impl<const WORDS: usize> Stack<WORDS> {
    /// Create a new, unclaimed stack
    pub const fn new() -> Self {
        Self {
            contents: UnsafeCell::new([0u32; WORDS]),
            claimed: AtomicBool::new(false),
        }
    }

    /// Hand out the stack memory, once.
    ///
    /// Returns `None` if the stack has already been given to a task.
    pub fn claim(&'static self) -> Option<&'static mut [u32]> {
        if self.claimed.swap(true, Ordering::AcqRel) {
            return None;
        }
        // SAFETY: the flag above guarantees this is the only reference ever
        // created to `contents`.
        Some(unsafe { &mut *self.contents.get() })
    }

    /// Size in words
    pub const fn len(&self) -> usize {
        WORDS
    }
}

/// SAFETY: the contents are only reachable through [`Stack::claim`], which
/// hands out at most one reference.
unsafe impl<const WORDS: usize> Sync for Stack<WORDS> {}

impl<const WORDS: usize> Default for Stack<WORDS> {
    fn default() -> Self {
        Stack::new()
    }
}
