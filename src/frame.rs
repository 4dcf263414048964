//! # Initial Stack Frame
//!
//! A task that has never run must look exactly like one that was suspended
//! by the context switch. This module builds that saved context at the top
//! of a fresh stack.
//!
//! ## Layout (ascending addresses from the saved stack pointer)
//!
//! ```text
//!   word  0..=7   R4–R11      0            ┐ pushed by the context switch
//!   word  8       EXC_RETURN  0xFFFF_FFF9  ┘ (thread mode, main stack)
//!   word  9..=12  R0–R3       0            ┐
//!   word 13       R12         0            │ stacked by the hardware on
//!   word 14       LR          0            │ exception entry, unstacked on
//!   word 15       PC          entry        │ exception return
//!   word 16       xPSR        0x0100_0000  ┘ (Thumb bit)
//! ```
//!
//! Word 16 is the last word of the stack slice. The context switch pops
//! R4–R11 and EXC_RETURN with one `ldmia`, then returns through EXC_RETURN;
//! the hardware does the rest. Any change here must be mirrored in
//! [`crate::arch`].

use core::mem::{offset_of, size_of};

use crate::config::{FRAME_WORDS, MIN_STACK_WORDS};
use crate::error::ConfigError;
use crate::task::TaskEntry;

/// The saved context of a task that has not run yet.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitialFrame {
    /// R4, R5, … R11 in that order.
    pub r4_r11: [u32; 8],
    pub exc_return: u32,
    pub r0: u32,
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r12: u32,
    pub lr: u32,
    pub pc: u32,
    pub xpsr: u32,
}

const WORD: usize = size_of::<u32>();

const _: () = {
    assert!(size_of::<InitialFrame>() == FRAME_WORDS * WORD);
    assert!(offset_of!(InitialFrame, exc_return) == 8 * WORD);
    assert!(offset_of!(InitialFrame, r0) == 9 * WORD);
    assert!(offset_of!(InitialFrame, r12) == 13 * WORD);
    assert!(offset_of!(InitialFrame, lr) == 14 * WORD);
    assert!(offset_of!(InitialFrame, pc) == 15 * WORD);
    assert!(offset_of!(InitialFrame, xpsr) == 16 * WORD);
};

impl InitialFrame {
    /// Return to Thread mode, main stack, basic (non-FPU) frame.
    pub const EXC_RETURN_THREAD_MSP: u32 = 0xFFFF_FFF9;

    /// Only the T bit: Thumb is the only instruction set on ARMv7-M.
    pub const XPSR_THUMB: u32 = 1 << 24;

    /// Frame that resumes at `entry_address` with every register zeroed.
    pub const fn new(entry_address: u32) -> InitialFrame {
        InitialFrame {
            r4_r11: [0; 8],
            exc_return: Self::EXC_RETURN_THREAD_MSP,
            r0: 0,
            r1: 0,
            r2: 0,
            r3: 0,
            r12: 0,
            lr: 0,
            pc: entry_address,
            xpsr: Self::XPSR_THUMB,
        }
    }

    /// The frame as it appears in memory, lowest address first.
    pub fn to_words(&self) -> [u32; FRAME_WORDS] {
        let mut words = [0u32; FRAME_WORDS];
        words[..8].copy_from_slice(&self.r4_r11);
        words[8] = self.exc_return;
        words[9] = self.r0;
        words[10] = self.r1;
        words[11] = self.r2;
        words[12] = self.r3;
        words[13] = self.r12;
        words[14] = self.lr;
        words[15] = self.pc;
        words[16] = self.xpsr;
        words
    }
}

/// Address the PC should hold to start `entry`.
///
/// Function pointers on Thumb already carry bit 0; the exception return
/// ignores it when loading PC.
#[inline]
pub fn entry_address(entry: TaskEntry) -> u32 {
    entry as usize as u32
}

/// Write the initial frame for `entry` into the top of `stack`.
///
/// Returns the word index of the frame's lowest word, which becomes the
/// task's saved stack pointer.
pub fn init_stack(stack: &mut [u32], entry: TaskEntry) -> Result<usize, ConfigError> {
    if stack.len() < MIN_STACK_WORDS {
        return Err(ConfigError::StackTooSmall {
            words: stack.len(),
            required: MIN_STACK_WORDS,
        });
    }

    let base = stack.len() - FRAME_WORDS;
    stack[base..].copy_from_slice(&InitialFrame::new(entry_address(entry)).to_words());
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn spin() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    #[test]
    fn test_frame_sits_at_top_of_stack() {
        let mut stack = [0xDEAD_BEEFu32; 100];
        let base = init_stack(&mut stack, spin).unwrap();

        assert_eq!(base, 100 - FRAME_WORDS);
        // Nothing below the frame is touched
        assert!(stack[..base].iter().all(|&w| w == 0xDEAD_BEEF));
    }

    #[test]
    fn test_frame_layout_word_for_word() {
        let mut stack = [0xFFFF_FFFFu32; 64];
        let base = init_stack(&mut stack, spin).unwrap();
        let frame = &stack[base..];

        assert_eq!(&frame[0..8], &[0; 8], "R4-R11");
        assert_eq!(frame[8], 0xFFFF_FFF9, "EXC_RETURN");
        assert_eq!(&frame[9..13], &[0; 4], "R0-R3");
        assert_eq!(frame[13], 0, "R12");
        assert_eq!(frame[14], 0, "LR");
        assert_eq!(frame[15], entry_address(spin), "PC");
        assert_eq!(frame[16], 0x0100_0000, "xPSR");
    }

    #[test]
    fn test_xpsr_is_the_last_word() {
        let mut stack = [0u32; MIN_STACK_WORDS];
        init_stack(&mut stack, spin).unwrap();
        assert_eq!(stack[MIN_STACK_WORDS - 1], InitialFrame::XPSR_THUMB);
        assert_eq!(stack[MIN_STACK_WORDS - 2], entry_address(spin));
    }

    #[test]
    fn test_rejects_small_stack() {
        let mut stack = [0u32; MIN_STACK_WORDS - 1];
        assert_eq!(
            init_stack(&mut stack, spin),
            Err(ConfigError::StackTooSmall {
                words: MIN_STACK_WORDS - 1,
                required: MIN_STACK_WORDS,
            })
        );
        assert!(stack.iter().all(|&w| w == 0));
    }

    #[test]
    fn test_struct_and_words_agree() {
        let frame = InitialFrame::new(0x0800_1235);
        let words = frame.to_words();
        // Same bytes as the repr(C) struct itself
        let raw: [u32; FRAME_WORDS] = unsafe { core::mem::transmute(frame) };
        assert_eq!(words, raw);
    }
}
