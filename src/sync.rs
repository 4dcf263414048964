//! # Synchronization Primitives
//!
//! Interrupt-masked critical sections. Every check-and-update of kernel
//! state happens inside one of these; they are the only thing serializing
//! tasks against each other and against the tick interrupt.
//!
//! On Cortex-M the `critical-section` implementation comes from `cortex-m`
//! (`critical-section-single-core`: PRIMASK save, `cpsid i`, restore). Host
//! tests use the `std` implementation.

pub use ::critical_section::{CriticalSection, Mutex};

/// Execute a closure with interrupts masked.
///
/// The previous interrupt state is restored on exit, so nesting is fine.
/// Keep the closure short: the tick interrupt is held off until it returns.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    ::critical_section::with(f)
}
