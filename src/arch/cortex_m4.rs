//! # Cortex-M4 Port Layer
//!
//! Implements the kernel's reschedule hook with PendSV and its tick source
//! with SysTick, and performs the actual register swap.
//!
//! ## Context Switch Mechanism
//!
//! Tasks run in Thread mode on the **main** stack: each task's MSP points
//! into its own static stack. On exception entry the hardware stacks R0–R3,
//! R12, LR, PC and xPSR onto that stack. PendSV then pushes R4–R11 and the
//! EXC_RETURN value below them, which yields exactly the 17-word layout of
//! [`crate::frame`]. A task that has never run therefore resumes the same
//! way as one that was switched out.
//!
//! ## Interrupt Priorities
//!
//! - SysTick: Priority 0xFF (lowest)
//! - PendSV: Priority 0xFF (lowest), tail-chains after SysTick and never
//!   preempts another handler mid-flight

use core::arch::naked_asm;

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};

use crate::config::{STACK_WORDS, SYSTEM_CLOCK_HZ, TICK_HZ};
use crate::kernel::{Kernel, Port};
use crate::stack::Stack;

/// PendSV-based port for ARMv7-M.
pub struct CortexM4;

impl Port for CortexM4 {
    fn reschedule(&self) {
        SCB::set_pendsv();
        // Make sure the exception is taken before the caller carries on.
        cortex_m::asm::dsb();
        cortex_m::asm::isb();
    }
}

/// The one kernel instance on this target.
pub static KERNEL: Kernel<CortexM4> = Kernel::new(CortexM4);

static IDLE_STACK: Stack<STACK_WORDS> = Stack::new();

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// SysTick reload value for one kernel tick.
const SYSTICK_RELOAD: u32 = SYSTEM_CLOCK_HZ / TICK_HZ - 1;

// SysTick's reload register is 24 bits wide.
const _: () = assert!(SYSTICK_RELOAD > 0 && SYSTICK_RELOAD <= 0x00FF_FFFF);

/// Start the kernel tick: one SysTick exception per `1 / TICK_HZ` seconds,
/// each of which lands in [`Kernel::tick`].
pub fn configure_systick(syst: &mut SYST) {
    syst.disable_counter();
    syst.set_clock_source(SystClkSource::Core);
    syst.set_reload(SYSTICK_RELOAD);
    syst.clear_current();
    syst.enable_interrupt();
    syst.enable_counter();
}

/// Set PendSV and SysTick to the lowest interrupt priority.
pub fn set_interrupt_priorities(scb: &mut SCB) {
    // SAFETY: lowering these priorities cannot break a priority-based
    // critical section; the kernel masks with PRIMASK.
    unsafe {
        scb.set_priority(SystemHandler::PendSV, 0xFF);
        scb.set_priority(SystemHandler::SysTick, 0xFF);
    }
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

/// Start the kernel. **Does not return.**
///
/// Installs the idle task, configures the interrupts and pends the first
/// context switch. The `main` stack frame is abandoned once PendSV runs.
///
/// # Panics
/// If called twice.
pub fn start(mut cp: cortex_m::Peripherals) -> ! {
    let Some(idle_stack) = IDLE_STACK.claim() else {
        panic!("kernel already started");
    };
    KERNEL.install_idle(idle, idle_stack);

    set_interrupt_priorities(&mut cp.SCB);
    configure_systick(&mut cp.SYST);

    info!("starting scheduler");
    KERNEL.port().reschedule();

    // PendSV has switched to the first task; nothing resumes `main`.
    loop {
        cortex_m::asm::wfi();
    }
}

/// Background task: runs whenever nothing else is ready.
extern "C" fn idle() -> ! {
    loop {
        KERNEL.record_idle();
    }
}

// ---------------------------------------------------------------------------
// Exception handlers
// ---------------------------------------------------------------------------

/// SysTick exception handler, the kernel tick source.
#[no_mangle]
pub extern "C" fn SysTick() {
    KERNEL.tick();
}

/// Save the outgoing stack pointer and pick the next one. Called from
/// PendSV with the address of the freshly pushed R4–R11/EXC_RETURN block.
extern "C" fn pendsv_switch(outgoing_sp: *mut u32) -> *mut u32 {
    KERNEL.switch_context(outgoing_sp)
}

/// PendSV exception handler: performs the context switch.
///
/// ## Sequence
/// 1. Push R4–R11 and EXC_RETURN (in LR) onto the current main stack
/// 2. Hand that stack pointer to the kernel and get the next one back
/// 3. Switch MSP to the incoming task's saved context
/// 4. Pop R4–R11 and its EXC_RETURN, then return through it
///
/// The first switch passes `main`'s stack; the kernel discards it because
/// no task was running yet.
///
/// # Safety
/// Only the NVIC may call this.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "push {{r4-r11, lr}}",
        "mov r0, sp",
        // 36 bytes pushed: restore 8-byte alignment for the call
        "sub sp, sp, #4",
        "bl {switch}",
        "mov sp, r0",
        "pop {{r4-r11, lr}}",
        "bx lr",
        switch = sym pendsv_switch,
    );
}
