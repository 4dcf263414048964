//! # Plato RTOS Demo Firmware
//!
//! Four tasks sharing one display, wired together with semaphores and
//! mailboxes. Peripheral access is replaced by `defmt` output.
//!
//! | Task          | Priority | Release          | Behavior                              |
//! |---------------|----------|------------------|---------------------------------------|
//! | `sampler`     | 1        | every 50 ticks   | Samples a slider, mails every reading |
//! |               |          |                  | to `reporter`, every 10th to `labeler`|
//! | `spinner`     | 2        | every 125 ticks  | Advances a progress ring              |
//! | `labeler`     | 3        | on mailbox       | Prints the slider direction           |
//! | `reporter`    | 4        | on mailbox       | Prints the raw slider position        |
//!
//! The display is a shared resource guarded by a semaphore. The sampler and
//! spinner start their cadence at tick 10.

#![no_std]
#![no_main]

use core::cell::OnceCell;
use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use defmt_semihosting as _;
use panic_halt as _;

use plato_rtos::config::STACK_WORDS;
use plato_rtos::sync::{self, Mutex};
use plato_rtos::{MailboxId, Priority, SemaphoreId, Stack, TaskId, Tick, KERNEL};

const SAMPLER_PERIOD: Tick = 50;
const SPINNER_PERIOD: Tick = 125;
const FIRST_RELEASE: Tick = 10;

/// Kernel objects created in `main`, read by the tasks.
#[derive(Clone, Copy)]
struct Handles {
    display: SemaphoreId,
    to_labeler: MailboxId,
    to_reporter: MailboxId,
}

static HANDLES: Mutex<OnceCell<Handles>> = Mutex::new(OnceCell::new());

fn handles() -> Handles {
    sync::critical_section(|cs| *HANDLES.borrow(cs).get().expect("handles set in main"))
}

static SAMPLER_STACK: Stack<STACK_WORDS> = Stack::new();
static SPINNER_STACK: Stack<STACK_WORDS> = Stack::new();
static LABELER_STACK: Stack<STACK_WORDS> = Stack::new();
static REPORTER_STACK: Stack<STACK_WORDS> = Stack::new();

// ---------------------------------------------------------------------------
// Task entry points
// ---------------------------------------------------------------------------

/// Fake capacitive slider: sweeps 0..=48, with "no touch" (-1) every
/// seventh sample.
fn read_slider(sample: u32) -> i32 {
    if sample % 7 == 6 {
        -1
    } else {
        (sample * 5 % 49) as i32
    }
}

/// **Sampler** (priority 1, 50-tick period)
extern "C" fn sampler() -> ! {
    let h = handles();
    let mut next_release = FIRST_RELEASE;
    let mut jobs = 0u32;
    loop {
        KERNEL.delay_until(&mut next_release, SAMPLER_PERIOD);

        let position = read_slider(jobs);
        jobs = jobs.wrapping_add(1);

        KERNEL.write(h.to_reporter, position as u32);
        if jobs % 10 == 0 {
            KERNEL.write(h.to_labeler, position as u32);
        }
    }
}

static RING: AtomicU32 = AtomicU32::new(0);

/// **Spinner** (priority 2, 125-tick period)
extern "C" fn spinner() -> ! {
    let h = handles();
    let mut next_release = FIRST_RELEASE;
    loop {
        KERNEL.delay_until(&mut next_release, SPINNER_PERIOD);

        KERNEL.take(h.display);
        let segment = (RING.load(Ordering::Relaxed) + 1) & 7;
        RING.store(segment, Ordering::Relaxed);
        defmt::info!("ring segment {=u32}", segment);
        KERNEL.give(h.display);
    }
}

/// **Labeler** (priority 3, released by mailbox)
extern "C" fn labeler() -> ! {
    let h = handles();
    loop {
        let position = KERNEL.read(h.to_labeler) as i32;

        KERNEL.take(h.display);
        match position {
            -1 => defmt::info!("NOTOUCH"),
            0..=16 => defmt::info!("LEFT"),
            17..=32 => defmt::info!("CENTER"),
            _ => defmt::info!("RIGHT"),
        }
        KERNEL.give(h.display);
    }
}

/// **Reporter** (priority 4, released by mailbox)
extern "C" fn reporter() -> ! {
    let h = handles();
    loop {
        let position = KERNEL.read(h.to_reporter) as i32;

        KERNEL.take(h.display);
        defmt::info!("position {=i32} (idle {=u32})", position, KERNEL.idle_count());
        KERNEL.give(h.display);
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

#[entry]
fn main() -> ! {
    let cp = cortex_m::Peripherals::take().unwrap();

    let h = Handles {
        display: KERNEL.create_semaphore(false),
        to_labeler: KERNEL.create_mailbox(),
        to_reporter: KERNEL.create_mailbox(),
    };
    sync::critical_section(|cs| {
        let _ = HANDLES.borrow(cs).set(h);
    });

    KERNEL.create_task(TaskId::new(1), sampler, SAMPLER_STACK.claim().unwrap(), Priority(1));
    KERNEL.create_task(TaskId::new(2), spinner, SPINNER_STACK.claim().unwrap(), Priority(2));
    KERNEL.create_task(TaskId::new(3), labeler, LABELER_STACK.claim().unwrap(), Priority(3));
    KERNEL.create_task(TaskId::new(4), reporter, REPORTER_STACK.claim().unwrap(), Priority(4));

    plato_rtos::start(cp)
}
