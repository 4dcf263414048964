//! End-to-end mailbox handoff with real blocking.
//!
//! Each simulated task is a host thread. The port's reschedule hook runs
//! the kernel's context switch and then parks the calling thread until the
//! kernel names it the current task again, so exactly one task thread makes
//! progress at a time, the same as on the target.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Condvar, Mutex, OnceLock};
use std::time::{Duration, Instant};

use plato_rtos::task::TaskState;
use plato_rtos::{Kernel, MailboxId, Port, Priority, SemaphoreId, TaskEntry, TaskId};

struct ThreadPort;

static KERNEL: Kernel<ThreadPort> = Kernel::new(ThreadPort);

static TURN: Mutex<()> = Mutex::new(());
static TURN_CHANGED: Condvar = Condvar::new();

thread_local! {
    static ME: Cell<Option<TaskId>> = const { Cell::new(None) };
}

fn wait_for_turn(me: TaskId) {
    let mut guard = TURN.lock().unwrap();
    while KERNEL.current() != Some(me) {
        guard = TURN_CHANGED.wait(guard).unwrap();
    }
}

/// Stand-in for PendSV.
fn switch() {
    let _guard = TURN.lock().unwrap();
    KERNEL.switch_context(std::ptr::null_mut());
    TURN_CHANGED.notify_all();
}

impl Port for ThreadPort {
    fn reschedule(&self) {
        let me = ME.with(Cell::get).expect("reschedule from a task thread");
        switch();
        wait_for_turn(me);
    }
}

fn spawn(id: TaskId, entry: TaskEntry) {
    std::thread::spawn(move || {
        ME.with(|me| me.set(Some(id)));
        wait_for_turn(id);
        entry();
    });
}

static MAILBOX: OnceLock<MailboxId> = OnceLock::new();
static PARKED: OnceLock<SemaphoreId> = OnceLock::new();
static RECEIVED: AtomicU32 = AtomicU32::new(0);
static READ_DONE: AtomicBool = AtomicBool::new(false);
static WRITE_DONE: AtomicBool = AtomicBool::new(false);

/// Block forever on a semaphore nobody gives.
fn park() -> ! {
    loop {
        KERNEL.take(*PARKED.get().unwrap());
    }
}

extern "C" fn reader() -> ! {
    let value = KERNEL.read(*MAILBOX.get().unwrap());
    RECEIVED.store(value, Ordering::SeqCst);
    READ_DONE.store(true, Ordering::SeqCst);
    park()
}

extern "C" fn writer() -> ! {
    KERNEL.write(*MAILBOX.get().unwrap(), 42);
    WRITE_DONE.store(true, Ordering::SeqCst);
    park()
}

extern "C" fn idle() -> ! {
    loop {
        std::thread::park();
    }
}

fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn reader_blocks_on_empty_mailbox_until_write_42() {
    let reader_id = TaskId::new(1);
    let writer_id = TaskId::new(2);

    MAILBOX.set(KERNEL.create_mailbox()).unwrap();
    PARKED.set(KERNEL.create_semaphore(true)).unwrap();
    KERNEL.install_idle(idle, vec![0u32; 64].leak());
    KERNEL.create_task(reader_id, reader, vec![0u32; 64].leak(), Priority(1));
    KERNEL.create_task(writer_id, writer, vec![0u32; 64].leak(), Priority(2));

    spawn(reader_id, reader);
    spawn(writer_id, writer);

    // First dispatch: the reader outranks the writer and runs first.
    switch();

    wait_until("reader", || READ_DONE.load(Ordering::SeqCst));
    assert_eq!(RECEIVED.load(Ordering::SeqCst), 42);

    // Both tasks end up parked and the idle task owns the CPU.
    wait_until("idle", || KERNEL.current() == Some(TaskId::IDLE));
    assert!(WRITE_DONE.load(Ordering::SeqCst));
    assert_eq!(KERNEL.state_of(reader_id), TaskState::Blocked);
    assert_eq!(KERNEL.state_of(writer_id), TaskState::Blocked);

    // The mailbox is empty again: space free, no data.
    let mbox = *MAILBOX.get().unwrap();
    KERNEL.inspect(|st| {
        let m = st.mailboxes.get(mbox);
        assert!(!st.semaphores.get(m.space).taken);
        assert!(st.semaphores.get(m.data).taken);
    });
}
