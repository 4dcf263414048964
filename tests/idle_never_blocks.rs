//! The idle task must stay runnable: a blocking call from it is a
//! programming error and fails fast instead of letting idle be dispatched
//! as if it owned the semaphore.

use std::sync::atomic::{AtomicUsize, Ordering};

use plato_rtos::task::TaskState;
use plato_rtos::{Kernel, Port, Priority, TaskId};

#[derive(Default)]
struct CountingPort {
    calls: AtomicUsize,
}

impl Port for CountingPort {
    fn reschedule(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

extern "C" fn spin() -> ! {
    loop {
        std::hint::spin_loop();
    }
}

fn stack() -> &'static mut [u32] {
    vec![0u32; 64].leak()
}

#[test]
#[should_panic(expected = "idle task cannot block")]
fn idle_taking_a_held_semaphore_panics() {
    let k = Kernel::new(CountingPort::default());
    k.install_idle(spin, stack());
    k.create_task(TaskId::new(1), spin, stack(), Priority(1));
    let s = k.create_semaphore(false);

    k.switch_context(std::ptr::null_mut());
    assert_eq!(k.current(), Some(TaskId::new(1)));
    k.take(s);
    let mut cursor = 100;
    k.delay_until(&mut cursor, 100);

    k.switch_context(std::ptr::null_mut());
    assert_eq!(k.current(), Some(TaskId::IDLE));
    assert_eq!(k.state_of(TaskId::new(1)), TaskState::Suspended);
    k.take(s);
}

#[test]
fn idle_can_use_a_free_semaphore() {
    let k = Kernel::new(CountingPort::default());
    k.install_idle(spin, stack());
    let s = k.create_semaphore(false);

    k.switch_context(std::ptr::null_mut());
    assert_eq!(k.current(), Some(TaskId::IDLE));
    k.take(s);
    k.give(s);
    assert!(!k.inspect(|st| st.semaphores.get(s).taken));
    assert_eq!(k.port().calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unknown_task_ids_are_dormant() {
    let k = Kernel::new(CountingPort::default());
    k.install_idle(spin, stack());
    assert_eq!(k.state_of(TaskId::new(9)), TaskState::Dormant);
}
