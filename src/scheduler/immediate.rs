use std::{
    sync::OnceLock,
    time::{Duration, Instant},
};

use super::{Action, Scheduler};

/// Scheduler running work synchronously on the calling thread.
///
/// With a zero delay the work has already run when `schedule` returns. A
/// non-zero delay blocks the calling thread for that long first, so avoid
/// delays when scheduling from inside an async runtime.
///
/// [`now`](Scheduler::now) is monotonic, measured from the first time any
/// `ImmediateScheduler` was asked for the time.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateScheduler;

impl ImmediateScheduler {
    #[must_use]
    pub fn new() -> Self {
        ImmediateScheduler
    }
}

impl Scheduler for ImmediateScheduler {
    fn now(&self) -> Duration {
        static EPOCH: OnceLock<Instant> = OnceLock::new();
        EPOCH.get_or_init(Instant::now).elapsed()
    }

    fn enqueue(&self, action: Action, delay: Duration) {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        action.execute();
    }
}
