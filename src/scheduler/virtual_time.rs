use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use super::{Action, Scheduler};

struct Entry {
    due: Duration,
    seq: u64,
    action: Action,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

#[derive(Default)]
struct State {
    now: Duration,
    seq: u64,
    queue: BinaryHeap<Reverse<Entry>>,
}

/// Scheduler driven by a virtual clock that only moves when told to.
///
/// Nothing runs until the clock is advanced with [`advance_by`],
/// [`advance_to`] or [`flush`]. Actions run on the thread advancing the
/// clock, ordered by due time and then by scheduling order.
///
/// ```
/// use std::{sync::{Arc, Mutex}, time::Duration};
/// use rxr_core::scheduler::{SchedulerExt, VirtualTimeScheduler};
///
/// let scheduler = VirtualTimeScheduler::new();
/// let ran = Arc::new(Mutex::new(false));
/// let ran_c = Arc::clone(&ran);
///
/// scheduler.schedule(move |(), _| *ran_c.lock().unwrap() = true, Duration::from_secs(1), ());
///
/// scheduler.advance_by(Duration::from_millis(999));
/// assert!(!*ran.lock().unwrap());
/// scheduler.advance_by(Duration::from_millis(1));
/// assert!(*ran.lock().unwrap());
/// ```
///
/// [`advance_by`]: VirtualTimeScheduler::advance_by
/// [`advance_to`]: VirtualTimeScheduler::advance_to
/// [`flush`]: VirtualTimeScheduler::flush
#[derive(Clone, Default)]
pub struct VirtualTimeScheduler {
    state: Arc<Mutex<State>>,
}

impl VirtualTimeScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `by`, running every action due until then.
    ///
    /// Returns the number of actions that ran.
    pub fn advance_by(&self, by: Duration) -> usize {
        let target = self.now() + by;
        self.advance_to(target)
    }

    /// Moves the clock to `target`, running every action due until then.
    ///
    /// Actions scheduled while advancing run in the same call if they fall
    /// due before `target`. The clock never moves backwards.
    pub fn advance_to(&self, target: Duration) -> usize {
        self.run_until(Some(target))
    }

    /// Runs every queued action, moving the clock to each action's due time.
    ///
    /// Work that keeps scheduling itself makes this loop forever.
    pub fn flush(&self) -> usize {
        self.run_until(None)
    }

    /// Number of queued actions that were not cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock()
            .queue
            .iter()
            .filter(|Reverse(e)| !e.action.is_closed())
            .count()
    }

    fn run_until(&self, target: Option<Duration>) -> usize {
        let mut executed = 0;
        loop {
            let next = {
                let mut state = self.lock();
                let due = state.queue.peek().map(|Reverse(e)| e.due);
                match due {
                    Some(due) if target.map_or(true, |t| due <= t) => {
                        state.now = state.now.max(due);
                        state.queue.pop()
                    }
                    _ => {
                        if let Some(target) = target {
                            state.now = state.now.max(target);
                        }
                        None
                    }
                }
            };

            // Run without the lock so work can schedule more actions.
            match next {
                Some(Reverse(entry)) => {
                    if entry.action.execute() {
                        executed += 1;
                    }
                }
                None => break,
            }
        }
        executed
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for VirtualTimeScheduler {
    fn now(&self) -> Duration {
        self.lock().now
    }

    fn enqueue(&self, action: Action, delay: Duration) {
        let mut state = self.lock();
        let due = state.now + delay;
        let seq = state.seq;
        state.seq += 1;
        state.queue.push(Reverse(Entry { due, seq, action }));
    }
}

impl fmt::Debug for VirtualTimeScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("VirtualTimeScheduler")
            .field("now", &state.now)
            .field("queued", &state.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SchedulerExt;

    fn record(log: &Arc<Mutex<Vec<&'static str>>>) -> impl FnOnce(&'static str, &Action) {
        let log = Arc::clone(log);
        move |name: &'static str, _: &Action| log.lock().unwrap().push(name)
    }

    #[test]
    fn same_due_time_runs_in_scheduling_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scheduler = VirtualTimeScheduler::new();

        let ms = Duration::from_millis;
        scheduler.schedule(record(&log), ms(10), "a");
        scheduler.schedule(record(&log), ms(5), "early");
        scheduler.schedule(record(&log), ms(10), "b");
        scheduler.schedule(record(&log), ms(10), "c");

        assert_eq!(scheduler.advance_by(ms(9)), 1);
        assert_eq!(*log.lock().unwrap(), vec!["early"]);

        assert_eq!(scheduler.advance_by(ms(1)), 3);
        assert_eq!(*log.lock().unwrap(), vec!["early", "a", "b", "c"]);
        assert_eq!(scheduler.now(), ms(10));
    }

    #[test]
    fn cancelled_action_never_runs() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scheduler = VirtualTimeScheduler::new();

        let handle = scheduler.schedule(record(&log), Duration::from_millis(1), "cancelled");
        scheduler.schedule(record(&log), Duration::from_millis(1), "kept");
        assert_eq!(scheduler.pending(), 2);

        handle.close().unwrap();
        handle.close().unwrap();
        assert_eq!(scheduler.pending(), 1);

        assert_eq!(scheduler.flush(), 1);
        assert_eq!(*log.lock().unwrap(), vec!["kept"]);
    }

    #[test]
    fn clock_moves_to_target_without_work() {
        let scheduler = VirtualTimeScheduler::new();
        scheduler.advance_to(Duration::from_secs(3));
        scheduler.advance_to(Duration::from_secs(1));
        assert_eq!(scheduler.now(), Duration::from_secs(3));
    }

    #[test]
    fn periodic_work_is_cancelled_through_outer_handle() {
        fn tick(count: Arc<Mutex<u32>>, action: &Action) {
            *count.lock().unwrap() += 1;
            action.schedule(tick, Duration::from_millis(10), count);
        }

        let count = Arc::new(Mutex::new(0));
        let scheduler = VirtualTimeScheduler::new();
        let handle = scheduler.schedule(tick, Duration::from_millis(10), Arc::clone(&count));

        scheduler.advance_by(Duration::from_millis(35));
        assert_eq!(*count.lock().unwrap(), 3);
        assert!(!handle.is_closed());

        handle.close().unwrap();
        assert_eq!(scheduler.pending(), 0);
        scheduler.advance_by(Duration::from_millis(100));
        assert_eq!(*count.lock().unwrap(), 3);
    }

    #[test]
    fn zero_delay_continuation_runs_within_same_advance() {
        fn chain(n: u32, action: &Action) {
            if n > 0 {
                action.schedule(chain, Duration::ZERO, n - 1);
            }
        }

        let scheduler = VirtualTimeScheduler::new();
        let handle = scheduler.schedule(chain, Duration::from_millis(1), 4);

        assert_eq!(scheduler.advance_by(Duration::from_millis(1)), 5);
        assert_eq!(scheduler.pending(), 0);
        assert!(handle.is_closed());
    }

    #[test]
    fn outer_handle_closes_when_recursion_ends() {
        fn chain(n: u32, action: &Action) {
            if n > 0 {
                action.schedule(chain, Duration::from_millis(10), n - 1);
            }
        }

        let scheduler = VirtualTimeScheduler::new();
        let handle = scheduler.schedule(chain, Duration::from_millis(10), 2);

        assert_eq!(scheduler.advance_by(Duration::from_millis(20)), 2);
        assert!(!handle.is_closed());

        assert_eq!(scheduler.flush(), 1);
        assert_eq!(scheduler.pending(), 0);
        assert!(handle.is_closed());
    }

    #[test]
    fn cancelling_last_continuation_closes_outer_handle() {
        let continuation = Arc::new(Mutex::new(None));
        let continuation_c = Arc::clone(&continuation);

        let scheduler = VirtualTimeScheduler::new();
        let handle = scheduler.schedule(
            move |(), action: &Action| {
                let next = action.schedule(|(), _: &Action| {}, Duration::from_secs(1), ());
                *continuation_c.lock().unwrap() = Some(next);
            },
            Duration::ZERO,
            (),
        );

        scheduler.advance_by(Duration::ZERO);
        assert!(!handle.is_closed());

        let next = continuation.lock().unwrap().take().unwrap();
        next.close().unwrap();
        assert!(handle.is_closed());
        assert_eq!(scheduler.pending(), 0);
    }
}
