use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, trace};

pub const DEFAULT_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TickEvent {
    pub timestamp: i64,
}

impl TickEvent {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Tick callback. Registrations are identified by the `Arc` pointer, so the
/// same `Arc` must be kept around to unsubscribe later.
pub type TickListener = Arc<dyn Fn(&TickEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default)]
pub struct ClockOptions {
    pub interval_ms: Option<i64>,
}

type ListenerList = ReentrantMutex<RefCell<Vec<TickListener>>>;

/// Repeating timer that fans a [`TickEvent`] out to every subscriber.
///
/// Listeners run on the clock's worker thread. The listener list stays locked
/// for the whole dispatch, so once `unsubscribe` or `stop` returns on another
/// thread the affected listener will not be called again. The lock is
/// re-entrant: a listener may subscribe, unsubscribe, stop or start the clock
/// from inside its callback.
pub struct Clock {
    interval: Duration,
    listeners: Arc<ListenerList>,
    worker: Mutex<Option<Worker>>,
}

struct Worker {
    stop: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(ClockOptions::default())
    }
}

impl Clock {
    pub fn new(options: ClockOptions) -> Self {
        let interval_ms = options
            .interval_ms
            .and_then(|ms| u64::try_from(ms).ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_INTERVAL_MS);
        let clock = Self {
            interval: Duration::from_millis(interval_ms),
            listeners: Arc::new(ReentrantMutex::new(RefCell::new(Vec::new()))),
            worker: Mutex::new(None),
        };
        clock.start();
        clock
    }

    pub fn with_interval_ms(interval_ms: i64) -> Self {
        Self::new(ClockOptions {
            interval_ms: Some(interval_ms),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    pub fn subscribe(&self, listener: TickListener) {
        let guard = self.listeners.lock();
        guard.borrow_mut().push(listener);
    }

    pub fn unsubscribe(&self, listener: &TickListener) -> bool {
        let guard = self.listeners.lock();
        let mut listeners = guard.borrow_mut();
        match listeners
            .iter()
            .position(|registered| Arc::ptr_eq(registered, listener))
        {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().borrow().len()
    }

    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);
        let listeners = Arc::clone(&self.listeners);
        let interval = self.interval;
        let join = thread::spawn(move || run_timer(interval, listeners, stop_for_thread));
        debug!(interval_ms = interval.as_millis() as u64, "clock started");
        *worker = Some(Worker { stop, join });
    }

    pub fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        worker.stop.store(true, Ordering::Release);
        worker.join.thread().unpark();

        // Called from a listener: the worker exits on its own once the
        // current dispatch returns.
        if worker.join.thread().id() == thread::current().id() {
            debug!("clock stopped from its own listener");
            return;
        }
        let _ = worker.join.join();
        debug!("clock stopped");
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_timer(interval: Duration, listeners: Arc<ListenerList>, stop: Arc<AtomicBool>) {
    let mut next_tick = Instant::now() + interval;
    loop {
        let now = Instant::now();
        if now < next_tick {
            thread::park_timeout(next_tick - now);
        }
        if stop.load(Ordering::Acquire) {
            break;
        }
        if Instant::now() < next_tick {
            continue;
        }

        dispatch(&listeners, &stop, TickEvent::now());

        next_tick += interval;
        let after = Instant::now();
        while next_tick <= after {
            next_tick += interval;
        }
    }
}

fn dispatch(listeners: &ListenerList, stop: &AtomicBool, event: TickEvent) {
    let guard = listeners.lock();
    // Re-checked under the lock: `stop` may have won the race for it.
    if stop.load(Ordering::Acquire) {
        return;
    }
    trace!(timestamp = event.timestamp, "tick");
    let snapshot = guard.borrow().clone();
    for listener in snapshot {
        let still_registered = guard
            .borrow()
            .iter()
            .any(|registered| Arc::ptr_eq(registered, &listener));
        if still_registered {
            listener(&event);
        }
    }
}
