use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard},
    thread,
    time::{Duration, Instant},
};

pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Default)]
struct DebounceState {
    last_activity: Option<Instant>,
    idle_fired: bool,
    // Pending timer. Replaced on every activity; only the current one can
    // fire because the timer thread checks it under the same lock.
    deadline: Option<Instant>,
    stopped: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<DebounceState>,
    wakeup: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, DebounceState> {
        // A panicking idle callback never holds the lock, so the state is
        // still consistent after poisoning.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Collapses bursts of activity into a single idle signal.
///
/// Each [`touch`](IdleDebouncer::touch) restarts the delay. When the delay
/// runs out with no newer activity the callback runs once, on the timer
/// thread, and stays quiet until the next activity.
pub struct IdleDebouncer {
    shared: Arc<Shared>,
    delay: Duration,
    timer: Option<thread::JoinHandle<()>>,
}

impl IdleDebouncer {
    pub fn new<F>(delay: Duration, on_idle: F) -> IdleDebouncer
    where
        F: FnMut() + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let timer_shared = shared.clone();
        let timer = thread::spawn(move || run_timer(timer_shared, on_idle));
        IdleDebouncer {
            shared,
            delay,
            timer: Some(timer),
        }
    }

    /// Records activity, superseding any pending timer.
    pub fn touch(&self) {
        let now = Instant::now();
        let mut state = self.shared.lock();
        if state.stopped {
            return;
        }
        state.last_activity = Some(now);
        state.idle_fired = false;
        state.deadline = Some(now + self.delay);
        drop(state);
        self.shared.wakeup.notify_one();
    }

    pub fn last_activity(&self) -> Option<Instant> {
        self.shared.lock().last_activity
    }

    /// Cancels the pending timer and waits for the timer thread to exit. No
    /// idle signal fires after this returns.
    pub fn stop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.stopped = true;
            state.deadline = None;
        }
        self.shared.wakeup.notify_one();
        if let Some(timer) = self.timer.take() {
            if timer.join().is_err() {
                log::error!("Idle callback panicked");
            }
        }
    }
}

impl Drop for IdleDebouncer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_timer<F: FnMut()>(shared: Arc<Shared>, mut on_idle: F) {
    let mut state = shared.lock();
    loop {
        if state.stopped {
            return;
        }
        let Some(deadline) = state.deadline else {
            state = shared
                .wakeup
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            continue;
        };

        let now = Instant::now();
        if now < deadline {
            state = shared
                .wakeup
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .0;
            // The deadline may have been replaced while waiting; re-check.
            continue;
        }

        state.deadline = None;
        if state.idle_fired {
            continue;
        }
        state.idle_fired = true;
        drop(state);
        on_idle();
        state = shared.lock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_burst_yields_one_idle_signal() {
        let (tx, rx) = mpsc::channel();
        let debouncer = IdleDebouncer::new(Duration::from_millis(80), move || {
            tx.send(Instant::now()).unwrap();
        });

        for _ in 0..5 {
            debouncer.touch();
            thread::sleep(Duration::from_millis(10));
        }
        let last = debouncer.last_activity().unwrap();

        let fired_at = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(fired_at.duration_since(last) >= Duration::from_millis(80));
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn test_new_activity_rearms_idle_signal() {
        let (tx, rx) = mpsc::channel();
        let debouncer = IdleDebouncer::new(Duration::from_millis(30), move || {
            tx.send(()).unwrap();
        });

        debouncer.touch();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());

        debouncer.touch();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn test_no_activity_no_signal() {
        let (tx, rx) = mpsc::channel::<()>();
        let _debouncer = IdleDebouncer::new(Duration::from_millis(10), move || {
            tx.send(()).unwrap();
        });
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_stop_cancels_pending_timer() {
        let (tx, rx) = mpsc::channel();
        let mut debouncer = IdleDebouncer::new(Duration::from_millis(50), move || {
            let _ = tx.send(());
        });
        debouncer.touch();
        debouncer.stop();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        // Touching a stopped debouncer is a no-op.
        debouncer.touch();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
