//! Sliding-window admission control for outbound requests.
//!
//! [`RequestScheduler`] records the instant of every admission and never lets
//! more than `ceiling` of them fall inside any trailing `window`. Callers that
//! arrive while the window is full are queued and released strictly in arrival
//! order by a background tick. The scheduler never rejects, it only delays.

use crate::config::{QUEUE_TICK, REQUEST_LIMIT, REQUEST_WINDOW};
use bon::Builder;
use log::{debug, trace};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Ceiling, window and tick period of a [`RequestScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
pub struct RateLimit {
    /// Maximum admissions inside any trailing `window`.
    #[builder(default = REQUEST_LIMIT)]
    pub ceiling: usize,
    #[builder(default = REQUEST_WINDOW)]
    pub window: Duration,
    /// Period of the pass that releases queued callers.
    #[builder(default = QUEUE_TICK)]
    pub tick: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            ceiling: REQUEST_LIMIT,
            window: REQUEST_WINDOW,
            tick: QUEUE_TICK,
        }
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    /// Admission instants, oldest first.
    admitted: VecDeque<Instant>,
    /// Waiting callers in arrival order.
    queue: VecDeque<oneshot::Sender<()>>,
}

impl SchedulerState {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.admitted.front() {
            if now.saturating_duration_since(oldest) < window {
                break;
            }
            self.admitted.pop_front();
        }
    }

    /// Hands free capacity to queued callers, oldest first. Returns how many were released.
    fn release(&mut self, now: Instant, limit: &RateLimit) -> usize {
        self.prune(now, limit.window);
        let mut released = 0;
        while self.admitted.len() < limit.ceiling {
            let Some(waiter) = self.queue.pop_front() else {
                break;
            };
            // A dropped receiver means the caller gave up; its slot goes to the next one.
            if waiter.send(()).is_ok() {
                self.admitted.push_back(now);
                released += 1;
            }
        }
        released
    }
}

/// Process-wide gate in front of every outbound HTTP call.
///
/// Cloning is cheap and every clone shares the same window and queue, so one
/// scheduler can be handed to each fetch call site. The background tick stops
/// once the last clone is dropped.
///
/// Must be created inside a Tokio runtime: construction spawns the tick task.
#[derive(Debug, Clone)]
pub struct RequestScheduler {
    state: Arc<Mutex<SchedulerState>>,
    limit: RateLimit,
}

impl RequestScheduler {
    pub fn new(limit: RateLimit) -> Self {
        let state = Arc::new(Mutex::new(SchedulerState::default()));
        spawn_tick(Arc::downgrade(&state), limit);
        Self { state, limit }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Requests permission for one outbound call.
    ///
    /// The caller's place in line is taken when `admit` is called, not when the
    /// returned future is first polled. The admission is recorded the moment it
    /// is granted, before the gated call starts. Dropping the future before it
    /// resolves gives up the place in line.
    pub fn admit(&self) -> impl Future<Output = ()> + Send + 'static {
        let waiter = {
            let mut state = self.lock();
            let now = Instant::now();
            state.prune(now, self.limit.window);

            if state.queue.is_empty() && state.admitted.len() < self.limit.ceiling {
                state.admitted.push_back(now);
                trace!(
                    "Admitted immediately ({}/{} in window)",
                    state.admitted.len(),
                    self.limit.ceiling
                );
                None
            } else {
                let (tx, rx) = oneshot::channel();
                state.queue.push_back(tx);
                debug!(
                    "Rate ceiling reached, queued request ({} waiting)",
                    state.queue.len()
                );
                Some(rx)
            }
        };

        if waiter.is_none() {
            self.schedule_release_after_window();
        }

        async move {
            if let Some(rx) = waiter {
                // Err only if the scheduler itself is gone, in which case there is nothing left to gate.
                let _ = rx.await;
            }
        }
    }

    /// Number of admissions still inside the trailing window.
    pub fn in_window(&self) -> usize {
        let mut state = self.lock();
        state.prune(Instant::now(), self.limit.window);
        state.admitted.len()
    }

    /// Number of callers waiting for admission.
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One-shot release pass at the moment the admission just recorded leaves the
    /// window, so the queue drains even if the periodic tick runs late.
    fn schedule_release_after_window(&self) {
        let weak = Arc::downgrade(&self.state);
        let limit = self.limit;
        let deadline = Instant::now() + limit.window;
        tokio::spawn(async move {
            time::sleep_until(deadline).await;
            if let Some(state) = weak.upgrade() {
                release_queued(&state, &limit);
            }
        });
    }
}

impl Default for RequestScheduler {
    fn default() -> Self {
        Self::new(RateLimit::default())
    }
}

fn release_queued(state: &Mutex<SchedulerState>, limit: &RateLimit) {
    let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
    if state.queue.is_empty() {
        return;
    }
    let released = state.release(Instant::now(), limit);
    if released > 0 {
        debug!(
            "Released {} queued request(s), {} still waiting",
            released,
            state.queue.len()
        );
    }
}

fn spawn_tick(weak: Weak<Mutex<SchedulerState>>, limit: RateLimit) {
    tokio::spawn(async move {
        let mut ticker = time::interval(limit.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(state) = weak.upgrade() else {
                trace!("Scheduler dropped, stopping queue tick");
                break;
            };
            release_queued(&state, &limit);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(ceiling: usize) -> RateLimit {
        RateLimit::builder().ceiling(ceiling).build()
    }

    /// Calls `admit` `n` times in order and returns the instant each one was granted,
    /// indexed by call order.
    async fn admit_all(scheduler: &RequestScheduler, n: usize) -> Vec<Instant> {
        let granted = Arc::new(Mutex::new(vec![None; n]));
        let mut handles = Vec::with_capacity(n);
        for i in 0..n {
            let admission = scheduler.admit();
            let granted = granted.clone();
            handles.push(tokio::spawn(async move {
                admission.await;
                granted.lock().unwrap()[i] = Some(Instant::now());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let granted: Vec<Instant> = granted.lock().unwrap().iter().map(|t| t.unwrap()).collect();
        granted
    }

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_ceiling_immediately() {
        let scheduler = RequestScheduler::new(limit(20));
        let start = Instant::now();

        let granted = admit_all(&scheduler, 20).await;

        assert!(granted.iter().all(|t| *t == start));
        assert_eq!(scheduler.in_window(), 20);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_holds_in_every_trailing_window() {
        let limit = limit(20);
        let scheduler = RequestScheduler::new(limit);
        let start = Instant::now();

        let granted = admit_all(&scheduler, 45).await;

        for &t in &granted {
            let in_window = granted
                .iter()
                .filter(|&&other| other <= t && t.duration_since(other) < limit.window)
                .count();
            assert!(in_window <= limit.ceiling, "{in_window} admissions in one window");
        }

        let mut sorted = granted.clone();
        sorted.sort();
        assert!(sorted[20].duration_since(start) >= limit.window);
        assert!(sorted[40].duration_since(start) >= limit.window * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_holds_for_staggered_arrivals() {
        let limit = limit(3);
        let scheduler = RequestScheduler::new(limit);
        let start = Instant::now();
        let offsets = [0, 10, 25, 40, 50, 55, 70, 95, 100, 130, 131, 132];

        let granted = Arc::new(Mutex::new(vec![None; offsets.len()]));
        let mut arrivals = Vec::with_capacity(offsets.len());
        let mut handles = Vec::with_capacity(offsets.len());
        for (i, &offset) in offsets.iter().enumerate() {
            time::sleep_until(start + Duration::from_secs(offset)).await;
            arrivals.push(Instant::now());
            let admission = scheduler.admit();
            let granted = granted.clone();
            handles.push(tokio::spawn(async move {
                admission.await;
                granted.lock().unwrap()[i] = Some(Instant::now());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let granted: Vec<Instant> = granted.lock().unwrap().iter().map(|t| t.unwrap()).collect();

        for &t in &granted {
            let in_window = granted
                .iter()
                .filter(|&&other| other <= t && t.duration_since(other) < limit.window)
                .count();
            assert!(in_window <= limit.ceiling, "{in_window} admissions in one window");
        }
        for pair in granted.windows(2) {
            assert!(pair[0] <= pair[1], "later arrival admitted first: {pair:?}");
        }
        assert!(granted.iter().zip(&arrivals).all(|(g, a)| g >= a));
        assert_eq!(granted[..3], arrivals[..3]);
        assert!(granted[3].duration_since(start) >= limit.window);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_requests_release_in_arrival_order() {
        let limit = limit(1);
        let scheduler = RequestScheduler::new(limit);
        let start = Instant::now();

        let granted = admit_all(&scheduler, 4).await;

        assert_eq!(granted[0], start);
        for pair in granted.windows(2) {
            assert!(pair[0] < pair[1], "later arrival admitted first: {pair:?}");
            assert!(pair[1].duration_since(pair[0]) >= limit.window);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_queued_not_dropped() {
        let scheduler = RequestScheduler::new(limit(3));

        let pending: Vec<_> = (0..10).map(|_| scheduler.admit()).collect();
        assert_eq!(scheduler.in_window(), 3);
        assert_eq!(scheduler.pending(), 7);

        for admission in pending {
            admission.await;
        }
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_waiter_frees_its_slot() {
        let limit = limit(1);
        let scheduler = RequestScheduler::new(limit);
        let start = Instant::now();

        scheduler.admit().await;
        let abandoned = scheduler.admit();
        let kept = scheduler.admit();
        drop(abandoned);

        kept.await;
        let waited = Instant::now().duration_since(start);
        assert!(waited >= limit.window);
        assert!(waited < limit.window * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_tick_is_noop() {
        let scheduler = RequestScheduler::new(limit(5));
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(scheduler.in_window(), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_window() {
        let scheduler = RequestScheduler::new(limit(2));
        let other = scheduler.clone();

        scheduler.admit().await;
        other.admit().await;
        let _waiting = scheduler.admit();

        assert_eq!(other.in_window(), 2);
        assert_eq!(other.pending(), 1);
    }
}
