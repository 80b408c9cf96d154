//! Cancellable fixed-period timer backing both refresh loops.
//!
//! A `PollTimer` owns at most one spawned tick loop. Starting an armed timer
//! with the same period is a no-op; starting it with a different period
//! replaces the loop. A tick may end its own loop by returning
//! [`TickControl::Stop`].

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

struct Armed {
    generation: u64,
    period: Duration,
    handle: JoinHandle<()>,
}

pub struct PollTimer {
    name: &'static str,
    slot: Arc<Mutex<Option<Armed>>>,
    generation: AtomicU64,
}

fn lock_slot(slot: &Mutex<Option<Armed>>) -> MutexGuard<'_, Option<Armed>> {
    slot.lock().expect("poll timer mutex poisoned")
}

impl PollTimer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn is_armed(&self) -> bool {
        lock_slot(&self.slot).is_some()
    }

    /// Period of the armed loop, if any.
    pub fn period(&self) -> Option<Duration> {
        lock_slot(&self.slot).as_ref().map(|armed| armed.period)
    }

    /// Arm the timer. The first tick fires one full `period` after arming.
    ///
    /// Must be called from within a Tokio runtime. Returns true when a new
    /// loop was spawned.
    pub fn start<F, Fut>(&self, period: Duration, mut tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TickControl> + Send + 'static,
    {
        let mut slot = lock_slot(&self.slot);
        if let Some(armed) = slot.as_ref() {
            if armed.period == period {
                return false;
            }
        }
        if let Some(previous) = slot.take() {
            previous.handle.abort();
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let own_slot = Arc::clone(&self.slot);
        let name = self.name;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Skip the first immediate tick
            interval.tick().await;
            loop {
                interval.tick().await;
                if tick().await == TickControl::Stop {
                    break;
                }
            }
            debug!("{name} timer loop ended");
            let mut slot = lock_slot(&own_slot);
            if slot.as_ref().is_some_and(|armed| armed.generation == generation) {
                *slot = None;
            }
        });

        *slot = Some(Armed {
            generation,
            period,
            handle,
        });
        true
    }

    /// Disarm the timer. Returns true when a loop was running.
    pub fn stop(&self) -> bool {
        match lock_slot(&self.slot).take() {
            Some(armed) => {
                armed.handle.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_tick(
        counter: &Arc<AtomicUsize>,
        stop_after: usize,
    ) -> impl FnMut() -> std::future::Ready<TickControl> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(if n >= stop_after {
                TickControl::Stop
            } else {
                TickControl::Continue
            })
        }
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_a_full_period() {
        let timer = PollTimer::new("test");
        let ticks = Arc::new(AtomicUsize::new(0));
        assert!(timer.start(Duration::from_secs(3), counting_tick(&ticks, usize::MAX)));

        sleep_ms(2_900).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        sleep_ms(200).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        sleep_ms(3_000).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent_for_same_period() {
        let timer = PollTimer::new("test");
        let ticks = Arc::new(AtomicUsize::new(0));
        assert!(timer.start(Duration::from_secs(3), counting_tick(&ticks, usize::MAX)));
        assert!(!timer.start(Duration::from_secs(3), counting_tick(&ticks, usize::MAX)));
        assert!(!timer.start(Duration::from_secs(3), counting_tick(&ticks, usize::MAX)));

        sleep_ms(3_100).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn new_period_replaces_the_loop() {
        let timer = PollTimer::new("test");
        let ticks = Arc::new(AtomicUsize::new(0));
        timer.start(Duration::from_secs(10), counting_tick(&ticks, usize::MAX));
        sleep_ms(5_000).await;

        assert!(timer.start(Duration::from_secs(4), counting_tick(&ticks, usize::MAX)));
        assert_eq!(timer.period(), Some(Duration::from_secs(4)));
        sleep_ms(4_100).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        // The old 10s loop would have fired here.
        sleep_ms(1_000).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_halts_ticks() {
        let timer = PollTimer::new("test");
        let ticks = Arc::new(AtomicUsize::new(0));
        assert!(!timer.stop());
        timer.start(Duration::from_secs(1), counting_tick(&ticks, usize::MAX));
        sleep_ms(1_100).await;
        assert!(timer.stop());
        assert!(!timer.stop());
        assert!(!timer.is_armed());

        sleep_ms(5_000).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_can_cancel_its_own_loop() {
        let timer = PollTimer::new("test");
        let ticks = Arc::new(AtomicUsize::new(0));
        timer.start(Duration::from_secs(3), counting_tick(&ticks, 2));

        sleep_ms(6_100).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        assert!(!timer.is_armed());

        sleep_ms(9_000).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);

        // A stopped timer can be armed again.
        assert!(timer.start(Duration::from_secs(3), counting_tick(&ticks, usize::MAX)));
    }
}
