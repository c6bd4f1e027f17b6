//! Timer-driven delivery of events to one subscriber channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::channel::SubscriberChannel;
use crate::protocol::Outbound;

/// Produces the event for each tick.
pub trait FrameSource: Send + 'static {
    /// Event for the next tick, or `None` once the source is exhausted.
    fn next_event(&mut self) -> Option<Outbound>;

    /// Delivered once after exhaustion.
    fn finished(&mut self) -> Option<Outbound> {
        None
    }
}

/// Owns at most one live timer task.
///
/// `start` cancels the previous timer before spawning a new one, and dropping
/// the feed cancels it too, so a session can never leave a timer behind.
#[derive(Debug, Default)]
pub struct PeriodicFeed {
    task: Option<JoinHandle<()>>,
}

impl PeriodicFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must be called from within a tokio runtime.
    pub fn start<S: FrameSource>(
        &mut self,
        channel: Arc<dyn SubscriberChannel>,
        interval: Duration,
        source: S,
    ) {
        self.stop();
        let interval = interval.max(Duration::from_millis(1));
        self.task = Some(tokio::spawn(run(channel, interval, source)));
    }

    /// Cancels the timer. Returns whether a timer was live; calling it again
    /// is a no-op.
    pub fn stop(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                let live = !task.is_finished();
                task.abort();
                live
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for PeriodicFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run<S: FrameSource>(channel: Arc<dyn SubscriberChannel>, interval: Duration, mut source: S) {
    // First tick one interval after start.
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match source.next_event() {
            Some(event) => {
                deliver(channel.as_ref(), &event);
            }
            None => {
                if let Some(done) = source.finished() {
                    deliver(channel.as_ref(), &done);
                }
                debug!("Feed source exhausted; timer ends");
                return;
            }
        }
    }
}

/// At most one delivery attempt; failures are logged and swallowed.
fn deliver(channel: &dyn SubscriberChannel, event: &Outbound) -> bool {
    if !channel.is_connected() {
        return false;
    }
    match channel.send(event) {
        Ok(()) => true,
        Err(e) => {
            warn!("Delivery of {} failed: {}", event.name(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        connected: AtomicBool,
        failing: AtomicBool,
        attempts: AtomicUsize,
        delivered: AtomicUsize,
    }

    impl Recorder {
        fn connected() -> Arc<Self> {
            let r = Self::default();
            r.connected.store(true, Ordering::SeqCst);
            Arc::new(r)
        }

        fn delivered(&self) -> usize {
            self.delivered.load(Ordering::SeqCst)
        }
    }

    impl SubscriberChannel for Recorder {
        fn send(&self, _event: &Outbound) -> Result<(), ChannelError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(ChannelError::Closed);
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    struct Counter {
        ticks: Arc<AtomicUsize>,
        limit: Option<usize>,
    }

    impl Counter {
        fn unbounded() -> (Self, Arc<AtomicUsize>) {
            let ticks = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    ticks: Arc::clone(&ticks),
                    limit: None,
                },
                ticks,
            )
        }
    }

    impl FrameSource for Counter {
        fn next_event(&mut self) -> Option<Outbound> {
            let n = self.ticks.load(Ordering::SeqCst);
            if self.limit.is_some_and(|l| n >= l) {
                return None;
            }
            self.ticks.fetch_add(1, Ordering::SeqCst);
            Some(Outbound::info(format!("tick {}", n + 1)))
        }

        fn finished(&mut self) -> Option<Outbound> {
            Some(Outbound::info("done"))
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_once_per_interval() {
        let rec = Recorder::connected();
        let (source, _) = Counter::unbounded();
        let mut feed = PeriodicFeed::new();
        feed.start(rec.clone(), ms(100), source);

        time::sleep(ms(350)).await;
        let n = rec.delivered();
        assert!((3..=4).contains(&n), "got {n} deliveries");
        assert!(feed.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_keeps_a_single_timer() {
        let rec = Recorder::connected();
        let mut feed = PeriodicFeed::new();
        let (first, _) = Counter::unbounded();
        let (second, _) = Counter::unbounded();
        feed.start(rec.clone(), ms(100), first);
        feed.start(rec.clone(), ms(100), second);

        time::sleep(ms(350)).await;
        let n = rec.delivered();
        assert!((3..=4).contains(&n), "got {n} deliveries");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_deliveries_and_is_idempotent() {
        let rec = Recorder::connected();
        let (source, _) = Counter::unbounded();
        let mut feed = PeriodicFeed::new();
        feed.start(rec.clone(), ms(100), source);

        time::sleep(ms(250)).await;
        assert!(feed.stop());
        let at_stop = rec.delivered();
        assert_eq!(at_stop, 2);

        time::sleep(ms(500)).await;
        assert_eq!(rec.delivered(), at_stop);
        assert!(!feed.is_running());
        assert!(!feed.stop());
        assert!(!feed.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_start_is_a_noop() {
        let mut feed = PeriodicFeed::new();
        assert!(!feed.stop());
        assert!(!feed.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnected_channel_skips_delivery_but_keeps_ticking() {
        let rec = Recorder::connected();
        let (source, ticks) = Counter::unbounded();
        let mut feed = PeriodicFeed::new();
        feed.start(rec.clone(), ms(100), source);

        time::sleep(ms(150)).await;
        assert_eq!(rec.delivered(), 1);
        rec.connected.store(false, Ordering::SeqCst);

        time::sleep(ms(300)).await;
        assert_eq!(rec.delivered(), 1);
        assert_eq!(rec.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(ticks.load(Ordering::SeqCst), 4);
        assert!(feed.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_delivery_does_not_stop_the_timer() {
        let rec = Recorder::connected();
        rec.failing.store(true, Ordering::SeqCst);
        let (source, _) = Counter::unbounded();
        let mut feed = PeriodicFeed::new();
        feed.start(rec.clone(), ms(100), source);

        time::sleep(ms(350)).await;
        assert_eq!(rec.delivered(), 0);
        assert_eq!(rec.attempts.load(Ordering::SeqCst), 3);
        assert!(feed.is_running());

        rec.failing.store(false, Ordering::SeqCst);
        time::sleep(ms(100)).await;
        assert_eq!(rec.delivered(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_source_ends_the_timer() {
        let rec = Recorder::connected();
        let ticks = Arc::new(AtomicUsize::new(0));
        let source = Counter {
            ticks: Arc::clone(&ticks),
            limit: Some(2),
        };
        let mut feed = PeriodicFeed::new();
        feed.start(rec.clone(), ms(100), source);

        time::sleep(ms(550)).await;
        // Two frames plus the closing notice.
        assert_eq!(rec.delivered(), 3);
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        assert!(!feed.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_feed_cancels_the_timer() {
        let rec = Recorder::connected();
        let (source, _) = Counter::unbounded();
        {
            let mut feed = PeriodicFeed::new();
            feed.start(rec.clone(), ms(100), source);
            time::sleep(ms(150)).await;
        }
        let at_drop = rec.delivered();
        time::sleep(ms(500)).await;
        assert_eq!(rec.delivered(), at_drop);
    }
}
