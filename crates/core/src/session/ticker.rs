//! Periodic match timer backed by a tokio interval task.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::debug;

use crate::models::GameState;

use super::lifecycle::Clock;

/// Events emitted by the running ticker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// Elapsed time since the match started.
    Tick {
        /// Milliseconds since `started_at`.
        elapsed_ms: i64,
    },
}

/// Owns at most one tick task per running match.
pub struct MatchTicker {
    period: Duration,
    clock: Arc<dyn Clock>,
    active_start: Option<i64>,
    handle: Option<JoinHandle<()>>,
}

impl MatchTicker {
    /// Create an idle ticker.
    pub fn new(period: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            period,
            clock,
            active_start: None,
            handle: None,
        }
    }

    /// Start ticking for a match that began at `started_at`, replacing any running task.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(&mut self, started_at: i64, sender: mpsc::Sender<TimerEvent>) {
        self.stop();

        let period = self.period;
        let clock = Arc::clone(&self.clock);
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let elapsed_ms = clock.now_ms().saturating_sub(started_at);
                if sender.send(TimerEvent::Tick { elapsed_ms }).await.is_err() {
                    break;
                }
            }
        });

        debug!(started_at, "Match ticker started");
        self.active_start = Some(started_at);
        self.handle = Some(handle);
    }

    /// Cancel the running task, if any.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Match ticker stopped");
        }
        self.active_start = None;
    }

    /// Whether a tick task is active.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Start or stop to match `state`: tick only while the timer runs, and
    /// keep an existing task when it already serves the same match.
    pub fn follow(&mut self, state: &GameState, sender: &mpsc::Sender<TimerEvent>) {
        match (state.is_timer_running, state.started_at) {
            (true, Some(started_at)) => {
                if self.active_start != Some(started_at) || !self.is_running() {
                    self.start(started_at, sender.clone());
                }
            }
            _ => self.stop(),
        }
    }
}

impl Drop for MatchTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::lifecycle::ManualClock;

    fn running(started_at: i64) -> GameState {
        GameState {
            started_at: Some(started_at),
            current_statistic_id: Some("id".into()),
            is_timer_running: true,
            ended_at: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_every_period_until_stopped() {
        let clock = ManualClock::new(1_000);
        let mut ticker = MatchTicker::new(Duration::from_secs(1), Arc::new(clock.clone()));
        let (tx, mut rx) = mpsc::channel(8);

        ticker.start(0, tx);
        assert_eq!(rx.recv().await, Some(TimerEvent::Tick { elapsed_ms: 1_000 }));

        clock.set(2_000);
        assert_eq!(rx.recv().await, Some(TimerEvent::Tick { elapsed_ms: 2_000 }));
        assert!(ticker.is_running());

        ticker.stop();
        assert_eq!(rx.recv().await, None);
        assert!(!ticker.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn follow_keeps_a_single_task_per_match() {
        let clock = ManualClock::new(5_000);
        let mut ticker = MatchTicker::new(Duration::from_secs(1), Arc::new(clock));
        let (tx, mut rx) = mpsc::channel(8);

        let state = running(1_000);
        ticker.follow(&state, &tx);
        ticker.follow(&state, &tx);
        assert_eq!(rx.recv().await, Some(TimerEvent::Tick { elapsed_ms: 4_000 }));
        assert_eq!(rx.try_recv().ok(), None);

        let mut stopped = state.clone();
        stopped.is_timer_running = false;
        ticker.follow(&stopped, &tx);
        assert!(!ticker.is_running());

        drop(tx);
        assert_eq!(rx.recv().await, None);
    }
}
