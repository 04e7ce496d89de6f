//! Match lifecycle: phases, the elapsed-time model, and winner bookkeeping.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use chrono::Utc;
use serde::Serialize;

use crate::models::{GameState, GameStatisticEntry, Outcome, PlayerSlot};

use super::groups::{group_by_root, PlayerGroup};

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Current time in epoch milliseconds.
    fn now_ms(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock moved by hand; clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    /// Start at `now_ms`.
    pub fn new(now_ms: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(now_ms)),
        }
    }

    /// Jump to `now_ms`.
    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    /// Move forward by `delta_ms`.
    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Display state of the current match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchPhase {
    /// No match has been started.
    NoMatch,
    /// Timer is ticking.
    Running,
    /// A match was in progress when the session was reloaded; the timer is stopped.
    PausedAfterReload,
    /// The match has an end time.
    Finished,
}

impl MatchPhase {
    /// Derive the phase from state and the statistic it points at.
    pub fn derive(state: &GameState, current: Option<&GameStatisticEntry>) -> Self {
        if state.started_at.is_none() {
            return MatchPhase::NoMatch;
        }
        if current.map(GameStatisticEntry::is_finished).unwrap_or(false) || state.ended_at.is_some()
        {
            return MatchPhase::Finished;
        }
        if state.is_timer_running {
            MatchPhase::Running
        } else {
            MatchPhase::PausedAfterReload
        }
    }
}

/// Result reported when a match is concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishRequest {
    /// Winning side.
    pub outcome: Outcome,
    /// Slot ids credited with the win before alias expansion.
    pub winner_ids: Vec<String>,
    /// End time; the clock is used when absent.
    pub ended_at: Option<i64>,
}

/// Elapsed-time model for the match console.
///
/// Mirrors the tick loop: while the timer runs, `tick` recomputes
/// `now - started_at`; once stopped the value freezes, or is fixed to
/// `ended_at - started_at` when an end time exists.
#[derive(Debug, Clone, Default)]
pub struct MatchClock {
    tracked_start: Option<i64>,
    elapsed_ms: i64,
    reload_acknowledged: bool,
}

impl MatchClock {
    /// Fresh clock showing zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-evaluate after a state change.
    pub fn sync(&mut self, state: &GameState, now_ms: i64) {
        if state.started_at != self.tracked_start {
            self.tracked_start = state.started_at;
            self.elapsed_ms = 0;
            self.reload_acknowledged = false;
        }

        let Some(started_at) = state.started_at else {
            self.elapsed_ms = 0;
            return;
        };

        if state.is_timer_running {
            self.elapsed_ms = now_ms.saturating_sub(started_at);
        } else if let Some(ended_at) = state.ended_at {
            self.elapsed_ms = ended_at.saturating_sub(started_at);
        }
    }

    /// One periodic tick while the timer runs.
    pub fn tick(&mut self, state: &GameState, now_ms: i64) {
        if state.is_timer_running {
            self.sync(state, now_ms);
        }
    }

    /// Apply an elapsed value reported by a ticker.
    pub fn record(&mut self, elapsed_ms: i64) {
        self.elapsed_ms = elapsed_ms;
    }

    /// Milliseconds to display, never negative.
    pub fn elapsed_ms(&self) -> i64 {
        self.elapsed_ms.max(0)
    }

    /// Formatted elapsed time.
    pub fn display(&self) -> String {
        format_elapsed(self.elapsed_ms())
    }

    /// "Continue without timer": hide the reload warning without restarting the timer.
    pub fn acknowledge_reload(&mut self) {
        self.reload_acknowledged = true;
    }

    /// Whether the stopped-after-reload warning should be shown.
    pub fn shows_reload_warning(&self, phase: MatchPhase) -> bool {
        phase == MatchPhase::PausedAfterReload && !self.reload_acknowledged
    }

    /// End time to report when finishing: `None` while running (use the
    /// clock), else `started_at + elapsed`.
    pub fn finish_timestamp(&self, state: &GameState) -> Option<i64> {
        if state.is_timer_running {
            return None;
        }
        state
            .started_at
            .map(|started_at| started_at.saturating_add(self.elapsed_ms()))
    }
}

/// `m:ss`, or `h:mm:ss` from one hour on.
pub fn format_elapsed(ms: i64) -> String {
    let total_seconds = (ms / 1000).max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// `m:ss` between two instants, `None` unless both exist and end is after start.
pub fn format_duration(started_at: Option<i64>, ended_at: Option<i64>) -> Option<String> {
    match (started_at, ended_at) {
        (Some(start), Some(end)) if start > 0 && end > start => {
            let total_seconds = (end - start) / 1000;
            Some(format!("{}:{:02}", total_seconds / 60, total_seconds % 60))
        }
        _ => None,
    }
}

/// Statistic id of the form `<timestamp>-<random hex>`.
pub fn new_statistic_id(now_ms: i64) -> String {
    format!("{now_ms}-{:x}", rand::random::<u64>())
}

/// Credit aliases of winners: every slot whose `assigned_from_id` is one of
/// the supplied winners is added.
///
/// Only one hop is followed. A slot aliased to an alias of a winner is not
/// credited.
pub fn expand_winners(players: &[PlayerSlot], winner_ids: &[String]) -> Vec<String> {
    let supplied: HashSet<&str> = winner_ids.iter().map(String::as_str).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut expanded = Vec::with_capacity(winner_ids.len());

    for id in winner_ids {
        if seen.insert(id.as_str()) {
            expanded.push(id.clone());
        }
    }
    for player in players {
        let Some(source) = player.assigned_from_id.as_deref() else {
            continue;
        };
        if supplied.contains(source) && seen.insert(player.id.as_str()) {
            expanded.push(player.id.clone());
        }
    }
    expanded
}

/// One history row as shown in the statistics list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatisticSummary {
    /// Statistic id.
    pub id: String,
    /// Start time, epoch milliseconds.
    pub started_at: i64,
    /// `m:ss` duration when the match finished.
    pub duration: Option<String>,
    /// Winning side, if recorded.
    pub outcome: Option<Outcome>,
    /// Participants grouped by alias root, with a winner flag each.
    pub groups: Vec<(PlayerGroup, bool)>,
}

impl StatisticSummary {
    /// Summarise one history entry.
    pub fn from_entry(entry: &GameStatisticEntry) -> Self {
        let winners: HashSet<&str> = entry
            .winner_ids
            .iter()
            .flatten()
            .map(String::as_str)
            .collect();
        let groups = group_by_root(&entry.players)
            .into_iter()
            .map(|group| {
                let is_winner = group.contains_any(&winners);
                (group, is_winner)
            })
            .collect();

        Self {
            id: entry.id.clone(),
            started_at: entry.started_at,
            duration: format_duration(Some(entry.started_at), entry.ended_at),
            outcome: entry.outcome,
            groups,
        }
    }

    /// Start time rendered in the local timezone.
    pub fn started_at_label(&self) -> String {
        chrono::DateTime::<Utc>::from_timestamp_millis(self.started_at)
            .map(|instant| {
                instant
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M")
                    .to_string()
            })
            .unwrap_or_else(|| super::groups::PLACEHOLDER.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_state(started_at: i64) -> GameState {
        GameState {
            started_at: Some(started_at),
            current_statistic_id: Some("s".into()),
            is_timer_running: true,
            ended_at: None,
        }
    }

    #[test]
    fn phases_follow_state() {
        let mut state = GameState::default();
        assert_eq!(MatchPhase::derive(&state, None), MatchPhase::NoMatch);

        state = running_state(1_000);
        assert_eq!(MatchPhase::derive(&state, None), MatchPhase::Running);

        state.is_timer_running = false;
        assert_eq!(MatchPhase::derive(&state, None), MatchPhase::PausedAfterReload);

        state.ended_at = Some(5_000);
        assert_eq!(MatchPhase::derive(&state, None), MatchPhase::Finished);
    }

    #[test]
    fn clock_ticks_freezes_and_fixes() {
        let mut clock = MatchClock::new();
        let mut state = running_state(10_000);

        clock.sync(&state, 12_500);
        assert_eq!(clock.elapsed_ms(), 2_500);
        clock.tick(&state, 75_000);
        assert_eq!(clock.display(), "1:05");

        state.is_timer_running = false;
        clock.tick(&state, 99_000);
        clock.sync(&state, 99_000);
        assert_eq!(clock.elapsed_ms(), 65_000);
        assert_eq!(clock.finish_timestamp(&state), Some(75_000));

        state.ended_at = Some(40_000);
        clock.sync(&state, 99_000);
        assert_eq!(clock.elapsed_ms(), 30_000);

        clock.sync(&GameState::default(), 99_000);
        assert_eq!(clock.elapsed_ms(), 0);
    }

    #[test]
    fn extreme_timestamps_saturate() {
        let mut clock = MatchClock::new();
        let state = GameState {
            started_at: Some(i64::MIN),
            current_statistic_id: None,
            is_timer_running: false,
            ended_at: Some(i64::MAX),
        };
        clock.sync(&state, 0);
        assert_eq!(clock.elapsed_ms(), i64::MAX);
        assert_eq!(clock.finish_timestamp(&state), Some(-1));

        let running = GameState {
            started_at: Some(i64::MIN),
            is_timer_running: true,
            ended_at: None,
            ..state.clone()
        };
        clock.sync(&running, i64::MAX);
        assert_eq!(clock.elapsed_ms(), i64::MAX);

        let far_future = GameState {
            started_at: Some(i64::MAX),
            ..state
        };
        clock.sync(&far_future, 0);
        assert_eq!(clock.finish_timestamp(&far_future), Some(i64::MAX));
        assert_eq!(clock.display(), "0:00");
    }

    #[test]
    fn reload_warning_until_acknowledged() {
        let mut state = running_state(1_000);
        state.is_timer_running = false;
        let mut clock = MatchClock::new();
        clock.sync(&state, 50_000);

        let phase = MatchPhase::derive(&state, None);
        assert!(clock.shows_reload_warning(phase));
        assert_eq!(clock.elapsed_ms(), 0);
        assert_eq!(clock.finish_timestamp(&state), Some(1_000));

        clock.acknowledge_reload();
        assert!(!clock.shows_reload_warning(phase));

        // a new match resets the acknowledgement
        clock.sync(&running_state(60_000), 60_000);
        let mut next = running_state(60_000);
        next.is_timer_running = false;
        assert!(clock.shows_reload_warning(MatchPhase::derive(&next, None)));
        assert_eq!(clock.finish_timestamp(&running_state(60_000)), None);
    }

    #[test]
    fn formats_elapsed_and_duration() {
        assert_eq!(format_elapsed(0), "0:00");
        assert_eq!(format_elapsed(-5_000), "0:00");
        assert_eq!(format_elapsed(59_999), "0:59");
        assert_eq!(format_elapsed(3_725_000), "1:02:05");

        assert_eq!(format_duration(Some(1_000), Some(126_000)), Some("2:05".into()));
        assert_eq!(format_duration(Some(1_000), Some(1_000)), None);
        assert_eq!(format_duration(Some(1_000), None), None);
    }

    #[test]
    fn winner_expansion_is_one_hop() {
        let players = vec![
            PlayerSlot::new("survivor:a", "A", ""),
            PlayerSlot::new("survivor:b", "A", "").assigned_from("survivor:a"),
            PlayerSlot::new("survivor:c", "A", "").assigned_from("survivor:b"),
            PlayerSlot::new("killer:k", "K", ""),
        ];
        let expanded = expand_winners(&players, &["survivor:a".to_string()]);
        assert_eq!(expanded, vec!["survivor:a", "survivor:b"]);
        assert!(!expanded.contains(&"survivor:c".to_string()));

        let deduped = expand_winners(
            &players,
            &["survivor:b".to_string(), "survivor:b".to_string()],
        );
        assert_eq!(deduped, vec!["survivor:b", "survivor:c"]);
    }

    #[test]
    fn statistic_ids_are_timestamp_prefixed() {
        let first = new_statistic_id(1_700_000_000_000);
        let second = new_statistic_id(1_700_000_000_000);
        assert!(first.starts_with("1700000000000-"));
        assert_ne!(first, second);
    }

    #[test]
    fn summary_marks_winning_groups() {
        let entry = GameStatisticEntry {
            id: "1-a".into(),
            started_at: 1_000,
            ended_at: Some(61_000),
            killer_id: Some("butcher".into()),
            survivor_ids: vec!["a".into()],
            outcome: Some(Outcome::Survivors),
            players: vec![
                PlayerSlot::new("killer:butcher", "K", "Мясник"),
                PlayerSlot::new("survivor:a", "S", "A"),
            ],
            winner_ids: Some(vec!["survivor:a".into()]),
        };
        let summary = StatisticSummary::from_entry(&entry);
        assert_eq!(summary.duration.as_deref(), Some("1:00"));
        assert_eq!(summary.groups.len(), 2);
        assert!(!summary.groups[0].1);
        assert!(summary.groups[1].1);
        assert!(!summary.started_at_label().is_empty());
    }
}
