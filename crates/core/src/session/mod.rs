//! Session state: the store, alias grouping, roster editing and the match timer.

pub mod groups;
pub mod lifecycle;
pub mod roster;
pub mod store;
pub mod ticker;

pub use groups::{resolve_groups, side_member_ids, winner_groups, AliasGraph, PlayerGroup};
pub use lifecycle::{
    format_duration, format_elapsed, Clock, FinishRequest, ManualClock, MatchClock, MatchPhase,
    StatisticSummary, SystemClock,
};
pub use roster::{role_slots, RoleSlot, RosterDraft, MAX_SURVIVOR_SLOTS, REQUIRED_SURVIVOR_COUNT};
pub use store::{load_persisted, save, SessionStore};
pub use ticker::{MatchTicker, TimerEvent};
