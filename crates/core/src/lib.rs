#![warn(clippy::all, missing_docs)]

//! Core logic for the Terrorscape companion.
//!
//! This crate hosts the persisted models, the content catalog,
//! configuration handling, storage backends, and the session store
//! used by the console frontend and any future frontends.

pub mod catalog;
pub mod config;
pub mod models;
pub mod preferences;
pub mod session;
pub mod storage;

pub use catalog::Catalog;
pub use config::AppConfig;
pub use models::{
    GameConfig, GameState, GameStatisticEntry, Outcome, PersistentGameData, PlayerSlot, RoleKind,
};
pub use preferences::{Locale, Preferences};
pub use session::{
    FinishRequest, MatchClock, MatchPhase, MatchTicker, PlayerGroup, RosterDraft, SessionStore,
    SystemClock, TimerEvent,
};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage, StorageError};
