//! Shared domain models mirrored into the persisted progress document.

use serde::{Deserialize, Serialize};

/// Mandatory pack that can never be deactivated.
pub const BASE_PACK_ID: &str = "base";
/// Killer selected in a fresh configuration.
pub const DEFAULT_KILLER_ID: &str = "spectre";
/// Slot id prefix for the killer role.
pub const KILLER_PREFIX: &str = "killer:";
/// Slot id prefix for survivor roles.
pub const SURVIVOR_PREFIX: &str = "survivor:";

/// Kind of role a slot is bound to, derived from its id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    /// The single hunter.
    Killer,
    /// One of the hunted.
    Survivor,
}

/// One participant-role binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSlot {
    /// Role-namespaced id, e.g. `survivor:anna_kubrick`.
    pub id: String,
    /// Free-text player name, possibly empty.
    #[serde(default)]
    pub name: String,
    /// Profile display name of the role.
    #[serde(default)]
    pub role: String,
    /// Id of the slot this one is an alias of (same human).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_from_id: Option<String>,
}

impl PlayerSlot {
    /// Build a slot without an alias.
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            assigned_from_id: None,
        }
    }

    /// Mark this slot as an alias of `source_id`.
    pub fn assigned_from(mut self, source_id: impl Into<String>) -> Self {
        self.assigned_from_id = Some(source_id.into());
        self
    }

    /// Role kind derived from the id prefix, `None` for unknown prefixes.
    pub fn kind(&self) -> Option<RoleKind> {
        if self.id.starts_with(KILLER_PREFIX) {
            Some(RoleKind::Killer)
        } else if self.id.starts_with(SURVIVOR_PREFIX) {
            Some(RoleKind::Survivor)
        } else {
            None
        }
    }

    /// Profile reference portion of the id (the part after the first `:`).
    pub fn profile_ref(&self) -> &str {
        self.id.split(':').nth(1).unwrap_or("")
    }
}

/// Build the slot id for a killer profile.
pub fn killer_slot_id(profile_id: &str) -> String {
    format!("{KILLER_PREFIX}{profile_id}")
}

/// Build the slot id for a survivor profile.
pub fn survivor_slot_id(profile_id: &str) -> String {
    format!("{SURVIVOR_PREFIX}{profile_id}")
}

/// Current session setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    /// Enabled pack ids; always includes the base pack.
    pub active_pack_ids: Vec<String>,
    /// Chosen killer profile id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_killer_id: Option<String>,
    /// Chosen survivor profile ids.
    #[serde(default)]
    pub selected_survivor_ids: Vec<String>,
    /// Current roster.
    #[serde(default)]
    pub players: Vec<PlayerSlot>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            active_pack_ids: vec![BASE_PACK_ID.to_string()],
            selected_killer_id: Some(DEFAULT_KILLER_ID.to_string()),
            selected_survivor_ids: Vec::new(),
            players: Vec::new(),
        }
    }
}

/// Transient match/timer state. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Start of the current match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    /// History entry of the current match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_statistic_id: Option<String>,
    /// Whether the timer is ticking; cleared on reload.
    #[serde(default)]
    pub is_timer_running: bool,
    /// End of the current match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
}

/// Winning side of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// The killer (antagonist side) won.
    #[serde(rename = "killer")]
    Killer,
    /// The survivors (protagonist side) won.
    #[serde(rename = "survivors")]
    Survivors,
}

impl Outcome {
    /// Role kind whose groups make up this side.
    pub fn role_kind(self) -> RoleKind {
        match self {
            Outcome::Killer => RoleKind::Killer,
            Outcome::Survivors => RoleKind::Survivor,
        }
    }

    /// Stable label used in persisted data and console output.
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Killer => "killer",
            Outcome::Survivors => "survivors",
        }
    }
}

/// Record of one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatisticEntry {
    /// Unique id, `<startedAt>-<random hex>`.
    pub id: String,
    /// Start time, epoch milliseconds.
    pub started_at: i64,
    /// End time; set once the match is finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
    /// Killer profile at the time the match began.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub killer_id: Option<String>,
    /// Survivor profiles at the time the match began.
    #[serde(default)]
    pub survivor_ids: Vec<String>,
    /// Winning side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    /// Roster snapshot taken when the match began.
    #[serde(default)]
    pub players: Vec<PlayerSlot>,
    /// Credited slot ids, aliases included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_ids: Option<Vec<String>>,
}

impl GameStatisticEntry {
    /// Whether the match has been concluded.
    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Fresh copy with new containers for every nested list.
    pub fn deep_copy(&self) -> Self {
        Self {
            id: self.id.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            killer_id: self.killer_id.clone(),
            survivor_ids: self.survivor_ids.to_vec(),
            outcome: self.outcome,
            players: self.players.iter().cloned().collect(),
            winner_ids: Some(self.winner_ids.as_deref().unwrap_or_default().to_vec()),
        }
    }
}

/// The single persisted progress document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentGameData {
    /// Setup.
    #[serde(default)]
    pub config: GameConfig,
    /// Match state.
    #[serde(default)]
    pub state: GameState,
    /// History, newest first.
    #[serde(default)]
    pub statistics: Vec<GameStatisticEntry>,
}
