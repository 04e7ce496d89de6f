//! Session store: the single owner of config, match state and history.
//!
//! Every mutation goes through a named command. A command that changes the
//! data mirrors the whole document to storage, except for the one write
//! skipped right after a reset so stale data is not written back.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    catalog::{Catalog, KillerProfile, PackDefinition, SoundAsset, SoundCategory, SurvivorProfile},
    models::{
        GameConfig, GameState, GameStatisticEntry, Outcome, PersistentGameData, PlayerSlot,
        BASE_PACK_ID,
    },
    storage::{read_json, remove_item, write_json, KeyValueStore, GAME_STORAGE_KEY},
};

use super::{
    groups::{resolve_groups, side_member_ids, winner_groups, PlayerGroup},
    lifecycle::{
        expand_winners, new_statistic_id, Clock, FinishRequest, MatchPhase, StatisticSummary,
    },
    roster::{role_slots, RoleSlot, MAX_SURVIVOR_SLOTS, REQUIRED_SURVIVOR_COUNT},
};

/// Read the persisted document and make it safe to resume.
///
/// Returns `None` when nothing usable is stored. A match that was running is
/// marked stopped, the base pack is restored if missing, and history entries
/// are copied into fresh containers.
pub fn load_persisted(storage: &dyn KeyValueStore) -> Option<PersistentGameData> {
    let persisted: PersistentGameData = read_json(storage, GAME_STORAGE_KEY)?;
    Some(rehydrate(persisted))
}

fn rehydrate(persisted: PersistentGameData) -> PersistentGameData {
    let mut config = persisted.config;
    if !config.active_pack_ids.iter().any(|id| id == BASE_PACK_ID) {
        config.active_pack_ids.insert(0, BASE_PACK_ID.to_string());
    }

    let mut state = persisted.state;
    if state.started_at.is_some() {
        state.is_timer_running = false;
    }

    let statistics = persisted
        .statistics
        .iter()
        .map(GameStatisticEntry::deep_copy)
        .collect();

    PersistentGameData {
        config,
        state,
        statistics,
    }
}

/// Store the document. Failures are swallowed by the storage helpers.
pub fn save(storage: &dyn KeyValueStore, data: &PersistentGameData) {
    write_json(storage, GAME_STORAGE_KEY, data);
}

/// Session-scoped store for one running application.
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    catalog: Arc<Catalog>,
    clock: Arc<dyn Clock>,
    data: PersistentGameData,
    skip_next_persist: bool,
}

impl SessionStore {
    /// Open the store, resuming persisted progress or starting from defaults.
    /// Opening never writes.
    pub fn open(
        storage: Arc<dyn KeyValueStore>,
        catalog: Arc<Catalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let data = match load_persisted(storage.as_ref()) {
            Some(data) => {
                info!(
                    statistics = data.statistics.len(),
                    resumed_match = data.state.started_at.is_some(),
                    "Session progress restored"
                );
                data
            }
            None => PersistentGameData::default(),
        };

        Self {
            storage,
            catalog,
            clock,
            data,
            skip_next_persist: false,
        }
    }

    /// Current setup.
    pub fn config(&self) -> &GameConfig {
        &self.data.config
    }

    /// Current match state.
    pub fn state(&self) -> &GameState {
        &self.data.state
    }

    /// History, newest first.
    pub fn statistics(&self) -> &[GameStatisticEntry] {
        &self.data.statistics
    }

    /// Whole document as it would be persisted.
    pub fn snapshot(&self) -> &PersistentGameData {
        &self.data
    }

    /// Catalog used for lookups.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Clock used for timestamps.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    // Commands

    /// Activate or deactivate a pack. The base pack cannot be deactivated;
    /// selections no longer covered by the active packs are adjusted.
    pub fn toggle_pack(&mut self, pack_id: &str) {
        if pack_id == BASE_PACK_ID {
            debug!(pack_id, "Base pack toggle ignored");
            return;
        }
        let catalog = Arc::clone(&self.catalog);
        self.update(|data| {
            let config = &mut data.config;
            let is_active = config.active_pack_ids.iter().any(|id| id == pack_id);
            let mut active: Vec<String> = if is_active {
                config
                    .active_pack_ids
                    .iter()
                    .filter(|id| id.as_str() != pack_id)
                    .cloned()
                    .collect()
            } else {
                let mut ids = config.active_pack_ids.clone();
                ids.push(pack_id.to_string());
                ids
            };
            if !active.iter().any(|id| id == BASE_PACK_ID) {
                active.insert(0, BASE_PACK_ID.to_string());
            }

            let allowed_killers = catalog.allowed_killers(&active);
            let allowed_survivors = catalog.allowed_survivors(&active);

            let keeps_killer = config
                .selected_killer_id
                .as_ref()
                .map(|id| allowed_killers.contains(id))
                .unwrap_or(false);
            if !keeps_killer {
                config.selected_killer_id = allowed_killers.first().cloned();
            }
            config
                .selected_survivor_ids
                .retain(|id| allowed_survivors.contains(id));
            config.active_pack_ids = active;
        });
    }

    /// Select the killer, or clear the selection.
    pub fn select_killer(&mut self, killer_id: Option<&str>) {
        self.update(|data| {
            data.config.selected_killer_id = killer_id.map(str::to_string);
        });
    }

    /// Add or remove a survivor from the selection.
    pub fn toggle_survivor(&mut self, survivor_id: &str) {
        self.update(|data| {
            let selected = &mut data.config.selected_survivor_ids;
            if let Some(position) = selected.iter().position(|id| id == survivor_id) {
                selected.remove(position);
            } else {
                selected.push(survivor_id.to_string());
            }
        });
    }

    /// Setup variant of [`toggle_survivor`](Self::toggle_survivor) that refuses
    /// to add beyond the slot limit. Returns whether the selection changed.
    pub fn toggle_survivor_limited(&mut self, survivor_id: &str) -> bool {
        let selected = &self.data.config.selected_survivor_ids;
        let is_selected = selected.iter().any(|id| id == survivor_id);
        if !is_selected && selected.len() >= MAX_SURVIVOR_SLOTS {
            debug!(survivor_id, "Survivor slots full");
            return false;
        }
        self.toggle_survivor(survivor_id);
        true
    }

    /// Replace the roster.
    pub fn set_players(&mut self, players: Vec<PlayerSlot>) {
        self.update(|data| data.config.players = players);
    }

    /// Start a match with `players` (or the stored roster) and record it at
    /// the head of the history. Returns the new statistic id, or `None` when
    /// no killer is selected or the roster is empty.
    pub fn begin_match(&mut self, players: Option<Vec<PlayerSlot>>) -> Option<String> {
        let players = players.unwrap_or_else(|| self.data.config.players.clone());
        if self.data.config.selected_killer_id.is_none() || players.is_empty() {
            debug!(players = players.len(), "Begin match ignored");
            return None;
        }

        let started_at = self.clock.now_ms();
        let statistic_id = new_statistic_id(started_at);
        let entry = GameStatisticEntry {
            id: statistic_id.clone(),
            started_at,
            ended_at: None,
            killer_id: self.data.config.selected_killer_id.clone(),
            survivor_ids: self.data.config.selected_survivor_ids.clone(),
            outcome: None,
            players: players.clone(),
            winner_ids: None,
        };

        self.update(|data| {
            data.config.players = players;
            data.state = GameState {
                started_at: Some(started_at),
                current_statistic_id: Some(entry.id.clone()),
                is_timer_running: true,
                ended_at: None,
            };
            data.statistics.insert(0, entry);
        });
        info!(statistic_id = %statistic_id, started_at, "Match started");
        Some(statistic_id)
    }

    /// Conclude the current match.
    ///
    /// The timer always stops and the end time is recorded in the state. The
    /// current statistic receives the outcome and the winners, extended by
    /// one alias hop. Returns whether a statistic was updated; a statistic is
    /// only ever concluded once.
    pub fn finish_match(&mut self, request: FinishRequest) -> bool {
        if self.current_statistic().map(GameStatisticEntry::is_finished) == Some(true) {
            debug!("Match already finished");
            return false;
        }

        let ended_at = request.ended_at.unwrap_or_else(|| self.clock.now_ms());
        let current_id = self.data.state.current_statistic_id.clone();
        let mut concluded = false;

        self.update(|data| {
            data.state.ended_at = Some(ended_at);
            data.state.is_timer_running = false;

            let Some(current_id) = current_id else {
                return;
            };
            if let Some(entry) = data
                .statistics
                .iter_mut()
                .find(|entry| entry.id == current_id)
            {
                entry.winner_ids = Some(expand_winners(&entry.players, &request.winner_ids));
                entry.ended_at = Some(ended_at);
                entry.outcome = Some(request.outcome);
                concluded = true;
            }
        });

        if concluded {
            info!(outcome = request.outcome.as_str(), ended_at, "Match finished");
        } else {
            debug!("Finish recorded without an active statistic");
        }
        concluded
    }

    /// Conclude the current match crediting every slot on `outcome`'s side.
    pub fn finish_with_side(&mut self, outcome: Outcome, ended_at: Option<i64>) -> bool {
        let winner_ids = side_member_ids(&self.player_groups(), outcome.role_kind());
        self.finish_match(FinishRequest {
            outcome,
            winner_ids,
            ended_at,
        })
    }

    /// Leave the current match without a result so a new one can be set up.
    ///
    /// The history entry stays as it is, without an end time or outcome.
    /// Returns whether a match was in progress.
    pub fn abandon_match(&mut self) -> bool {
        let Some(started_at) = self.data.state.started_at else {
            debug!("No match to abandon");
            return false;
        };
        if self.phase() == MatchPhase::Finished {
            debug!("Finished match left as is");
            return false;
        }
        let statistic_id = self.data.state.current_statistic_id.clone();
        self.update(|data| data.state = GameState::default());
        info!(
            statistic_id = statistic_id.as_deref().unwrap_or("none"),
            started_at,
            "Match abandoned"
        );
        true
    }

    /// Delete one history entry. Returns whether it existed.
    pub fn remove_statistic(&mut self, statistic_id: &str) -> bool {
        let before = self.data.statistics.len();
        self.update(|data| data.statistics.retain(|entry| entry.id != statistic_id));
        self.data.statistics.len() != before
    }

    /// Forget everything: storage is cleared and defaults restored. The
    /// synchronisation that follows is skipped.
    pub fn reset_all(&mut self) {
        self.skip_next_persist = true;
        remove_item(self.storage.as_ref(), GAME_STORAGE_KEY);
        self.data = PersistentGameData::default();
        self.persist();
        info!("Session progress reset");
    }

    // Read model

    /// Active pack definitions.
    pub fn active_packs(&self) -> Vec<&PackDefinition> {
        self.catalog.active_packs(&self.data.config.active_pack_ids)
    }

    /// Selected killer profile.
    pub fn selected_killer(&self) -> Option<&KillerProfile> {
        self.data
            .config
            .selected_killer_id
            .as_deref()
            .and_then(|id| self.catalog.killer(id))
    }

    /// Selected survivor profiles in catalog order.
    pub fn selected_survivors(&self) -> Vec<&SurvivorProfile> {
        self.catalog
            .survivors
            .iter()
            .filter(|survivor| {
                self.data
                    .config
                    .selected_survivor_ids
                    .contains(&survivor.id)
            })
            .collect()
    }

    /// Killers selectable with the active packs.
    pub fn available_killers(&self) -> Vec<&KillerProfile> {
        self.catalog
            .available_killers(&self.data.config.active_pack_ids)
    }

    /// Survivors selectable with the active packs.
    pub fn available_survivors(&self) -> Vec<&SurvivorProfile> {
        self.catalog
            .available_survivors(&self.data.config.active_pack_ids)
    }

    /// Sounds of the active packs grouped by category.
    pub fn available_sounds(&self) -> Vec<(SoundCategory, Vec<&SoundAsset>)> {
        self.catalog
            .sounds_for_packs(&self.data.config.active_pack_ids)
    }

    /// Player groups of the current roster.
    pub fn player_groups(&self) -> Vec<PlayerGroup> {
        resolve_groups(&self.data.config.players, &self.catalog)
    }

    /// Role slots for the current selection.
    pub fn role_slots(&self) -> Vec<RoleSlot> {
        role_slots(&self.catalog, &self.data.config)
    }

    /// A killer is selected.
    pub fn can_proceed_to_survivors(&self) -> bool {
        self.selected_killer().is_some()
    }

    /// A killer and exactly the required number of survivors are selected.
    pub fn can_proceed_to_roles(&self) -> bool {
        self.can_proceed_to_survivors()
            && self.data.config.selected_survivor_ids.len() == REQUIRED_SURVIVOR_COUNT
    }

    /// Setup is complete and a match can begin.
    pub fn can_begin(&self) -> bool {
        self.can_proceed_to_roles() && !self.role_slots().is_empty()
    }

    /// Statistic the state points at.
    pub fn current_statistic(&self) -> Option<&GameStatisticEntry> {
        let id = self.data.state.current_statistic_id.as_deref()?;
        self.data.statistics.iter().find(|entry| entry.id == id)
    }

    /// Display phase of the current match.
    pub fn phase(&self) -> MatchPhase {
        MatchPhase::derive(&self.data.state, self.current_statistic())
    }

    /// Groups of the current roster credited in the current statistic.
    pub fn winner_groups(&self) -> Vec<PlayerGroup> {
        let Some(winner_ids) = self
            .current_statistic()
            .and_then(|entry| entry.winner_ids.as_ref())
        else {
            return Vec::new();
        };
        let groups = self.player_groups();
        winner_groups(&groups, winner_ids)
            .into_iter()
            .cloned()
            .collect()
    }

    /// `Name — Role · Name — Role` listing of the winners of a finished match.
    pub fn match_summary(&self) -> Option<String> {
        if self.phase() != MatchPhase::Finished {
            return None;
        }
        let winners = self.winner_groups();
        if winners.is_empty() {
            return None;
        }
        Some(
            winners
                .iter()
                .map(PlayerGroup::label)
                .collect::<Vec<_>>()
                .join(" · "),
        )
    }

    /// History rows, newest first.
    pub fn statistic_summaries(&self) -> Vec<StatisticSummary> {
        self.data
            .statistics
            .iter()
            .map(StatisticSummary::from_entry)
            .collect()
    }

    fn update(&mut self, apply: impl FnOnce(&mut PersistentGameData)) {
        let before = self.data.clone();
        apply(&mut self.data);
        if self.data != before {
            self.persist();
        }
    }

    fn persist(&mut self) {
        if self.skip_next_persist {
            self.skip_next_persist = false;
            return;
        }
        save(self.storage.as_ref(), &self.data);
    }
}
