//! Setup-time roster editing: role slots, player names and "same player" links.

use std::collections::HashMap;

use crate::{
    catalog::Catalog,
    models::{killer_slot_id, survivor_slot_id, GameConfig, PlayerSlot, RoleKind},
};

/// Number of survivors a match is set up with.
pub const REQUIRED_SURVIVOR_COUNT: usize = 3;
/// Upper bound on selected survivors during setup.
pub const MAX_SURVIVOR_SLOTS: usize = 3;

/// One role that needs a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSlot {
    /// Slot id, `killer:<profile>` or `survivor:<profile>`.
    pub id: String,
    /// Side of the role.
    pub kind: RoleKind,
    /// Profile display name.
    pub label: String,
    /// Referenced profile id.
    pub profile_id: String,
}

/// Slots for the current selection: the killer first, then selected
/// survivors in catalog order.
pub fn role_slots(catalog: &Catalog, config: &GameConfig) -> Vec<RoleSlot> {
    let mut slots = Vec::new();
    if let Some(killer) = config
        .selected_killer_id
        .as_deref()
        .and_then(|id| catalog.killer(id))
    {
        slots.push(RoleSlot {
            id: killer_slot_id(&killer.id),
            kind: RoleKind::Killer,
            label: killer.name.clone(),
            profile_id: killer.id.clone(),
        });
    }
    for survivor in catalog
        .survivors
        .iter()
        .filter(|survivor| config.selected_survivor_ids.contains(&survivor.id))
    {
        slots.push(RoleSlot {
            id: survivor_slot_id(&survivor.id),
            kind: RoleKind::Survivor,
            label: survivor.name.clone(),
            profile_id: survivor.id.clone(),
        });
    }
    slots
}

/// Names and alias links being edited before a match begins.
///
/// After every edit, links are pruned unless both slots exist, the source
/// has a non-blank name, and the target carries exactly that name.
#[derive(Debug, Clone, Default)]
pub struct RosterDraft {
    slots: Vec<RoleSlot>,
    names: HashMap<String, String>,
    sources: HashMap<String, String>,
}

impl RosterDraft {
    /// Seed names and links from the players stored in `config`.
    pub fn from_config(catalog: &Catalog, config: &GameConfig) -> Self {
        let slots = role_slots(catalog, config);
        let stored: HashMap<&str, &PlayerSlot> = config
            .players
            .iter()
            .map(|player| (player.id.as_str(), player))
            .collect();

        let mut names = HashMap::new();
        let mut sources = HashMap::new();
        for slot in &slots {
            let player = stored.get(slot.id.as_str());
            names.insert(
                slot.id.clone(),
                player.map(|player| player.name.clone()).unwrap_or_default(),
            );
            if let Some(source) = player.and_then(|player| player.assigned_from_id.clone()) {
                sources.insert(slot.id.clone(), source);
            }
        }

        let mut draft = Self {
            slots,
            names,
            sources,
        };
        draft.prune();
        draft
    }

    /// Role slots being filled.
    pub fn slots(&self) -> &[RoleSlot] {
        &self.slots
    }

    /// Current raw name for a slot.
    pub fn name(&self, slot_id: &str) -> &str {
        self.names.get(slot_id).map(String::as_str).unwrap_or("")
    }

    /// Source slot a target is linked to.
    pub fn source_of(&self, slot_id: &str) -> Option<&str> {
        self.sources.get(slot_id).map(String::as_str)
    }

    /// Rename a slot. Linked targets follow the new name; a blank name drops
    /// the links that pointed at this slot.
    pub fn set_name(&mut self, slot_id: &str, value: &str) {
        if !self.has_slot(slot_id) {
            return;
        }
        self.names.insert(slot_id.to_string(), value.to_string());
        let targets = self.targets_of(slot_id);
        for target in &targets {
            self.names.insert(target.clone(), value.to_string());
        }
        if value.trim().is_empty() {
            for target in targets {
                self.sources.remove(&target);
            }
        }
        self.prune();
    }

    /// Link `target` to `source` as the same player, copying the source's name.
    /// Ignored while the source name is blank.
    pub fn assign(&mut self, target: &str, source: &str) {
        if target == source || !self.has_slot(target) || !self.has_slot(source) {
            return;
        }
        let source_name = self.name(source).trim().to_string();
        if source_name.is_empty() {
            return;
        }
        self.names.insert(target.to_string(), source_name);
        self.sources.insert(target.to_string(), source.to_string());
        self.prune();
    }

    /// Remove the link from `target` to `source`, clearing the copied name.
    pub fn unassign(&mut self, target: &str, source: &str) {
        let source_name = self.name(source).trim().to_string();
        if !source_name.is_empty() && self.name(target).trim() == source_name {
            self.names.insert(target.to_string(), String::new());
        }
        if self.source_of(target) == Some(source) {
            self.sources.remove(target);
        }
        self.prune();
    }

    /// Drop every link pointing at `source` and clear the names they copied.
    pub fn release(&mut self, source: &str) {
        let source_name = self.name(source).trim().to_string();
        for target in self.targets_of(source) {
            self.sources.remove(&target);
            if !source_name.is_empty() && self.name(&target).trim() == source_name {
                self.names.insert(target, String::new());
            }
        }
        self.prune();
    }

    /// Slots still without a name.
    pub fn missing_names(&self) -> Vec<&RoleSlot> {
        self.slots
            .iter()
            .filter(|slot| self.name(&slot.id).trim().is_empty())
            .collect()
    }

    /// Player slots for the store, names trimmed.
    pub fn players(&self) -> Vec<PlayerSlot> {
        self.slots
            .iter()
            .map(|slot| PlayerSlot {
                id: slot.id.clone(),
                name: self.name(&slot.id).trim().to_string(),
                role: slot.label.clone(),
                assigned_from_id: self.sources.get(&slot.id).cloned(),
            })
            .collect()
    }

    fn has_slot(&self, slot_id: &str) -> bool {
        self.slots.iter().any(|slot| slot.id == slot_id)
    }

    fn targets_of(&self, source: &str) -> Vec<String> {
        self.sources
            .iter()
            .filter(|(_, linked)| linked.as_str() == source)
            .map(|(target, _)| target.clone())
            .collect()
    }

    fn prune(&mut self) {
        let slots = &self.slots;
        let names = &self.names;
        let exists = |id: &str| slots.iter().any(|slot| slot.id == id);
        let trimmed = |id: &str| names.get(id).map(|name| name.trim()).unwrap_or("");
        self.sources.retain(|target, source| {
            let source_name = trimmed(source);
            exists(target)
                && exists(source)
                && !source_name.is_empty()
                && trimmed(target) == source_name
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GameConfig {
        GameConfig {
            selected_survivor_ids: vec![
                "marco_carven".into(),
                "sophia_scott".into(),
                "anna_kubrick".into(),
            ],
            ..GameConfig::default()
        }
    }

    #[test]
    fn slots_put_killer_first_and_survivors_in_catalog_order() {
        let catalog = Catalog::builtin();
        let slots = role_slots(&catalog, &config());
        let ids: Vec<&str> = slots.iter().map(|slot| slot.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "killer:spectre",
                "survivor:sophia_scott",
                "survivor:marco_carven",
                "survivor:anna_kubrick"
            ]
        );
        assert_eq!(slots[0].label, "Призрак");

        let mut no_killer = config();
        no_killer.selected_killer_id = Some("unknown".into());
        assert_eq!(role_slots(&catalog, &no_killer).len(), 3);
    }

    #[test]
    fn assignment_copies_and_follows_source_name() {
        let catalog = Catalog::builtin();
        let mut draft = RosterDraft::from_config(&catalog, &config());
        assert_eq!(draft.missing_names().len(), 4);

        draft.assign("survivor:anna_kubrick", "survivor:sophia_scott");
        assert_eq!(draft.source_of("survivor:anna_kubrick"), None);

        draft.set_name("survivor:sophia_scott", "Olga");
        draft.assign("survivor:anna_kubrick", "survivor:sophia_scott");
        assert_eq!(draft.name("survivor:anna_kubrick"), "Olga");
        assert_eq!(
            draft.source_of("survivor:anna_kubrick"),
            Some("survivor:sophia_scott")
        );

        draft.set_name("survivor:sophia_scott", "Olga K");
        assert_eq!(draft.name("survivor:anna_kubrick"), "Olga K");
        assert!(draft.source_of("survivor:anna_kubrick").is_some());

        draft.set_name("survivor:anna_kubrick", "Someone");
        assert_eq!(draft.source_of("survivor:anna_kubrick"), None);
    }

    #[test]
    fn blank_source_name_drops_links() {
        let catalog = Catalog::builtin();
        let mut draft = RosterDraft::from_config(&catalog, &config());
        draft.set_name("killer:spectre", "Ivan");
        draft.assign("survivor:marco_carven", "killer:spectre");
        draft.set_name("killer:spectre", "  ");
        assert_eq!(draft.source_of("survivor:marco_carven"), None);
        assert_eq!(draft.name("survivor:marco_carven"), "  ");
    }

    #[test]
    fn unassign_and_release_clear_copied_names() {
        let catalog = Catalog::builtin();
        let mut draft = RosterDraft::from_config(&catalog, &config());
        draft.set_name("survivor:sophia_scott", "Olga");
        draft.assign("survivor:anna_kubrick", "survivor:sophia_scott");
        draft.assign("survivor:marco_carven", "survivor:sophia_scott");

        draft.unassign("survivor:anna_kubrick", "survivor:sophia_scott");
        assert_eq!(draft.name("survivor:anna_kubrick"), "");
        assert_eq!(draft.source_of("survivor:anna_kubrick"), None);

        draft.release("survivor:sophia_scott");
        assert_eq!(draft.name("survivor:marco_carven"), "");
        assert_eq!(draft.source_of("survivor:marco_carven"), None);
        assert_eq!(draft.name("survivor:sophia_scott"), "Olga");
    }

    #[test]
    fn players_round_trip_through_config() {
        let catalog = Catalog::builtin();
        let mut draft = RosterDraft::from_config(&catalog, &config());
        draft.set_name("killer:spectre", " Ivan ");
        draft.set_name("survivor:sophia_scott", "Olga");
        draft.set_name("survivor:marco_carven", "Petr");
        draft.assign("survivor:anna_kubrick", "survivor:sophia_scott");

        let players = draft.players();
        assert_eq!(players[0].name, "Ivan");
        assert_eq!(players[0].role, "Призрак");
        assert_eq!(
            players[3].assigned_from_id.as_deref(),
            Some("survivor:sophia_scott")
        );
        assert!(draft.missing_names().is_empty());

        let mut stored = config();
        stored.players = players.clone();
        let reopened = RosterDraft::from_config(&catalog, &stored);
        assert_eq!(reopened.players(), players);
    }

    #[test]
    fn stale_links_are_pruned_on_load() {
        let catalog = Catalog::builtin();
        let mut stored = config();
        stored.players = vec![
            PlayerSlot::new("survivor:sophia_scott", "Olga", "София Скотт"),
            PlayerSlot::new("survivor:anna_kubrick", "Other", "Анна Кубрик")
                .assigned_from("survivor:sophia_scott"),
            PlayerSlot::new("survivor:marco_carven", "Olga", "Марко Карвен")
                .assigned_from("survivor:george_carpenter"),
        ];
        let draft = RosterDraft::from_config(&catalog, &stored);
        assert_eq!(draft.source_of("survivor:anna_kubrick"), None);
        assert_eq!(draft.source_of("survivor:marco_carven"), None);
    }
}
