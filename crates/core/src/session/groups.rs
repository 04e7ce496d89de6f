//! Alias resolution: folding player slots into one group per real person.
//!
//! A slot may name another slot in `assigned_from_id` when the same human
//! plays both roles. Chains are followed to a root slot, and the data is
//! never trusted to be acyclic: a dangling pointer or a revisited id ends the
//! walk at the current slot.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::{
    catalog::Catalog,
    models::{PlayerSlot, RoleKind},
};

/// Display name used when a group has no usable name or role.
pub const PLACEHOLDER: &str = "—";

/// One real participant, possibly controlling several slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerGroup {
    /// Id of the root slot.
    pub id: String,
    /// Side of the group, `None` when the root slot has an unknown prefix.
    pub kind: Option<RoleKind>,
    /// Display name.
    pub name: String,
    /// Distinct role labels in first-seen order.
    pub roles: Vec<String>,
    /// Member slot ids.
    pub player_ids: Vec<String>,
    /// Distinct profile artwork of the members.
    pub images: Vec<String>,
}

impl PlayerGroup {
    /// Whether any member id is in `winner_ids`.
    pub fn contains_any(&self, winner_ids: &HashSet<&str>) -> bool {
        self.player_ids
            .iter()
            .any(|id| winner_ids.contains(id.as_str()))
    }

    /// `Name — Role, Role` label, or just the name without roles.
    pub fn label(&self) -> String {
        if self.roles.is_empty() {
            self.name.clone()
        } else {
            format!("{} — {}", self.name, self.roles.join(", "))
        }
    }
}

/// Adjacency view of the slots: slot id to the slot it points at.
pub struct AliasGraph<'a> {
    slots: HashMap<&'a str, &'a PlayerSlot>,
}

impl<'a> AliasGraph<'a> {
    /// Index `players` by id. A later duplicate id replaces an earlier one.
    pub fn new(players: &'a [PlayerSlot]) -> Self {
        let slots = players
            .iter()
            .map(|player| (player.id.as_str(), player))
            .collect();
        Self { slots }
    }

    /// Slot with the given id.
    pub fn slot(&self, id: &str) -> Option<&'a PlayerSlot> {
        self.slots.get(id).copied()
    }

    /// Parent pointer of the given slot.
    pub fn parent(&self, id: &str) -> Option<&'a str> {
        self.slot(id)
            .and_then(|slot| slot.assigned_from_id.as_deref())
    }

    /// Follow parent pointers from `start`, recording pointed-to ids in `visited`.
    ///
    /// Stops at the current slot when it has no parent, the parent is
    /// unknown, or the parent was already visited during this walk.
    pub fn resolve_root(&self, start: &'a str, visited: &mut HashSet<&'a str>) -> &'a str {
        let mut current = start;
        while let Some(parent) = self.parent(current) {
            if !visited.insert(parent) {
                break;
            }
            if self.slot(parent).is_none() {
                break;
            }
            current = parent;
        }
        current
    }
}

/// Memoising root lookup over one graph, scoped to a single grouping pass.
pub struct RootResolver<'g, 'a> {
    graph: &'g AliasGraph<'a>,
    cache: HashMap<&'a str, &'a str>,
}

impl<'g, 'a> RootResolver<'g, 'a> {
    /// Start with an empty cache.
    pub fn new(graph: &'g AliasGraph<'a>) -> Self {
        Self {
            graph,
            cache: HashMap::new(),
        }
    }

    /// Root slot id for `id`.
    pub fn root_of(&mut self, id: &'a str) -> &'a str {
        if let Some(&root) = self.cache.get(id) {
            return root;
        }
        let mut visited = HashSet::new();
        let root = self.graph.resolve_root(id, &mut visited);
        self.cache.insert(id, root);
        root
    }
}

fn first_non_empty<'s>(candidates: &[&'s str]) -> &'s str {
    candidates
        .iter()
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .unwrap_or(PLACEHOLDER)
}

fn profile_image<'c>(catalog: &'c Catalog, slot: &PlayerSlot) -> Option<&'c str> {
    match slot.kind() {
        Some(RoleKind::Killer) => catalog.killer_image(slot.profile_ref()),
        Some(RoleKind::Survivor) => catalog.survivor_image(slot.profile_ref()),
        None => None,
    }
}

/// Group `members` by alias root, resolving pointers against all of `players`.
fn fold_by_root<'a>(
    players: &'a [PlayerSlot],
    members: impl IntoIterator<Item = &'a PlayerSlot>,
    catalog: Option<&Catalog>,
) -> Vec<PlayerGroup> {
    let graph = AliasGraph::new(players);
    let mut resolver = RootResolver::new(&graph);
    let mut groups: Vec<PlayerGroup> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    for player in members {
        let root_id = resolver.root_of(&player.id);
        let root = graph.slot(root_id).unwrap_or(player);

        let position = *index.entry(root_id).or_insert_with(|| {
            let name = first_non_empty(&[
                root.name.as_str(),
                player.name.as_str(),
                root.role.as_str(),
            ]);
            groups.push(PlayerGroup {
                id: root_id.to_string(),
                kind: root.kind().or_else(|| player.kind()),
                name: name.to_string(),
                roles: Vec::new(),
                player_ids: Vec::new(),
                images: Vec::new(),
            });
            groups.len() - 1
        });
        let group = &mut groups[position];

        let role = player.role.trim();
        if !role.is_empty() && !group.roles.iter().any(|existing| existing == role) {
            group.roles.push(role.to_string());
        }
        group.player_ids.push(player.id.clone());
        if let Some(image) = catalog.and_then(|catalog| profile_image(catalog, player)) {
            if !group.images.iter().any(|existing| existing == image) {
                group.images.push(image.to_string());
            }
        }
    }

    groups
}

/// Console grouping: the killer slot alone, then survivors folded by alias root.
pub fn resolve_groups(players: &[PlayerSlot], catalog: &Catalog) -> Vec<PlayerGroup> {
    let mut groups = Vec::new();

    if let Some(killer) = players
        .iter()
        .find(|player| player.kind() == Some(RoleKind::Killer))
    {
        groups.push(PlayerGroup {
            id: killer.id.clone(),
            kind: Some(RoleKind::Killer),
            name: first_non_empty(&[killer.name.as_str(), killer.role.as_str()]).to_string(),
            roles: vec![first_non_empty(&[killer.role.as_str()]).to_string()],
            player_ids: vec![killer.id.clone()],
            images: profile_image(catalog, killer)
                .map(|image| vec![image.to_string()])
                .unwrap_or_default(),
        });
    }

    let survivors: Vec<&PlayerSlot> = players
        .iter()
        .filter(|player| player.kind() == Some(RoleKind::Survivor))
        .collect();
    if survivors.is_empty() {
        return groups;
    }

    groups.extend(
        fold_by_root(players, survivors, Some(catalog))
            .into_iter()
            .map(|group| PlayerGroup {
                kind: Some(RoleKind::Survivor),
                ..group
            }),
    );
    groups
}

/// History grouping: every slot of a snapshot folded by alias root, no artwork.
pub fn group_by_root(players: &[PlayerSlot]) -> Vec<PlayerGroup> {
    fold_by_root(players, players, None)
}

/// Every member id of the groups on one side, deduplicated in order.
pub fn side_member_ids(groups: &[PlayerGroup], kind: RoleKind) -> Vec<String> {
    let mut seen = HashSet::new();
    groups
        .iter()
        .filter(|group| group.kind == Some(kind))
        .flat_map(|group| group.player_ids.iter())
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Groups with at least one member in `winner_ids`.
pub fn winner_groups<'g>(groups: &'g [PlayerGroup], winner_ids: &[String]) -> Vec<&'g PlayerGroup> {
    if winner_ids.is_empty() {
        return Vec::new();
    }
    let winners: HashSet<&str> = winner_ids.iter().map(String::as_str).collect();
    groups
        .iter()
        .filter(|group| group.contains_any(&winners))
        .collect()
}
