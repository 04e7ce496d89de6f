use std::sync::Arc;

use terrorscape_core::{
    session::{Clock, ManualClock, MatchClock, MatchPhase},
    storage::{read_json, GAME_STORAGE_KEY},
    Catalog, FileStorage, FinishRequest, Outcome, PersistentGameData, RosterDraft, SessionStore,
};

#[test]
fn full_match_credits_aliases_one_hop() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let storage = FileStorage::new(dir.path());
    let clock = ManualClock::new(1_700_000_000_000);

    let mut store = SessionStore::open(
        Arc::new(storage.clone()),
        Catalog::builtin(),
        Arc::new(clock.clone()),
    );
    assert_eq!(store.config().active_pack_ids, vec!["base"]);
    assert_eq!(store.config().selected_killer_id.as_deref(), Some("spectre"));
    assert!(store.config().selected_survivor_ids.is_empty());
    assert!(store.config().players.is_empty());

    for id in ["sophia_scott", "marco_carven", "anna_kubrick"] {
        assert!(store.toggle_survivor_limited(id));
    }
    assert!(store.can_begin());

    let mut draft = RosterDraft::from_config(store.catalog(), store.config());
    draft.set_name("killer:spectre", "P1");
    draft.set_name("survivor:sophia_scott", "P2");
    draft.set_name("survivor:marco_carven", "P3");
    draft.assign("survivor:anna_kubrick", "survivor:sophia_scott");
    assert!(draft.missing_names().is_empty());

    let statistic_id = store
        .begin_match(Some(draft.players()))
        .expect("setup is complete");
    assert_eq!(store.statistics()[0].id, statistic_id);
    assert_eq!(store.statistics()[0].players.len(), 4);
    assert_eq!(store.phase(), MatchPhase::Running);

    let mut match_clock = MatchClock::new();
    clock.advance(95_000);
    match_clock.sync(store.state(), clock.now_ms());
    assert_eq!(match_clock.display(), "1:35");

    assert!(store.finish_match(FinishRequest {
        outcome: Outcome::Survivors,
        winner_ids: vec![
            "survivor:sophia_scott".to_string(),
            "survivor:marco_carven".to_string(),
        ],
        ended_at: match_clock.finish_timestamp(store.state()),
    }));

    let entry = &store.statistics()[0];
    assert_eq!(entry.outcome, Some(Outcome::Survivors));
    let winners = entry.winner_ids.clone().unwrap_or_default();
    for id in [
        "survivor:sophia_scott",
        "survivor:marco_carven",
        "survivor:anna_kubrick",
    ] {
        assert!(winners.iter().any(|winner| winner == id), "{id} should win");
    }
    assert!(!winners.iter().any(|winner| winner == "killer:spectre"));

    let persisted: PersistentGameData =
        read_json(&storage, GAME_STORAGE_KEY).expect("finished match is stored");
    assert_eq!(&persisted, store.snapshot());
    Ok(())
}

#[test]
fn reopening_mid_match_pauses_the_timer() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let storage = FileStorage::new(dir.path());
    let clock = ManualClock::new(10_000);

    {
        let mut store = SessionStore::open(
            Arc::new(storage.clone()),
            Catalog::builtin(),
            Arc::new(clock.clone()),
        );
        store.toggle_survivor("sophia_scott");
        let draft = RosterDraft::from_config(store.catalog(), store.config());
        assert!(store.begin_match(Some(draft.players())).is_some());
    }

    let store = SessionStore::open(
        Arc::new(storage.clone()),
        Catalog::builtin(),
        Arc::new(clock.clone()),
    );
    assert!(!store.state().is_timer_running);
    assert_eq!(store.phase(), MatchPhase::PausedAfterReload);

    let mut match_clock = MatchClock::new();
    match_clock.sync(store.state(), 70_000);
    assert!(match_clock.shows_reload_warning(store.phase()));
    assert_eq!(match_clock.elapsed_ms(), 0);
    Ok(())
}
