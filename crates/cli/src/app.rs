use std::io::Write;

use anyhow::{anyhow, bail, Result};
use chrono::{Local, TimeZone};
use terrorscape_core::{
    models::{Outcome, RoleKind},
    session::{
        Clock, MatchClock, MatchPhase, MatchTicker, RosterDraft, SessionStore, TimerEvent,
        MAX_SURVIVOR_SLOTS, REQUIRED_SURVIVOR_COUNT,
    },
    Locale, Preferences,
};
use tokio::{
    io::{self, AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{debug, info};

const HELP: &str = "\
Setup:   packs | pack <id> | killer <id|none> | survivor <id>
Roster:  roster | name <slot> <text> | assign <target> <source> | unassign <target> <source>
Match:   begin | status | win killer|survivors | continue | abandon
History: stats | remove <id> | reset
Other:   sound | lang <ru|en> | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Help,
    Packs,
    TogglePack(String),
    Killer(Option<String>),
    Survivor(String),
    Roster,
    Name { slot: String, value: String },
    Assign { target: String, source: String },
    Unassign { target: String, source: String },
    Begin,
    Win(Outcome),
    Continue,
    Abandon,
    Status,
    Stats,
    Remove(String),
    Reset,
    Sound,
    Lang(Locale),
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        let command = match head.to_ascii_lowercase().as_str() {
            "help" | "?" => Command::Help,
            "packs" => Command::Packs,
            "pack" => Command::TogglePack(first_arg(rest, "pack <id>")?),
            "killer" => match first_arg(rest, "killer <id|none>")?.as_str() {
                "none" => Command::Killer(None),
                id => Command::Killer(Some(id.to_string())),
            },
            "survivor" => Command::Survivor(first_arg(rest, "survivor <id>")?),
            "roster" => Command::Roster,
            "name" => {
                let (slot, value) = match rest.split_once(char::is_whitespace) {
                    Some((slot, value)) => (slot, value.trim()),
                    None => (rest, ""),
                };
                if slot.is_empty() {
                    bail!("usage: name <slot> <text>");
                }
                Command::Name {
                    slot: slot.to_string(),
                    value: value.to_string(),
                }
            }
            "assign" => {
                let (target, source) = two_args(rest, "assign <target> <source>")?;
                Command::Assign { target, source }
            }
            "unassign" => {
                let (target, source) = two_args(rest, "unassign <target> <source>")?;
                Command::Unassign { target, source }
            }
            "begin" => Command::Begin,
            "win" => match first_arg(rest, "win killer|survivors")?.as_str() {
                "killer" => Command::Win(Outcome::Killer),
                "survivors" => Command::Win(Outcome::Survivors),
                other => bail!("unknown side '{other}', expected killer or survivors"),
            },
            "continue" => Command::Continue,
            "abandon" => Command::Abandon,
            "status" => Command::Status,
            "stats" => Command::Stats,
            "remove" => Command::Remove(first_arg(rest, "remove <id>")?),
            "reset" => Command::Reset,
            "sound" => Command::Sound,
            "lang" => Command::Lang(first_arg(rest, "lang <ru|en>")?.parse()?),
            "quit" | "exit" => Command::Quit,
            other => bail!("unknown command '{other}', try 'help'"),
        };
        Ok(Some(command))
    }
}

fn first_arg(rest: &str, usage: &str) -> Result<String> {
    rest.split_whitespace()
        .next()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("usage: {usage}"))
}

fn two_args(rest: &str, usage: &str) -> Result<(String, String)> {
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(first), Some(second)) => Ok((first.to_string(), second.to_string())),
        _ => bail!("usage: {usage}"),
    }
}

/// Line-oriented console over the session store.
pub struct ConsoleApp {
    store: SessionStore,
    preferences: Preferences,
    ticker: MatchTicker,
    match_clock: MatchClock,
    draft: RosterDraft,
    last_announced_minute: Option<i64>,
    abandon_requested: bool,
    should_quit: bool,
}

impl ConsoleApp {
    pub fn new(store: SessionStore, preferences: Preferences, ticker: MatchTicker) -> Self {
        let draft = RosterDraft::from_config(store.catalog(), store.config());
        Self {
            store,
            preferences,
            ticker,
            match_clock: MatchClock::new(),
            draft,
            last_announced_minute: None,
            abandon_requested: false,
            should_quit: false,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let (tick_tx, mut tick_rx) = mpsc::channel::<TimerEvent>(16);
        let mut lines = BufReader::new(io::stdin()).lines();

        info!(
            locale = %self.preferences.locale(),
            sound = self.preferences.sound_enabled(),
            statistics = self.store.statistics().len(),
            "Console ready"
        );
        self.sync_timer(&tick_tx);
        println!("Terrorscape companion. Type 'help' for commands.");
        self.print_status();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    self.handle_line(&line);
                    self.sync_timer(&tick_tx);
                }
                Some(event) = tick_rx.recv() => self.handle_timer_event(event),
            }

            if self.should_quit {
                break;
            }
        }

        self.ticker.stop();
        info!("Console closed");
        Ok(())
    }

    fn sync_timer(&mut self, sender: &mpsc::Sender<TimerEvent>) {
        self.ticker.follow(self.store.state(), sender);
        let now = self.store.clock().now_ms();
        self.match_clock.sync(self.store.state(), now);
    }

    fn handle_timer_event(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Tick { elapsed_ms } => {
                self.match_clock.record(elapsed_ms);
                let minute = self.match_clock.elapsed_ms() / 60_000;
                if minute > 0 && self.last_announced_minute != Some(minute) {
                    self.last_announced_minute = Some(minute);
                    println!("⏱ {}", self.match_clock.display());
                    std::io::stdout().flush().ok();
                }
            }
        }
    }

    fn handle_line(&mut self, line: &str) {
        match Command::parse(line) {
            Ok(Some(command)) => {
                debug!(?command, "Command received");
                if let Err(err) = self.execute(command) {
                    println!("Error: {err}");
                }
            }
            Ok(None) => {}
            Err(err) => println!("{err}"),
        }
    }

    fn execute(&mut self, command: Command) -> Result<()> {
        if command != Command::Abandon {
            self.abandon_requested = false;
        }
        match command {
            Command::Help => println!("{HELP}"),
            Command::Packs => self.print_setup(),
            Command::TogglePack(pack_id) => {
                self.ensure_setup()?;
                if self.store.catalog().pack(&pack_id).is_none() {
                    bail!("unknown pack '{pack_id}'");
                }
                self.store.toggle_pack(&pack_id);
                self.rebuild_draft();
                self.print_setup();
            }
            Command::Killer(killer_id) => {
                self.ensure_setup()?;
                if let Some(id) = killer_id.as_deref() {
                    if !self.store.available_killers().iter().any(|killer| killer.id == id) {
                        bail!("killer '{id}' is not available with the active packs");
                    }
                }
                self.store.select_killer(killer_id.as_deref());
                self.rebuild_draft();
                match self.store.selected_killer() {
                    Some(killer) => println!("Killer: {} ({})", killer.name, killer.codename),
                    None => println!("No killer selected"),
                }
            }
            Command::Survivor(survivor_id) => {
                self.ensure_setup()?;
                if !self
                    .store
                    .available_survivors()
                    .iter()
                    .any(|survivor| survivor.id == survivor_id)
                {
                    bail!("survivor '{survivor_id}' is not available with the active packs");
                }
                if !self.store.toggle_survivor_limited(&survivor_id) {
                    bail!("only {MAX_SURVIVOR_SLOTS} survivors can be selected");
                }
                self.rebuild_draft();
                let names: Vec<&str> = self
                    .store
                    .selected_survivors()
                    .iter()
                    .map(|survivor| survivor.name.as_str())
                    .collect();
                println!(
                    "Survivors ({}/{REQUIRED_SURVIVOR_COUNT}): {}",
                    names.len(),
                    names.join(", ")
                );
            }
            Command::Roster => self.print_roster(),
            Command::Name { slot, value } => {
                self.ensure_setup()?;
                let slot_id = self.slot_id(&slot)?;
                self.draft.set_name(&slot_id, &value);
                self.save_draft();
            }
            Command::Assign { target, source } => {
                self.ensure_setup()?;
                let target = self.slot_id(&target)?;
                let source = self.slot_id(&source)?;
                if self.draft.name(&source).trim().is_empty() {
                    bail!("name '{source}' before assigning to it");
                }
                self.draft.assign(&target, &source);
                self.save_draft();
                self.print_roster();
            }
            Command::Unassign { target, source } => {
                self.ensure_setup()?;
                let target = self.slot_id(&target)?;
                let source = self.slot_id(&source)?;
                self.draft.unassign(&target, &source);
                self.save_draft();
                self.print_roster();
            }
            Command::Begin => self.begin()?,
            Command::Win(outcome) => {
                if !matches!(
                    self.store.phase(),
                    MatchPhase::Running | MatchPhase::PausedAfterReload
                ) {
                    bail!("no match in progress");
                }
                let ended_at = self.match_clock.finish_timestamp(self.store.state());
                self.store.finish_with_side(outcome, ended_at);
                self.print_status();
            }
            Command::Continue => {
                if self.store.phase() == MatchPhase::PausedAfterReload {
                    self.match_clock.acknowledge_reload();
                    println!("Continuing without the timer at {}", self.match_clock.display());
                } else {
                    println!("Nothing to continue");
                }
            }
            Command::Abandon => self.abandon()?,
            Command::Status => self.print_status(),
            Command::Stats => self.print_stats(),
            Command::Remove(statistic_id) => {
                if !self.store.remove_statistic(&statistic_id) {
                    bail!("no statistic '{statistic_id}'");
                }
                println!("Removed {statistic_id}");
            }
            Command::Reset => {
                self.store.reset_all();
                self.match_clock = MatchClock::new();
                self.last_announced_minute = None;
                self.rebuild_draft();
                println!("Progress reset");
            }
            Command::Sound => {
                let enabled = self.preferences.toggle_sound();
                println!("Sound {}", if enabled { "on" } else { "off" });
            }
            Command::Lang(locale) => {
                self.preferences.set_locale(locale);
                println!("Language: {locale}");
            }
            Command::Quit => self.should_quit = true,
        }
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        self.ensure_setup()?;
        if !self.store.can_begin() {
            bail!("select a killer and {REQUIRED_SURVIVOR_COUNT} survivors first");
        }
        let missing: Vec<&str> = self
            .draft
            .missing_names()
            .iter()
            .map(|slot| slot.id.as_str())
            .collect();
        if !missing.is_empty() {
            bail!("players missing for {}", missing.join(", "));
        }

        let players = self.draft.players();
        let statistic_id = self
            .store
            .begin_match(Some(players))
            .ok_or_else(|| anyhow!("match could not begin"))?;
        self.match_clock = MatchClock::new();
        self.last_announced_minute = None;
        println!("Match {statistic_id} started");
        Ok(())
    }

    fn abandon(&mut self) -> Result<()> {
        match self.store.phase() {
            MatchPhase::Running if !self.abandon_requested => {
                self.abandon_requested = true;
                println!(
                    "The match is still running. \
                     Type 'abandon' again to leave it without a result."
                );
            }
            MatchPhase::Running | MatchPhase::PausedAfterReload => {
                self.abandon_requested = false;
                self.store.abandon_match();
                self.match_clock = MatchClock::new();
                self.last_announced_minute = None;
                self.rebuild_draft();
                println!("Match left without a result. Adjust the setup and 'begin' a new one.");
            }
            MatchPhase::NoMatch | MatchPhase::Finished => bail!("no match in progress"),
        }
        Ok(())
    }

    fn ensure_setup(&self) -> Result<()> {
        if matches!(
            self.store.phase(),
            MatchPhase::Running | MatchPhase::PausedAfterReload
        ) {
            bail!("finish the current match with 'win' or leave it with 'abandon' first");
        }
        Ok(())
    }

    fn slot_id(&self, reference: &str) -> Result<String> {
        self.draft
            .slots()
            .iter()
            .find(|slot| {
                slot.id == reference
                    || slot.profile_id == reference
                    || (reference == "killer" && slot.kind == RoleKind::Killer)
            })
            .map(|slot| slot.id.clone())
            .ok_or_else(|| anyhow!("unknown slot '{reference}'"))
    }

    fn rebuild_draft(&mut self) {
        self.draft = RosterDraft::from_config(self.store.catalog(), self.store.config());
    }

    fn save_draft(&mut self) {
        self.store.set_players(self.draft.players());
    }

    fn print_setup(&self) {
        let config = self.store.config();
        for pack in &self.store.catalog().packs {
            let mark = if config.active_pack_ids.contains(&pack.id) {
                "[x]"
            } else {
                "[ ]"
            };
            println!("{mark} {:<18} {}", pack.id, pack.name);
        }

        let killers: Vec<String> = self
            .store
            .available_killers()
            .iter()
            .map(|killer| {
                let selected = config.selected_killer_id.as_deref() == Some(killer.id.as_str());
                format!("{}{}", if selected { "*" } else { "" }, killer.id)
            })
            .collect();
        println!("Killers:   {}", killers.join(" "));

        let survivors: Vec<String> = self
            .store
            .available_survivors()
            .iter()
            .map(|survivor| {
                let selected = config.selected_survivor_ids.contains(&survivor.id);
                format!("{}{}", if selected { "*" } else { "" }, survivor.id)
            })
            .collect();
        println!("Survivors: {}", survivors.join(" "));

        for (category, sounds) in self.store.available_sounds() {
            let names: Vec<&str> = sounds.iter().map(|sound| sound.name.as_str()).collect();
            println!("Sounds {category:?}: {}", names.join(", "));
        }
    }

    fn print_roster(&self) {
        if self.draft.slots().is_empty() {
            println!("No roles selected");
            return;
        }
        for slot in self.draft.slots() {
            let name = self.draft.name(&slot.id).trim();
            let name = if name.is_empty() { "?" } else { name };
            match self.draft.source_of(&slot.id) {
                Some(source) => println!(
                    "{:<26} {} — {name} (same as {source})",
                    slot.id, slot.label
                ),
                None => println!("{:<26} {} — {name}", slot.id, slot.label),
            }
        }
    }

    fn print_status(&self) {
        let phase = self.store.phase();
        match phase {
            MatchPhase::NoMatch => {
                let killer = self
                    .store
                    .selected_killer()
                    .map(|killer| killer.name.as_str())
                    .unwrap_or("—");
                let selected = self.store.config().selected_survivor_ids.len();
                println!(
                    "No match in progress. Killer: {killer}, \
                     survivors: {selected}/{REQUIRED_SURVIVOR_COUNT}"
                );
                return;
            }
            MatchPhase::Running => println!("Match running: {}", self.match_clock.display()),
            MatchPhase::PausedAfterReload => {
                println!("Match paused at {}", self.match_clock.display());
                if self.match_clock.shows_reload_warning(phase) {
                    println!(
                        "The timer stopped when the session closed. Use 'continue' to play on \
                         without it, 'win' to record the result, or 'abandon' to start anew."
                    );
                }
            }
            MatchPhase::Finished => {
                println!("Match finished after {}", self.match_clock.display());
                if let Some(summary) = self.store.match_summary() {
                    println!("Winners: {summary}");
                }
            }
        }

        if let Some(started) = self
            .store
            .state()
            .started_at
            .and_then(|started_at| Local.timestamp_millis_opt(started_at).single())
        {
            println!("Started at {}", started.format("%H:%M"));
        }
        for group in self.store.player_groups() {
            println!("  {}", group.label());
        }
    }

    fn print_stats(&self) {
        let summaries = self.store.statistic_summaries();
        if summaries.is_empty() {
            println!("No matches recorded");
            return;
        }
        for summary in summaries {
            println!(
                "{}  {}  {}  {}",
                summary.id,
                summary.started_at_label(),
                summary.duration.as_deref().unwrap_or("—"),
                summary.outcome.map(Outcome::as_str).unwrap_or("in progress"),
            );
            for (group, is_winner) in &summary.groups {
                println!("    {} {}", if *is_winner { "★" } else { " " }, group.label());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};
    use terrorscape_core::{
        session::ManualClock, storage::MemoryStorage, Catalog, KeyValueStore, PlayerSlot,
    };

    fn console(storage: &MemoryStorage, clock: &ManualClock) -> ConsoleApp {
        let shared: Arc<dyn KeyValueStore> = Arc::new(storage.clone());
        let clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let store = SessionStore::open(Arc::clone(&shared), Catalog::builtin(), Arc::clone(&clock));
        let ticker = MatchTicker::new(Duration::from_secs(1), clock);
        ConsoleApp::new(store, Preferences::new(shared), ticker)
    }

    fn roster() -> Vec<PlayerSlot> {
        vec![
            PlayerSlot::new("killer:spectre", "P1", "Призрак"),
            PlayerSlot::new("survivor:sophia_scott", "P2", "София Скотт"),
        ]
    }

    #[test]
    fn parses_setup_commands() -> Result<()> {
        assert_eq!(Command::parse("   ")?, None);
        assert_eq!(
            Command::parse("pack feral-instincts")?,
            Some(Command::TogglePack("feral-instincts".into()))
        );
        assert_eq!(Command::parse("killer none")?, Some(Command::Killer(None)));
        assert_eq!(
            Command::parse("KILLER butcher")?,
            Some(Command::Killer(Some("butcher".into())))
        );
        assert_eq!(
            Command::parse("name sophia_scott Olga Petrova")?,
            Some(Command::Name {
                slot: "sophia_scott".into(),
                value: "Olga Petrova".into()
            })
        );
        assert_eq!(
            Command::parse("assign anna_kubrick sophia_scott")?,
            Some(Command::Assign {
                target: "anna_kubrick".into(),
                source: "sophia_scott".into()
            })
        );
        Ok(())
    }

    #[test]
    fn parses_match_commands() -> Result<()> {
        assert_eq!(
            Command::parse("win survivors")?,
            Some(Command::Win(Outcome::Survivors))
        );
        assert_eq!(Command::parse("lang en")?, Some(Command::Lang(Locale::En)));
        assert_eq!(Command::parse("abandon")?, Some(Command::Abandon));
        assert_eq!(Command::parse(" Abandon ")?, Some(Command::Abandon));
        assert_eq!(Command::parse("exit")?, Some(Command::Quit));
        Ok(())
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(Command::parse("win nobody").is_err());
        assert!(Command::parse("assign anna_kubrick").is_err());
        assert!(Command::parse("lang de").is_err());
        assert!(Command::parse("dance").is_err());
    }

    #[test]
    fn paused_match_can_be_abandoned() -> Result<()> {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(1_000);
        console(&storage, &clock).store.begin_match(Some(roster()));

        let mut app = console(&storage, &clock);
        assert_eq!(app.store.phase(), MatchPhase::PausedAfterReload);
        assert!(app.execute(Command::Begin).is_err());
        assert!(app.execute(Command::Survivor("marco_carven".into())).is_err());

        app.execute(Command::Abandon)?;
        assert_eq!(app.store.phase(), MatchPhase::NoMatch);
        assert_eq!(app.store.statistics().len(), 1);
        assert_eq!(app.store.statistics()[0].ended_at, None);

        app.execute(Command::Survivor("marco_carven".into()))?;
        assert!(app.execute(Command::Abandon).is_err());
        Ok(())
    }

    #[test]
    fn running_match_needs_a_second_abandon() -> Result<()> {
        let storage = MemoryStorage::new();
        let mut app = console(&storage, &ManualClock::new(1_000));
        app.store.begin_match(Some(roster()));

        app.execute(Command::Abandon)?;
        assert_eq!(app.store.phase(), MatchPhase::Running);

        app.execute(Command::Status)?;
        app.execute(Command::Abandon)?;
        assert_eq!(app.store.phase(), MatchPhase::Running);

        app.execute(Command::Abandon)?;
        assert_eq!(app.store.phase(), MatchPhase::NoMatch);
        Ok(())
    }
}
